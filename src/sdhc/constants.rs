//! Hardware register offsets and host-engine tuning constants.

/// DMA system address (DS_ADDR).
pub const SDHC_DS_ADDR: u32 = 0x00;
/// Block size / block count (BLK_ATT).
pub const SDHC_BLK_ATT: u32 = 0x04;
/// Command argument (CMD_ARG).
pub const SDHC_CMD_ARG: u32 = 0x08;
/// Command transfer type (CMD_XFR_TYP) — command index, response type, and
/// data-present bit; the register write to this offset is the trigger that
/// starts the command.
pub const SDHC_CMD_XFR_TYP: u32 = 0x0C;
/// Response word 0 (CMD_RSP0).
pub const SDHC_CMD_RSP0: u32 = 0x10;
/// Response word 1 (CMD_RSP1).
pub const SDHC_CMD_RSP1: u32 = 0x14;
/// Response word 2 (CMD_RSP2).
pub const SDHC_CMD_RSP2: u32 = 0x18;
/// Response word 3 (CMD_RSP3).
pub const SDHC_CMD_RSP3: u32 = 0x1C;
/// PIO data buffer access port.
pub const SDHC_DATA_BUFF_ACC_PORT: u32 = 0x20;
/// Present state (read-only snapshot of bus/command/data line state).
pub const SDHC_PRES_STATE: u32 = 0x24;
/// Protocol control (bus width, endianness, DMA select).
pub const SDHC_PROT_CTRL: u32 = 0x28;
/// System control (reset, clock divider/frequency select, data timeout).
pub const SDHC_SYS_CTRL: u32 = 0x2C;
/// Interrupt status (write-1-to-clear).
pub const SDHC_INT_STATUS: u32 = 0x30;
/// Interrupt status enable (which bits latch into INT_STATUS).
pub const SDHC_INT_STATUS_EN: u32 = 0x34;
/// Interrupt signal enable (which latched bits assert the IRQ line).
pub const SDHC_INT_SIGNAL_EN: u32 = 0x38;
/// Auto-CMD12 error status.
pub const SDHC_AUTOCMD12_ERR_STATUS: u32 = 0x3C;
/// Host controller capabilities (read-only).
pub const SDHC_HOST_CTRL_CAP: u32 = 0x40;
/// Watermark level (PIO FIFO read/write thresholds).
pub const SDHC_WTMK_LVL: u32 = 0x44;
/// Mixer control — DMA/multi-block/auto-CMD12/data-direction bits, folded
/// into `CMD_XFR_TYP` on controller version 2, a standalone register on
/// version 3 and later.
pub const SDHC_MIX_CTRL: u32 = 0x48;
/// Force event (diagnostic, write-only).
pub const SDHC_FORCE_EVENT: u32 = 0x50;
/// ADMA error status.
pub const SDHC_ADMA_ERR_STATUS: u32 = 0x54;
/// ADMA descriptor table address.
pub const SDHC_ADMA_SYS_ADDR: u32 = 0x58;
/// Delay-locked-loop control.
pub const SDHC_DLL_CTRL: u32 = 0x60;
/// Delay-locked-loop status.
pub const SDHC_DLL_STATUS: u32 = 0x64;
/// Clock tuning control/status.
pub const SDHC_CLK_TUNE_CTRL_STATUS: u32 = 0x68;
/// Vendor-specific register.
pub const SDHC_VEND_SPEC: u32 = 0xC0;
/// MMC boot configuration.
pub const SDHC_MMC_BOOT: u32 = 0xC4;
/// Vendor-specific register 2.
pub const SDHC_VEND_SPEC2: u32 = 0xC8;
/// Host controller version (read-only).
pub const SDHC_HOST_VERSION: u32 = 0xFC;

/// PIO FIFO depth in bytes; the block surface never needs more because the
/// protocol layer only ever transfers one block at a time (see
/// [`crate::mmc`]'s block-transfer design note).
pub const SDHC_FIFO_DEPTH: usize = 0x800;

/// Upper bound on busy-wait retries for register-state polling loops.
pub const RETRIES_TIMEOUT: usize = 0x0A00_0000;

/// Card identification (`~400 kHz`) clock divider: base clock / 512,
/// split across both hardware fields as `DIV_16 (DVS=0xf, /16) *
/// PRESCALER_32 (SDCLKFS=0x10, /32)`. Neither field alone can express a
/// divide-by-512: `DVS` is a 4-bit divisor-minus-one field and
/// `SDCLKFS` is an 8-bit one-hot prescaler, so the divide must be the
/// product of both.
pub const SDCLK_DVS_IDENTIFY: u32 = 0xF;
pub const SDCLK_PRESCALER_IDENTIFY: u32 = 0x10;
/// Operational (`~25 MHz` class) clock divider: base clock / 8, split as
/// `DIV_4 (DVS=0x3, /4) * PRESCALER_2 (SDCLKFS=0x1, /2)`.
pub const SDCLK_DVS_OPERATIONAL: u32 = 0x3;
pub const SDCLK_PRESCALER_OPERATIONAL: u32 = 0x1;

/// Data timeout counter value used for every data-bearing command
/// (`DTOCV`, spec section 4.3 "next_cmd").
pub const DATA_TIMEOUT_DTOCV: u32 = 0xE;

/// Maximum read/write watermark level in 32-bit words.
pub const WATERMARK_MAX: u32 = 0x80;
