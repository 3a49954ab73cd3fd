//! Register definitions for the SDHC host controller.
//!
//! Each hardware register gets its own [`bitflags!`] struct bound to its
//! byte offset through the [`FlagReg`] trait, mirroring the MMIO register
//! block byte-for-byte (spec section 4.1). All access goes through
//! [`SdhcReg`], which performs plain volatile loads/stores — no field is
//! read-modify-written unless the register genuinely requires it.

#![allow(missing_docs)]

use bitflags::bitflags;

use crate::regs::{FlagReg, Reg};

use super::constants::*;
use super::err::SdhcError;

/// SDHC register accessor.
pub type SdhcReg = Reg<SdhcError>;

impl Clone for SdhcReg {
    fn clone(&self) -> Self {
        Self::new(self.addr)
    }
}

bitflags! {
    /// DMA system address (single-block DMA transfer).
    #[derive(Clone, Copy)]
    pub struct DsAddr: u32 {
        const ADDR = 0xFFFF_FFFF;
    }
}
impl FlagReg for DsAddr {
    const REG: u32 = SDHC_DS_ADDR;
}

bitflags! {
    /// Block attributes: size in bits 0-11, count in bits 16-31.
    #[derive(Clone, Copy)]
    pub struct BlkAtt: u32 {
        const BLKSIZE_MASK = genmask!(11, 0);
        const BLKCNT_MASK = genmask!(31, 16);
    }
}
impl FlagReg for BlkAtt {
    const REG: u32 = SDHC_BLK_ATT;
}
impl BlkAtt {
    pub fn new(block_size: u32, block_count: u32) -> Self {
        Self::from_bits_truncate(
            set_reg32_bits!(block_size, 11, 0) | set_reg32_bits!(block_count, 31, 16),
        )
    }
    pub fn block_size(self) -> u32 {
        get_reg32_bits!(self.bits(), 11, 0)
    }
    pub fn block_count(self) -> u32 {
        get_reg32_bits!(self.bits(), 31, 16)
    }
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct CmdArg: u32 {
        const ARG = 0xFFFF_FFFF;
    }
}
impl FlagReg for CmdArg {
    const REG: u32 = SDHC_CMD_ARG;
}

bitflags! {
    /// Command transfer type / trigger register.
    ///
    /// Writing this register is the act that starts the command (spec
    /// section 4.3, "next_cmd ... Commit by writing the transfer-type
    /// register").
    #[derive(Clone, Copy)]
    pub struct CmdXfrTyp: u32 {
        /// Data present select: this command has an attached data transfer.
        const DPSEL = 1 << 21;
        /// Command index check enable (CICEN).
        const CICEN = 1 << 20;
        /// Command CRC check enable (CCCEN).
        const CCCEN = 1 << 19;
        /// Response type select, bits 16-17.
        const RSPTYP_MASK = genmask!(17, 16);
        const RSPTYP_NONE = 0b00 << 16;
        const RSPTYP_136 = 0b01 << 16;
        const RSPTYP_48 = 0b10 << 16;
        const RSPTYP_48_BUSY = 0b11 << 16;
        /// Command index, bits 24-29.
        const CMDINX_MASK = genmask!(29, 24);
    }
}
impl FlagReg for CmdXfrTyp {
    const REG: u32 = SDHC_CMD_XFR_TYP;
}
impl CmdXfrTyp {
    pub fn with_index(index: u32) -> Self {
        Self::from_bits_truncate(set_reg32_bits!(index, 29, 24))
    }
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct CmdRsp0: u32 { const VAL = 0xFFFF_FFFF; }
}
impl FlagReg for CmdRsp0 {
    const REG: u32 = SDHC_CMD_RSP0;
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct CmdRsp1: u32 { const VAL = 0xFFFF_FFFF; }
}
impl FlagReg for CmdRsp1 {
    const REG: u32 = SDHC_CMD_RSP1;
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct CmdRsp2: u32 { const VAL = 0xFFFF_FFFF; }
}
impl FlagReg for CmdRsp2 {
    const REG: u32 = SDHC_CMD_RSP2;
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct CmdRsp3: u32 { const VAL = 0xFFFF_FFFF; }
}
impl FlagReg for CmdRsp3 {
    const REG: u32 = SDHC_CMD_RSP3;
}

bitflags! {
    /// PIO data port: 32 bits in or out per access while BRR/BWR is set.
    #[derive(Clone, Copy)]
    pub struct DataPort: u32 { const VAL = 0xFFFF_FFFF; }
}
impl FlagReg for DataPort {
    const REG: u32 = SDHC_DATA_BUFF_ACC_PORT;
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct PresState: u32 {
        /// Command inhibit: a command is in flight, new commands must wait.
        const CIHB = 1 << 0;
        /// Command-with-data inhibit: a data transfer is in flight.
        const CDIHB = 1 << 1;
        /// Data line active.
        const DLA = 1 << 2;
        /// Internal clock stable.
        const SDSTB = 1 << 3;
        /// Buffer read enable (PIO data ready to read).
        const BREN = 1 << 11;
        /// Buffer write enable (PIO FIFO ready to accept data).
        const BWEN = 1 << 10;
        /// Card inserted.
        const CINST = 1 << 16;
        /// Write-protect switch pin level (1 = not write-protected).
        const WPSPL = 1 << 19;
    }
}
impl FlagReg for PresState {
    const REG: u32 = SDHC_PRES_STATE;
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct ProtCtrl: u32 {
        /// Data transfer width, bits 1-2: 00 = 1-bit, 01 = 4-bit, 10 = 8-bit.
        const DTW_MASK = genmask!(2, 1);
        const DTW_1BIT = 0b00 << 1;
        const DTW_4BIT = 0b01 << 1;
        const DTW_8BIT = 0b10 << 1;
    }
}
impl FlagReg for ProtCtrl {
    const REG: u32 = SDHC_PROT_CTRL;
}
impl ProtCtrl {
    pub fn width(bus_width: u32) -> Self {
        match bus_width {
            8 => Self::DTW_8BIT,
            4 => Self::DTW_4BIT,
            _ => Self::DTW_1BIT,
        }
    }
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct SysCtrl: u32 {
        /// Data timeout counter value (DTOCV), bits 0-3.
        const DTOCV_MASK = genmask!(3, 0);
        /// Clock divisor, bits 4-7.
        const DVS_MASK = genmask!(7, 4);
        /// SDCLK frequency select, bits 8-15.
        const SDCLKFS_MASK = genmask!(15, 8);
        /// Internal clock enable.
        const ICE = 1 << 28;
        /// Internal clock stable (read-only).
        const ICS = 1 << 29;
        /// SD clock enable.
        const CEN = 1 << 30;
        /// Reset all.
        const RSTA = 1 << 24;
        /// Reset command line.
        const RSTC = 1 << 25;
        /// Reset data line.
        const RSTD = 1 << 26;
        /// Init-active: drive the 80-clock warm-up sequence.
        const INITA = 1 << 27;
    }
}
impl FlagReg for SysCtrl {
    const REG: u32 = SDHC_SYS_CTRL;
}
impl SysCtrl {
    pub fn dtocv(val: u32) -> Self {
        Self::from_bits_truncate(set_reg32_bits!(val, 3, 0))
    }
    pub fn sdclkfs(prescaler: u32) -> Self {
        Self::from_bits_truncate(set_reg32_bits!(prescaler, 15, 8))
    }
    pub fn dvs(divisor: u32) -> Self {
        Self::from_bits_truncate(set_reg32_bits!(divisor, 7, 4))
    }
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct IntStatus: u32 {
        /// Command complete.
        const CC = 1 << 0;
        /// Transfer complete.
        const TC = 1 << 1;
        /// Block gap event.
        const BGE = 1 << 2;
        /// DMA interrupt.
        const DINT = 1 << 3;
        /// Buffer write ready.
        const BWR = 1 << 4;
        /// Buffer read ready.
        const BRR = 1 << 5;
        /// Card insertion.
        const CINS = 1 << 6;
        /// Card removal.
        const CREM = 1 << 7;
        /// Card interrupt.
        const CINT = 1 << 8;
        /// Retuning event.
        const RTE = 1 << 12;
        /// Tuning pass.
        const TP = 1 << 13;
        /// Command timeout error.
        const CTOE = 1 << 16;
        /// Command CRC error.
        const CCE = 1 << 17;
        /// Command end-bit error.
        const CEBE = 1 << 18;
        /// Command index error.
        const CIE = 1 << 19;
        /// Data timeout error.
        const DTOE = 1 << 20;
        /// Data CRC error.
        const DCE = 1 << 21;
        /// Data end-bit error.
        const DEBE = 1 << 22;
        /// Auto-CMD12 error.
        const AC12E = 1 << 24;
        /// DMA error.
        const DMAE = 1 << 28;
        /// Tuning error.
        const TNE = 1 << 26;
        /// ADMA error.
        const ADMAE = 1 << 25;
        /// Overcurrent error.
        const OVRCUR = 1 << 27;

        /// All fatal/hardware error bits.
        const ALL_ERR = Self::CTOE.bits() | Self::CCE.bits() | Self::CEBE.bits()
            | Self::CIE.bits() | Self::DTOE.bits() | Self::DCE.bits() | Self::DEBE.bits()
            | Self::AC12E.bits() | Self::DMAE.bits() | Self::ADMAE.bits();
    }
}
impl FlagReg for IntStatus {
    const REG: u32 = SDHC_INT_STATUS;
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct IntStatusEn: u32 {
        const CC = 1 << 0;
        const TC = 1 << 1;
        const BWR = 1 << 4;
        const BRR = 1 << 5;
        const CINS = 1 << 6;
        const CREM = 1 << 7;
        const ALL_ERR = IntStatus::ALL_ERR.bits();
    }
}
impl FlagReg for IntStatusEn {
    const REG: u32 = SDHC_INT_STATUS_EN;
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct IntSignalEn: u32 {
        const CC = 1 << 0;
        const TC = 1 << 1;
        const BWR = 1 << 4;
        const BRR = 1 << 5;
        const CINS = 1 << 6;
        const CREM = 1 << 7;
        const ALL_ERR = IntStatus::ALL_ERR.bits();
    }
}
impl FlagReg for IntSignalEn {
    const REG: u32 = SDHC_INT_SIGNAL_EN;
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct Autocmd12ErrStatus: u32 { const VAL = 0xFFFF_FFFF; }
}
impl FlagReg for Autocmd12ErrStatus {
    const REG: u32 = SDHC_AUTOCMD12_ERR_STATUS;
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct HostCtrlCap: u32 {
        /// Max block length, bits 16-17.
        const MBL_MASK = genmask!(17, 16);
        /// ADMA2 support.
        const ADMAS = 1 << 19;
        /// DMA support.
        const DMAS = 1 << 22;
        /// 1.8 V support.
        const VS18 = 1 << 26;
        /// 3.0 V support.
        const VS30 = 1 << 25;
        /// 3.3 V support.
        const VS33 = 1 << 24;
    }
}
impl FlagReg for HostCtrlCap {
    const REG: u32 = SDHC_HOST_CTRL_CAP;
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct WtmkLvl: u32 {
        /// Read watermark level, bits 0-7.
        const RD_WML_MASK = genmask!(7, 0);
        /// Write watermark level, bits 16-23.
        const WR_WML_MASK = genmask!(23, 16);
    }
}
impl FlagReg for WtmkLvl {
    const REG: u32 = SDHC_WTMK_LVL;
}
impl WtmkLvl {
    pub fn read(wml: u32) -> Self {
        Self::from_bits_truncate(set_reg32_bits!(wml, 7, 0))
    }
    pub fn write(wml: u32) -> Self {
        Self::from_bits_truncate(set_reg32_bits!(wml, 23, 16))
    }
}

bitflags! {
    /// Mixer control. Folded into [`CmdXfrTyp`] on controller version 2
    /// (spec section 4.3); this is the version-3-and-later standalone form.
    #[derive(Clone, Copy)]
    pub struct MixCtrl: u32 {
        /// DMA enable.
        const DMAEN = 1 << 0;
        /// Block count enable (required whenever a block count is used).
        const BCEN = 1 << 1;
        /// Auto-CMD12 enable.
        const AC12EN = 1 << 2;
        /// Data transfer direction select: 1 = read (card to host).
        const DTDSEL = 1 << 4;
        /// Multi/single block select: 1 = multiple blocks.
        const MSBSEL = 1 << 5;
    }
}
impl FlagReg for MixCtrl {
    const REG: u32 = SDHC_MIX_CTRL;
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct ForceEvent: u32 { const VAL = 0xFFFF_FFFF; }
}
impl FlagReg for ForceEvent {
    const REG: u32 = SDHC_FORCE_EVENT;
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct AdmaErrStatus: u32 { const VAL = 0xFFFF_FFFF; }
}
impl FlagReg for AdmaErrStatus {
    const REG: u32 = SDHC_ADMA_ERR_STATUS;
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct AdmaSysAddr: u32 { const VAL = 0xFFFF_FFFF; }
}
impl FlagReg for AdmaSysAddr {
    const REG: u32 = SDHC_ADMA_SYS_ADDR;
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct DllCtrl: u32 { const VAL = 0xFFFF_FFFF; }
}
impl FlagReg for DllCtrl {
    const REG: u32 = SDHC_DLL_CTRL;
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct DllStatus: u32 { const VAL = 0xFFFF_FFFF; }
}
impl FlagReg for DllStatus {
    const REG: u32 = SDHC_DLL_STATUS;
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct ClkTuneCtrlStatus: u32 { const VAL = 0xFFFF_FFFF; }
}
impl FlagReg for ClkTuneCtrlStatus {
    const REG: u32 = SDHC_CLK_TUNE_CTRL_STATUS;
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct VendSpec: u32 { const VAL = 0xFFFF_FFFF; }
}
impl FlagReg for VendSpec {
    const REG: u32 = SDHC_VEND_SPEC;
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct MmcBoot: u32 { const VAL = 0xFFFF_FFFF; }
}
impl FlagReg for MmcBoot {
    const REG: u32 = SDHC_MMC_BOOT;
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct VendSpec2: u32 { const VAL = 0xFFFF_FFFF; }
}
impl FlagReg for VendSpec2 {
    const REG: u32 = SDHC_VEND_SPEC2;
}

bitflags! {
    #[derive(Clone, Copy)]
    pub struct HostVersion: u32 {
        const VENDOR_MASK = genmask!(15, 8);
        const SPEC_MASK = genmask!(7, 0);
    }
}
impl FlagReg for HostVersion {
    const REG: u32 = SDHC_HOST_VERSION;
}
impl HostVersion {
    /// Spec version 3 introduces a standalone [`MixCtrl`] register.
    pub fn is_v3_or_later(self) -> bool {
        (self.bits() & Self::SPEC_MASK.bits()) >= 2
    }
}
