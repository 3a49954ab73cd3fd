//! SD command indices and OCR/ACMD41 bit layout used by the card
//! bring-up state machine (spec section 4.4).

/// CMD0: reset the card to the idle state. No response.
pub const GO_IDLE_STATE: u32 = 0;
/// CMD2: all cards on the line respond with their CID, R2.
pub const ALL_SEND_CID: u32 = 2;
/// CMD3: card publishes a relative address, R6.
pub const SEND_RELATIVE_ADDR: u32 = 3;
/// CMD7: select/deselect a card by RCA, R1b.
pub const SELECT_CARD: u32 = 7;
/// CMD8: interface condition probe (voltage/check pattern), R1.
pub const SEND_EXT_CSD: u32 = 8;
/// CMD9: card publishes its CSD by RCA, R2.
pub const SEND_CSD: u32 = 9;
/// CMD13: card publishes its status, R1.
pub const SEND_STATUS: u32 = 13;
/// CMD16: set the fixed block length (standard-capacity cards only).
pub const SET_BLOCKLEN: u32 = 16;
/// CMD17: read a single block, R1.
pub const READ_SINGLE_BLOCK: u32 = 17;
/// CMD24: write a single block, R1.
pub const WRITE_BLOCK: u32 = 24;
/// CMD55: the next command is an application-specific command (ACMD).
pub const APP_CMD: u32 = 55;

/// ACMD6: set the bus width (application command, sent after CMD55).
pub const SET_BUS_WIDTH: u32 = 6;
/// ACMD41 (`SD_APP_OP_COND`): polled during power-up negotiation.
pub const SD_APP_OP_COND: u32 = 41;

/// Argument encoding for ACMD6 selecting 4-bit mode.
pub const BUS_WIDTH_4BIT: u32 = 0b10;

/// CMD8 argument: VHS = 1 (2.7-3.6 V), check pattern 0xAA.
pub const CMD8_VOLTAGE_CHECK_ARG: u32 = 0x1AA;
/// CMD8 check pattern echoed back in the low byte of the R1 response.
pub const CMD8_CHECK_PATTERN: u32 = 0xAA;

/// ACMD41 argument bit 30: Host Capacity Support.
pub const OCR_HCS: u32 = 1 << 30;
/// ACMD41/OCR response bit 31: card power-up busy indicator.
pub const OCR_BUSY: u32 = 1 << 31;

/// Fixed block size for this driver (spec section 4.4, "Block size").
pub const BLOCK_SIZE: u32 = 512;

/// Attempts to poll ACMD41 waiting for the busy bit to clear (spec
/// section 4.4, step 5).
pub const OCR_POLL_ATTEMPTS: usize = 10;
/// Delay between ACMD41 polls (spec section 4.4, step 5).
pub const OCR_POLL_DELAY_MS: u32 = 100;
