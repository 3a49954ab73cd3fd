//! SD card identification state machine and block transfer entry points
//! (spec section 4.4).

use alloc::boxed::Box;
use core::ptr::NonNull;

use log::{debug, info, warn};

use crate::sdhc::{Command, DataDescriptor, ResponseType, SdhcError, SdioHost};

use super::bits::slice_bits;
use super::consts::*;
use super::err::{MmcError, MmcResult};

/// Which card family this instance was identified as (spec section 3,
/// "Card"). Only [`CardType::Sd`] ever reaches [`Card::status`]
/// `Active`; the others are detected only so [`Card::init`] can refuse
/// them (spec section 1, non-goals).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardType {
    Unknown,
    Mmc,
    Sd,
    Sdio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardStatus {
    Active,
    Inactive,
    Busy,
}

/// Decoded Card Identification register.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cid {
    pub manfid: u8,
    pub oemid: u16,
    pub name: [u8; 5],
    pub rev: u8,
    pub serial: u32,
    pub date: u16,
}

/// Completion callback for an asynchronous block transfer: `(bytes,
/// token)`. `bytes` is `512 * n` on success, `0` on failure (spec section
/// 4.4, "Completion adapter").
pub type UserCallback = fn(bytes: usize, token: usize);

/// Identity and capabilities of the attached SD card (spec section 3,
/// "Card"). Owns the host facade; the storage surface locks a `Card`
/// before touching it (spec section 5).
pub struct Card {
    host: Box<dyn SdioHost>,
    ocr: u32,
    raw_cid: [u32; 4],
    raw_csd: [u32; 4],
    cid: Cid,
    csd_version: u8,
    rca: u16,
    card_type: CardType,
    status: CardStatus,
    high_capacity: bool,
    capacity_bytes: u64,
}

/// State kept alive on the heap for the duration of an asynchronous block
/// transfer (spec section 9, "small-object pools in the callback path").
/// Dropping it frees the command, its attached [`DataDescriptor`], and the
/// binding to the caller's callback/token in one step.
struct AsyncState {
    cmd: Command,
    n: u32,
    user_cb: UserCallback,
    user_token: usize,
}

/// Internal adapter invoked by the host dispatcher; reconstructs
/// [`AsyncState`] from `token`, translates the completion status into a
/// byte count, and frees everything before returning (spec section 4.4,
/// "Completion adapter").
fn completion_adapter(status: i32, token: usize) {
    // SAFETY: `token` was produced by `Box::into_raw` in `Card::transfer`
    // and is only ever passed back here once, by the dispatcher, after the
    // command it tags has completed.
    let state = unsafe { Box::from_raw(token as *mut AsyncState) };
    let bytes = if status == 0 {
        (BLOCK_SIZE * state.n) as usize
    } else {
        0
    };
    (state.user_cb)(bytes, state.user_token);
}

fn send_blocking(host: &mut dyn SdioHost, cmd: &mut Command) -> MmcResult<()> {
    if host.send_command(cmd, None, 0) < 0 {
        return Err(MmcError::Host(SdhcError::CommandError));
    }
    Ok(())
}

/// Undo the host's right-alignment of a 128-bit response (spec section
/// 4.4, step 7): `new[i] = (old[i] << 8) | (old[i-1] >> 24)`, `new[0] =
/// old[0] << 8`. Load-bearing; do not simplify away (spec section 9).
fn reassemble_response(resp: [u32; 4]) -> [u32; 4] {
    [
        resp[0] << 8,
        (resp[1] << 8) | (resp[0] >> 24),
        (resp[2] << 8) | (resp[1] >> 24),
        (resp[3] << 8) | (resp[2] >> 24),
    ]
}

fn decode_cid(raw: &[u32; 4]) -> Cid {
    let mut name = [0u8; 5];
    for (i, byte) in name.iter_mut().enumerate() {
        *byte = slice_bits(raw, 64 + 8 * i as u32, 8) as u8;
    }
    Cid {
        manfid: slice_bits(raw, 120, 8) as u8,
        oemid: slice_bits(raw, 104, 16) as u16,
        name,
        rev: slice_bits(raw, 56, 8) as u8,
        serial: slice_bits(raw, 24, 32) as u32,
        date: slice_bits(raw, 8, 12) as u16,
    }
}

/// Decode CSD capacity (spec section 4.4, "CSD decoding"). Returns
/// `(capacity_bytes, csd_version)`.
fn decode_csd(raw: &[u32; 4]) -> MmcResult<(u64, u8)> {
    let version = slice_bits(raw, 126, 2);
    match version {
        0 => {
            let c_size = slice_bits(raw, 62, 12);
            let c_size_mult = slice_bits(raw, 47, 3);
            let read_bl_len = slice_bits(raw, 80, 4);
            let capacity =
                (c_size + 1) * (1u64 << (c_size_mult + 2)) * (1u64 << read_bl_len);
            Ok((capacity, 0))
        }
        1 => {
            let c_size = slice_bits(raw, 48, 22);
            let capacity = (c_size + 1) * 512 * 1024;
            Ok((capacity, 1))
        }
        _ => Err(MmcError::UnsupportedCsdVersion),
    }
}

impl Card {
    /// Run the SD card identification state machine (spec section 4.4,
    /// "Card initialization") and return a ready-to-use `Card`. Consumes
    /// `host`, which must already be bound to a mapped MMIO region.
    pub fn init(mut host: Box<dyn SdioHost>) -> MmcResult<Card> {
        host.reset().map_err(MmcError::from)?;

        // CMD0: GO_IDLE_STATE, no response.
        let mut cmd0 = Command::new(GO_IDLE_STATE, 0, ResponseType::None);
        send_blocking(host.as_mut(), &mut cmd0)?;

        // CMD8: SEND_EXT_CSD, validates VHS + check pattern.
        let mut cmd8 = Command::new(SEND_EXT_CSD, CMD8_VOLTAGE_CHECK_ARG, ResponseType::R1);
        send_blocking(host.as_mut(), &mut cmd8).map_err(|_| MmcError::LegacyCardUnsupported)?;
        let echoed_pattern = cmd8.response[0] & 0xFF;
        let echoed_vhs = (cmd8.response[0] >> 8) & 0xF;
        if echoed_pattern != CMD8_CHECK_PATTERN || echoed_vhs != 1 {
            warn!("mmc: CMD8 echo mismatch, refusing legacy/non-SD card");
            return Err(MmcError::LegacyCardUnsupported);
        }

        // ACMD41 cycle, step 1: read OCR with argument 0.
        let mut cmd55_probe = Command::new(APP_CMD, 0, ResponseType::R1);
        send_blocking(host.as_mut(), &mut cmd55_probe).map_err(|_| MmcError::MmcCardUnsupported)?;
        let mut acmd41_probe = Command::new(SD_APP_OP_COND, 0, ResponseType::R3);
        send_blocking(host.as_mut(), &mut acmd41_probe)?;
        let probe_ocr = acmd41_probe.response[0];

        let voltage_mask = host.default_voltage_mask(probe_ocr);
        let hcs = if voltage_mask != 0 { OCR_HCS } else { 0 };
        let arg = voltage_mask | hcs;

        let mut ocr = 0u32;
        let mut powered_up = false;
        for attempt in 0..OCR_POLL_ATTEMPTS {
            let mut cmd55 = Command::new(APP_CMD, 0, ResponseType::R1);
            send_blocking(host.as_mut(), &mut cmd55)?;
            let mut acmd41 = Command::new(SD_APP_OP_COND, arg, ResponseType::R3);
            send_blocking(host.as_mut(), &mut acmd41)?;
            ocr = acmd41.response[0];
            if ocr & OCR_BUSY != 0 {
                powered_up = true;
                break;
            }
            debug!("mmc: ACMD41 attempt {attempt} still busy");
            host.udelay(OCR_POLL_DELAY_MS * 1000);
        }
        if !powered_up {
            return Err(MmcError::PowerUpTimeout);
        }
        let high_capacity = ocr & OCR_HCS != 0;

        // CMD2: ALL_SEND_CID, R2.
        let mut cmd2 = Command::new(ALL_SEND_CID, 0, ResponseType::R2);
        send_blocking(host.as_mut(), &mut cmd2)?;
        let raw_cid = reassemble_response(cmd2.response);

        // CMD3: SEND_RELATIVE_ADDR, R6.
        let mut cmd3 = Command::new(SEND_RELATIVE_ADDR, 0, ResponseType::R6);
        send_blocking(host.as_mut(), &mut cmd3)?;
        let rca = (cmd3.response[0] >> 16) as u16;

        // CMD9: SEND_CSD, R2.
        let mut cmd9 = Command::new(SEND_CSD, (rca as u32) << 16, ResponseType::R2);
        send_blocking(host.as_mut(), &mut cmd9)?;
        let raw_csd = reassemble_response(cmd9.response);

        // CMD13: SEND_STATUS, R1.
        let mut cmd13 = Command::new(SEND_STATUS, (rca as u32) << 16, ResponseType::R1);
        send_blocking(host.as_mut(), &mut cmd13)?;

        // CMD7: SELECT_CARD, R1b.
        let mut cmd7 = Command::new(SELECT_CARD, (rca as u32) << 16, ResponseType::R1b);
        send_blocking(host.as_mut(), &mut cmd7)?;

        // CMD55 + ACMD6: SET_BUS_WIDTH (4-bit).
        let mut cmd55_bw = Command::new(APP_CMD, (rca as u32) << 16, ResponseType::R1);
        send_blocking(host.as_mut(), &mut cmd55_bw)?;
        let mut acmd6 = Command::new(SET_BUS_WIDTH, BUS_WIDTH_4BIT, ResponseType::R1);
        send_blocking(host.as_mut(), &mut acmd6)?;

        if !high_capacity {
            // CMD16: SET_BLOCKLEN = 512, standard-capacity cards only.
            let mut cmd16 = Command::new(SET_BLOCKLEN, BLOCK_SIZE, ResponseType::R1);
            send_blocking(host.as_mut(), &mut cmd16)?;
        }

        host.set_operational().map_err(MmcError::from)?;

        let cid = decode_cid(&raw_cid);
        let (capacity_bytes, csd_version) = decode_csd(&raw_csd)?;

        info!(
            "mmc: SD card ready, rca=0x{rca:04x}, {} capacity, {} bytes",
            if high_capacity { "high" } else { "standard" },
            capacity_bytes
        );

        Ok(Card {
            host,
            ocr,
            raw_cid,
            raw_csd,
            cid,
            csd_version,
            rca,
            card_type: CardType::Sd,
            status: CardStatus::Active,
            high_capacity,
            capacity_bytes,
        })
    }

    pub fn card_type(&self) -> CardType {
        self.card_type
    }

    pub fn status(&self) -> CardStatus {
        self.status
    }

    pub fn set_status(&mut self, status: CardStatus) {
        self.status = status;
    }

    pub fn rca(&self) -> u16 {
        self.rca
    }

    pub fn ocr(&self) -> u32 {
        self.ocr
    }

    pub fn raw_cid(&self) -> [u32; 4] {
        self.raw_cid
    }

    pub fn raw_csd(&self) -> [u32; 4] {
        self.raw_csd
    }

    pub fn cid(&self) -> Cid {
        self.cid
    }

    pub fn csd_version(&self) -> u8 {
        self.csd_version
    }

    pub fn is_high_capacity(&self) -> bool {
        self.high_capacity
    }

    /// Fixed at 512 bytes (spec section 4.4, "Block size").
    pub fn block_size(&self) -> u32 {
        BLOCK_SIZE
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    pub fn present_state(&self) -> u32 {
        self.host.present_state()
    }

    /// Whether this board has no working card-detect pin (spec section
    /// 4.5, "get_state").
    pub fn non_removable(&self) -> bool {
        self.host.non_removable()
    }

    /// Read `n` blocks starting at block `start` into `vbuf` (or via DMA
    /// through `pbuf` if non-zero), per spec section 4.4 "Block
    /// transfer".
    pub fn read(
        &mut self,
        start: u32,
        n: u32,
        vbuf: NonNull<u8>,
        pbuf: usize,
        cb: Option<UserCallback>,
        token: usize,
    ) -> i32 {
        self.transfer(READ_SINGLE_BLOCK, start, n, vbuf, pbuf, true, cb, token)
    }

    /// Write `n` blocks starting at block `start` from `vbuf` (or via DMA
    /// through `pbuf` if non-zero), per spec section 4.4 "Block
    /// transfer".
    pub fn write(
        &mut self,
        start: u32,
        n: u32,
        vbuf: NonNull<u8>,
        pbuf: usize,
        cb: Option<UserCallback>,
        token: usize,
    ) -> i32 {
        self.transfer(WRITE_BLOCK, start, n, vbuf, pbuf, false, cb, token)
    }

    #[allow(clippy::too_many_arguments)]
    fn transfer(
        &mut self,
        command_index: u32,
        start: u32,
        n: u32,
        vbuf: NonNull<u8>,
        pbuf: usize,
        is_read: bool,
        cb: Option<UserCallback>,
        token: usize,
    ) -> i32 {
        let arg = if self.high_capacity {
            start
        } else {
            start * BLOCK_SIZE
        };
        let data = DataDescriptor {
            vbuf,
            pbuf,
            start_block: start,
            block_size: BLOCK_SIZE,
            block_count: n,
            is_read,
        };
        let cmd = Command::new(command_index, arg, ResponseType::R1).with_data(data);

        match cb {
            Some(user_cb) => {
                let state = Box::new(AsyncState {
                    cmd,
                    n,
                    user_cb,
                    user_token: token,
                });
                let state_ptr = Box::into_raw(state);
                // SAFETY: `state_ptr` stays valid (heap-allocated, fixed
                // address) until `completion_adapter` frees it; nothing
                // else can alias `cmd` in between.
                let cmd_ref = unsafe { &mut (*state_ptr).cmd };
                let rc =
                    self.host
                        .send_command(cmd_ref, Some(completion_adapter), state_ptr as usize);
                if rc < 0 {
                    // Submission failed synchronously: no callback will
                    // ever fire, free everything now.
                    unsafe {
                        drop(Box::from_raw(state_ptr));
                    }
                    return rc;
                }
                0
            }
            None => {
                let mut cmd = cmd;
                let rc = self.host.send_command(&mut cmd, None, 0);
                if rc < 0 {
                    rc
                } else {
                    (BLOCK_SIZE * n) as i32
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassemble_shifts_each_word_left_by_one_byte_with_carry() {
        // Hardware stores the 120-bit CID right-aligned across the low
        // 15 bytes of a 16-byte field; reassembly must carry the top byte
        // of each word into the bottom byte of the next.
        let raw = [0x1122_3344u32, 0x5566_7788, 0x99AA_BBCC, 0x00DD_EEFF];
        let out = reassemble_response(raw);
        assert_eq!(out[0], 0x2233_4400);
        assert_eq!(out[1], 0x6677_8811);
        assert_eq!(out[2], 0xAABB_CC55);
        assert_eq!(out[3], 0xDDEE_FF99);
    }

    #[test]
    fn decode_cid_extracts_documented_fields() {
        // Build a raw CID with known values at each documented bit offset
        // and confirm decode_cid reads them back.
        let mut raw = [0u32; 4];
        super::super::bits::write_bits(&mut raw, 120, 8, 0x1A); // manfid
        super::super::bits::write_bits(&mut raw, 104, 16, 0xBEEF); // oemid
        for (i, b) in b"RUST1".iter().enumerate() {
            super::super::bits::write_bits(&mut raw, 64 + 8 * i as u32, 8, *b as u64);
        }
        super::super::bits::write_bits(&mut raw, 56, 8, 0x03); // rev
        super::super::bits::write_bits(&mut raw, 24, 32, 0xDEAD_BEEF); // serial
        super::super::bits::write_bits(&mut raw, 8, 12, 0x123); // date

        let cid = decode_cid(&raw);
        assert_eq!(cid.manfid, 0x1A);
        assert_eq!(cid.oemid, 0xBEEF);
        assert_eq!(&cid.name, b"RUST1");
        assert_eq!(cid.rev, 0x03);
        assert_eq!(cid.serial, 0xDEAD_BEEF);
        assert_eq!(cid.date, 0x123);
    }

    #[test]
    fn decode_csd_v0_computes_standard_capacity_formula() {
        let mut raw = [0u32; 4];
        super::super::bits::write_bits(&mut raw, 126, 2, 0); // CSD_STRUCTURE
        super::super::bits::write_bits(&mut raw, 80, 4, 9); // READ_BL_LEN
        super::super::bits::write_bits(&mut raw, 62, 12, 0x3AB); // C_SIZE
        super::super::bits::write_bits(&mut raw, 47, 3, 3); // C_SIZE_MULT

        let (capacity, version) = decode_csd(&raw).unwrap();
        assert_eq!(version, 0);
        let expected = (0x3ABu64 + 1) * (1 << (3 + 2)) * (1 << 9);
        assert_eq!(capacity, expected);
    }

    #[test]
    fn decode_csd_v1_computes_sdhc_capacity_formula() {
        let mut raw = [0u32; 4];
        super::super::bits::write_bits(&mut raw, 126, 2, 1); // CSD_STRUCTURE
        super::super::bits::write_bits(&mut raw, 48, 22, 0x1000); // C_SIZE

        let (capacity, version) = decode_csd(&raw).unwrap();
        assert_eq!(version, 1);
        assert_eq!(capacity, (0x1000u64 + 1) * 512 * 1024);
    }

    #[test]
    fn decode_csd_rejects_unsupported_structure_version() {
        let mut raw = [0u32; 4];
        super::super::bits::write_bits(&mut raw, 126, 2, 2);
        assert_eq!(decode_csd(&raw), Err(MmcError::UnsupportedCsdVersion));
    }
}
