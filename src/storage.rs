//! # Storage surface (C6)
//!
//! Validated block read/write/erase operations layered over the MMC
//! protocol layer (spec section 4.5). Every operation checks the
//! [`ReadinessBitmap`] before touching hardware, validates its
//! parameters against the card's reported geometry and the caller's
//! [`Dataport`] capacity, then loops single-block transfers while
//! holding the card lock only for the duration of each block.

use core::ptr::NonNull;

use log::warn;
use spin::Mutex;

use crate::mmc::Card;
use crate::sdhc::regs::PresState;

/// Public error taxonomy for the RPC surface (spec section 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    Success,
    InvalidState,
    DeviceNotPresent,
    InvalidParameter,
    OutOfBounds,
    Aborted,
    AccessDenied,
    NotImplemented,
    NotSupported,
    Generic,
}

/// State flags reported by [`Storage::get_state`] (spec section 6).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateFlags(u32);

impl StateFlags {
    pub const MEDIUM_PRESENT: StateFlags = StateFlags(1 << 0);

    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl core::ops::BitOr for StateFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        StateFlags(self.0 | rhs.0)
    }
}

/// Which bring-up stage failed, for the [`ReadinessBitmap`] (spec section
/// 3, "Readiness bitmap").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStage {
    IoOps,
    Sdio,
    CardNotPresent,
    Mmc,
    Irq,
}

/// A small bit set recording init failures by stage, plus a sentinel
/// "never attempted" value (spec section 3). The storage surface
/// consults this before ever touching hardware.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadinessBitmap {
    attempted: bool,
    failures: u32,
}

impl ReadinessBitmap {
    pub const fn never_attempted() -> Self {
        Self {
            attempted: false,
            failures: 0,
        }
    }

    pub fn record_attempt(&mut self) {
        self.attempted = true;
    }

    pub fn mark_failed(&mut self, stage: InitStage) {
        self.failures |= 1 << (stage as u32);
    }

    pub fn failed(&self, stage: InitStage) -> bool {
        self.failures & (1 << (stage as u32)) != 0
    }

    pub fn is_ready(&self) -> bool {
        self.attempted && self.failures == 0
    }

    /// Map this bitmap to the error the storage surface's common
    /// preamble should return, without touching hardware (spec section
    /// 4.5, "Common preamble").
    pub fn classify(&self) -> DriverError {
        if !self.attempted {
            return DriverError::InvalidState;
        }
        if self.failed(InitStage::CardNotPresent) {
            return DriverError::DeviceNotPresent;
        }
        if self.failures != 0 {
            return DriverError::InvalidState;
        }
        DriverError::Success
    }
}

/// A fixed-size shared byte buffer supplied by the enclosing system
/// (spec section 3, "Dataport"). Its size bounds the maximum size of a
/// single storage RPC; this crate never retains a reference past a
/// single call.
pub trait Dataport {
    fn as_slice(&self) -> &[u8];
    fn as_mut_slice(&mut self) -> &mut [u8];

    fn capacity(&self) -> usize {
        self.as_slice().len()
    }
}

/// Validate `(offset, size)` against the card's geometry and the
/// dataport's capacity (spec section 4.5, bulleted validation rules).
fn verify_parameters(
    offset: i64,
    size: i64,
    block_size: u32,
    total: i64,
    dataport_capacity: usize,
) -> Result<(), DriverError> {
    if offset < 0 || size < 0 {
        return Err(DriverError::InvalidParameter);
    }
    if block_size == 0 || total <= 0 {
        return Err(DriverError::InvalidParameter);
    }
    if size as u128 > dataport_capacity as u128 {
        return Err(DriverError::InvalidParameter);
    }
    let block_size = block_size as i64;
    if offset % block_size != 0 || size % block_size != 0 {
        return Err(DriverError::InvalidParameter);
    }
    // uintmax-promoted addition so offset+size can never silently wrap.
    if offset as u128 + size as u128 > total as u128 {
        return Err(DriverError::OutOfBounds);
    }
    Ok(())
}

/// The block-addressed storage surface (spec section 2, C6). Binds a
/// [`Card`] — absent if bring-up never completed — behind a single lock
/// serializing RPC handlers against interrupt delivery (spec section 5).
pub struct Storage {
    card: Mutex<Option<Card>>,
    readiness: ReadinessBitmap,
}

impl Storage {
    pub fn new(card: Option<Card>, readiness: ReadinessBitmap) -> Self {
        Self {
            card: Mutex::new(card),
            readiness,
        }
    }

    pub fn readiness(&self) -> ReadinessBitmap {
        self.readiness
    }

    /// Acquire the card lock, mapping contention to [`DriverError::AccessDenied`]
    /// (spec section 7, "mutex failures"). Under the default busy-poll
    /// model this never contends — the same execution context that holds
    /// the lock is the one re-entering `handle_irq` — so it degrades to
    /// a plain blocking lock. Under the `irq` feature a real interrupt
    /// thread may contend with the RPC path, so a failed `try_lock` is
    /// surfaced instead of blocking indefinitely.
    fn lock_card(&self) -> Result<spin::MutexGuard<'_, Option<Card>>, DriverError> {
        #[cfg(feature = "irq")]
        {
            self.card.try_lock().ok_or(DriverError::AccessDenied)
        }
        #[cfg(not(feature = "irq"))]
        {
            Ok(self.card.lock())
        }
    }

    fn geometry(&self) -> Result<(u32, i64), DriverError> {
        let guard = self.lock_card()?;
        let card = guard.as_ref().expect("readiness checked Success before locking");
        Ok((card.block_size(), card.capacity_bytes() as i64))
    }

    fn block_io(
        &self,
        offset: i64,
        size: usize,
        dataport: &mut dyn Dataport,
        is_write: bool,
        fill_erase_pattern: bool,
    ) -> (DriverError, usize) {
        let pre = self.readiness.classify();
        if pre != DriverError::Success {
            return (pre, 0);
        }

        let (block_size, total) = match self.geometry() {
            Ok(g) => g,
            Err(e) => return (e, 0),
        };

        if let Err(e) = verify_parameters(offset, size as i64, block_size, total, dataport.capacity())
        {
            return (e, 0);
        }

        if size == 0 {
            return (DriverError::Success, 0);
        }

        if fill_erase_pattern {
            dataport.as_mut_slice()[..size].fill(0xFF);
        }

        let start_block = offset as u64 / block_size as u64;
        let n_blocks = (size as u64 - 1) / block_size as u64 + 1;
        let mut transferred = 0usize;

        for i in 0..n_blocks {
            let block_offset = (i * block_size as u64) as usize;
            let guard = match self.lock_card() {
                Ok(g) => g,
                Err(e) => return (e, transferred),
            };
            let mut guard = guard;
            let card = guard
                .as_mut()
                .expect("readiness checked Success before locking");

            // SAFETY: `block_offset..block_offset+block_size` was bounds
            // checked against `dataport.capacity()` above.
            let vbuf = unsafe {
                NonNull::new_unchecked(dataport.as_mut_slice()[block_offset..].as_mut_ptr())
            };
            let block = start_block as u32 + i as u32;
            let rc = if is_write {
                card.write(block, 1, vbuf, 0, None, 0)
            } else {
                card.read(block, 1, vbuf, 0, None, 0)
            };
            drop(guard);

            if rc < 0 {
                warn!("storage: block {block} transfer failed, rc={rc}");
                return (DriverError::Aborted, transferred);
            }
            transferred += rc as usize;
        }

        if transferred == size {
            (DriverError::Success, transferred)
        } else {
            (DriverError::Aborted, transferred)
        }
    }

    /// `write(offset, size, out written) -> Err` (spec section 6).
    pub fn write(&self, offset: i64, size: usize, dataport: &mut dyn Dataport) -> (DriverError, usize) {
        self.block_io(offset, size, dataport, true, false)
    }

    /// `read(offset, size, out read) -> Err` (spec section 6).
    pub fn read(&self, offset: i64, size: usize, dataport: &mut dyn Dataport) -> (DriverError, usize) {
        self.block_io(offset, size, dataport, false, false)
    }

    /// `erase(offset, size, out erased) -> Err` (spec section 6).
    ///
    /// Open question 3 (spec section 9) resolved: implemented as the
    /// 0xFF-overwrite convenience policy, always available, gated behind
    /// no feature flag — it costs nothing beyond the write path already
    /// implemented.
    pub fn erase(&self, offset: i64, size: i64, dataport: &mut dyn Dataport) -> (DriverError, i64) {
        if size < 0 {
            return (DriverError::InvalidParameter, 0);
        }
        let (status, written) = self.block_io(offset, size as usize, dataport, true, true);
        (status, written as i64)
    }

    /// `get_size(out size) -> Err` (spec section 6).
    pub fn get_size(&self) -> (DriverError, i64) {
        let pre = self.readiness.classify();
        if pre != DriverError::Success {
            return (pre, 0);
        }
        match self.geometry() {
            Ok((_, total)) => (DriverError::Success, total),
            Err(e) => (e, 0),
        }
    }

    /// `get_block_size(out blk) -> Err` (spec section 6).
    pub fn get_block_size(&self) -> (DriverError, usize) {
        let pre = self.readiness.classify();
        if pre != DriverError::Success {
            return (pre, 0);
        }
        match self.geometry() {
            Ok((block_size, _)) => (DriverError::Success, block_size as usize),
            Err(e) => (e, 0),
        }
    }

    /// `get_state(out flags) -> Err` (spec section 6). Reports
    /// `MEDIUM_PRESENT` iff the controller's card-inserted pin reads
    /// asserted, unless the board has no working card-detect pin, in
    /// which case the flag is hard-wired on (spec section 4.5,
    /// "get_state").
    pub fn get_state(&self) -> (DriverError, u32) {
        let pre = self.readiness.classify();
        if pre != DriverError::Success {
            return (pre, 0);
        }
        let guard = match self.lock_card() {
            Ok(g) => g,
            Err(e) => return (e, 0),
        };
        let card = guard.as_ref().expect("readiness checked Success before locking");
        let present = card.non_removable()
            || PresState::from_bits_retain(card.present_state()).contains(PresState::CINST);
        let flags = if present {
            StateFlags::MEDIUM_PRESENT
        } else {
            StateFlags::default()
        };
        (DriverError::Success, flags.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness_never_attempted_is_invalid_state() {
        assert_eq!(
            ReadinessBitmap::never_attempted().classify(),
            DriverError::InvalidState
        );
    }

    #[test]
    fn readiness_card_not_present_wins() {
        let mut bitmap = ReadinessBitmap::never_attempted();
        bitmap.record_attempt();
        bitmap.mark_failed(InitStage::CardNotPresent);
        assert_eq!(bitmap.classify(), DriverError::DeviceNotPresent);
    }

    #[test]
    fn readiness_other_failures_are_invalid_state() {
        let mut bitmap = ReadinessBitmap::never_attempted();
        bitmap.record_attempt();
        bitmap.mark_failed(InitStage::Mmc);
        assert_eq!(bitmap.classify(), DriverError::InvalidState);
    }

    #[test]
    fn readiness_success_when_clean() {
        let mut bitmap = ReadinessBitmap::never_attempted();
        bitmap.record_attempt();
        assert_eq!(bitmap.classify(), DriverError::Success);
        assert!(bitmap.is_ready());
    }

    const CAPACITY: i64 = 8589934592; // 8 GiB
    const BLOCK: u32 = 512;

    #[test]
    fn verify_rejects_negative_offset_or_size() {
        assert_eq!(
            verify_parameters(-1, 512, BLOCK, CAPACITY, 4096),
            Err(DriverError::InvalidParameter)
        );
        assert_eq!(
            verify_parameters(0, -512, BLOCK, CAPACITY, 4096),
            Err(DriverError::InvalidParameter)
        );
    }

    #[test]
    fn verify_rejects_misaligned_offset() {
        assert_eq!(
            verify_parameters(1, 512, BLOCK, CAPACITY, 4096),
            Err(DriverError::InvalidParameter)
        );
    }

    #[test]
    fn verify_allows_zero_size_at_capacity() {
        assert_eq!(
            verify_parameters(CAPACITY, 0, BLOCK, CAPACITY, 4096),
            Ok(())
        );
    }

    #[test]
    fn verify_rejects_spill_past_end() {
        // Last valid read is offset=CAPACITY-512, size=512; +1024 spills.
        assert_eq!(
            verify_parameters(CAPACITY - 512, 1024, BLOCK, CAPACITY, 4096),
            Err(DriverError::OutOfBounds)
        );
    }

    #[test]
    fn verify_rejects_size_over_dataport_capacity() {
        assert_eq!(
            verify_parameters(0, 4608, BLOCK, CAPACITY, 4096),
            Err(DriverError::InvalidParameter)
        );
    }

    #[test]
    fn verify_detects_overflowing_addition() {
        // Block-aligned, near `i64::MAX`: naive `i64` addition of offset+size
        // would wrap negative; the `u128`-promoted check must still reject it.
        let offset = i64::MAX - (i64::MAX % BLOCK as i64);
        assert_eq!(
            verify_parameters(offset, 512, BLOCK, CAPACITY, 4096),
            Err(DriverError::OutOfBounds)
        );
    }
}
