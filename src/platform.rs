//! # Platform abstraction
//!
//! The host engine never touches a board-support package directly. Instead
//! every board-specific concern — where the SDHC registers are mapped, which
//! IRQ line feeds them, how DMA memory is obtained, how to busy-wait a few
//! microseconds, and which card voltages this particular board wiring can
//! actually deliver — is hidden behind the [`Platform`] trait.
//!
//! Clock tuning, GPIO pin routing, and mailbox power-on sequencing are board
//! internals the host engine never sees; a platform only ever exposes the
//! handful of primitives below.

use core::ptr::NonNull;
use core::time::Duration;

/// Identifies which supported SoC family produced a [`Platform`] instance.
///
/// Used for log messages and register dumps only — the host engine must
/// never branch on this; per-platform variation belongs entirely inside the
/// `Platform` implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostId {
    /// NXP i.MX6 family, up to 4 SDHC instances.
    Imx6(u8),
    /// Broadcom BCM2837 (Raspberry Pi 3).
    Bcm2837,
    /// Broadcom BCM2711 (Raspberry Pi 4).
    Bcm2711,
}

/// Flags describing a DMA buffer allocation request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DmaAllocFlags {
    /// Zero the buffer before handing it back.
    pub zeroed: bool,
}

/// Board/platform support consumed by the host engine.
///
/// An implementation owns no protocol knowledge; it only answers questions
/// about the hardware it was built for.
pub trait Platform {
    /// Map `size` bytes of MMIO space at physical address `paddr` and
    /// return the address the CPU can use to access it.
    ///
    /// # Safety
    ///
    /// `paddr`/`size` must describe a real, exclusively-owned MMIO region.
    unsafe fn map(&self, paddr: usize, size: usize) -> NonNull<u8>;

    /// Allocate a DMA-capable buffer of `size` bytes aligned to `align`.
    ///
    /// Returns `(vaddr, paddr)`. A `paddr` of `0` signals that DMA is
    /// unavailable and callers must fall back to PIO.
    fn alloc_dma(
        &self,
        size: usize,
        align: usize,
        flags: DmaAllocFlags,
    ) -> Option<(NonNull<u8>, usize)>;

    /// Busy-wait for at least `us` microseconds.
    fn udelay(&self, us: u32) {
        crate::sleep(Duration::from_micros(us as u64));
    }

    /// Whether this board's wiring can actually deliver `mv` millivolts to
    /// the card slot (beyond what the controller reports it supports).
    fn is_voltage_compatible(&self, mv: u32) -> bool;

    /// The voltage mask to offer a card during ACMD41 negotiation, given
    /// the card's OCR snapshot read with argument `0` — the only thing
    /// known about it at that point in bring-up (spec section 4.4, step
    /// 4).
    fn default_voltage_mask(&self, ocr: u32) -> u32;

    /// IRQ numbers feeding this controller instance, in host-defined order.
    fn irq_table(&self) -> &[u32];

    /// Identify which board family this instance belongs to.
    fn default_id(&self) -> HostId;

    /// Whether the card is soldered down / otherwise permanently
    /// attached, i.e. this board wiring has no working card-detect pin
    /// (spec section 4.5, "get_state": "If the platform lacks working
    /// card-detect, `MEDIUM_PRESENT` is hard-wired on"). Defaults to
    /// `false` (a normal, removable slot with a working detect pin).
    fn non_removable(&self) -> bool {
        false
    }
}
