//! # SDHC / SD card block driver core
//!
//! This crate implements the core of a Secure Digital Host Controller (SDHC)
//! driver: card identification, the host-controller command/transfer engine
//! with its interrupt-driven completion pipeline, and a block-addressed
//! storage surface layered on top.
//!
//! It is deliberately agnostic to the component that publishes these block
//! operations as remote calls, and to the platform support layer that
//! supplies MMIO base addresses, IRQ numbers, a DMA allocator and a
//! microsecond delay — both are abstracted behind the [`platform::Platform`]
//! trait so this crate can be reused across SoC families.
//!
//! ## Modules
//!
//! - [`platform`]: the board/platform abstraction (C1)
//! - [`boards`]: per-SoC MMIO/IRQ constant tables built on [`platform`]
//! - [`sdhc`]: register model, command queue, and host engine (C2-C4)
//! - [`mmc`]: SD card identification and block transfer protocol (C5)
//! - [`storage`]: validated block read/write/erase surface (C6)
//! - [`lifecycle`]: binds a platform to a host, runs card bring-up (C7)

#![no_std]
#![allow(clippy::new_without_default)]

#[cfg(all(feature = "dma", feature = "pio"))]
compile_error!("can't enable feature dma and pio at the same time!");
#[cfg(all(feature = "irq", feature = "poll"))]
compile_error!("can't enable feature irq and poll at the same time!");

extern crate alloc;

#[macro_use]
pub mod regs;
mod arch;
pub mod boards;
pub mod lifecycle;
pub mod mmc;
pub mod platform;
pub mod sdhc;
pub mod storage;

use core::time::Duration;

/// Host-supplied runtime service this crate cannot provide on its own: a
/// blocking microsecond-class delay.
///
/// Kept separate from [`platform::Platform`] because it has no per-instance
/// state: a single hook resolved once per binary via [`set_impl`], rather
/// than a method every `Platform` implementation would have to repeat.
pub trait Kernel {
    /// Block the calling context for at least `duration`.
    fn sleep(duration: Duration);
}

pub(crate) fn sleep(duration: Duration) {
    unsafe extern "Rust" {
        fn _sdhc_sd_sleep(duration: Duration);
    }

    unsafe {
        _sdhc_sd_sleep(duration);
    }
}

/// Wire a concrete [`Kernel`] implementation into this crate.
///
/// Call this once, anywhere linked into the final binary:
///
/// ```rust,ignore
/// struct KernelImpl;
/// impl Kernel for KernelImpl {
///     fn sleep(duration: core::time::Duration) { /* ... */ }
/// }
/// set_impl!(KernelImpl);
/// ```
#[macro_export]
macro_rules! set_impl {
    ($t: ty) => {
        #[unsafe(no_mangle)]
        unsafe fn _sdhc_sd_sleep(duration: core::time::Duration) {
            <$t as $crate::Kernel>::sleep(duration)
        }
    };
}
