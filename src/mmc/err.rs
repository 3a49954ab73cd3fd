//! MMC/SD protocol-layer error type (spec section 4.4).
//!
//! Kept distinct from [`crate::sdhc::SdhcError`] (hardware/controller
//! level) and [`crate::storage::DriverError`] (block-surface taxonomy) —
//! each layer reports failures in its own vocabulary instead of forcing
//! everything through one flat enum.

use crate::sdhc::SdhcError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmcError {
    /// The host engine reported a failure while a bring-up command was in
    /// flight.
    Host(SdhcError),
    /// CMD8 never completed or its echoed voltage/check pattern didn't
    /// match: a legacy SD v1.x (or non-SD) card, not supported.
    LegacyCardUnsupported,
    /// CMD55 failed: the card is an MMC card, not supported.
    MmcCardUnsupported,
    /// ACMD41 never reported the busy bit clear within the retry budget.
    PowerUpTimeout,
    /// CSD structure version is neither 1.0 nor 2.0/3.0.
    UnsupportedCsdVersion,
}

impl From<SdhcError> for MmcError {
    fn from(e: SdhcError) -> Self {
        MmcError::Host(e)
    }
}

pub type MmcResult<T = ()> = Result<T, MmcError>;
