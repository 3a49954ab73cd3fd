//! Host-engine error type.

use crate::regs::RegError;

/// Errors raised by the register model and the host engine (C2-C4).
///
/// Kept distinct from [`crate::mmc::MmcError`] (protocol-level) and
/// [`crate::storage::DriverError`] (block-surface taxonomy) — each layer
/// reports failures in its own vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdhcError {
    /// A register-state polling loop exhausted its retry budget.
    Timeout,
    /// A command or data CRC/end-bit/index check failed.
    CommandError,
    /// The controller reported a data CRC, end-bit, or timeout error.
    DataError,
    /// A DMA or ADMA transfer error was latched.
    DmaError,
    /// The card was removed while a command was in flight.
    CardRemoved,
    /// The requested clock could not be programmed (no stable clock, or no
    /// matching timing mode).
    ClockError,
    /// Card not present where one was required.
    NoCard,
}

impl RegError for SdhcError {
    fn timeout() -> Self {
        SdhcError::Timeout
    }
}

/// Result type for host-engine operations.
pub type SdhcResult<T = ()> = Result<T, SdhcError>;
