//! # SDHC host controller (C2-C4)
//!
//! The typed register model ([`regs`]), the command/data types flowing
//! through the command queue ([`cmd`], [`queue`]), and the host engine
//! that drives the hardware and dispatches its interrupts ([`host`]).
//!
//! ## Modules
//!
//! - **constants**: register byte offsets and tuning constants
//! - **err**: [`err::SdhcError`] and [`err::SdhcResult`]
//! - **regs**: one `bitflags!` struct per hardware register
//! - **cmd**: [`cmd::Command`] / [`cmd::DataDescriptor`]
//! - **queue**: the intrusive command FIFO
//! - **host**: [`host::SdioHost`] facade and the [`host::Sdhc`] engine

pub mod cmd;
pub mod constants;
pub mod err;
pub mod host;
pub mod queue;
pub mod regs;

pub use cmd::{Command, CommandCallback, DataDescriptor, ResponseType};
pub use err::{SdhcError, SdhcResult};
pub use host::{Sdhc, SdioHost};
