//! # MMC/SD protocol layer (C5)
//!
//! SD card identification state machine, CID/CSD decoding, and the
//! block read/write entry points the storage surface drives (spec
//! section 4.4).
//!
//! ## Modules
//!
//! - **consts**: SD command indices and OCR/ACMD41 bit layout
//! - **bits**: general bit-slice primitive used by the CID/CSD decoder
//! - **err**: [`err::MmcError`] and [`err::MmcResult`]
//! - **card**: [`card::Card`], the identification state machine, and
//!   block transfer

pub mod bits;
pub mod card;
pub mod consts;
pub mod err;

pub use card::{Card, CardStatus, CardType, Cid, UserCallback};
pub use err::{MmcError, MmcResult};
