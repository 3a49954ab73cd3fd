//! # Lifecycle / init (C7)
//!
//! Binds a [`Platform`] implementation to a freshly constructed
//! [`Sdhc`] engine, runs [`Card::init`], and exposes the
//! [`ReadinessBitmap`] described in spec section 3: construct the host
//! engine unconditionally, then run hardware bring-up as a distinct
//! step whose failures are recorded rather than propagated, so callers
//! always get back a `Storage` that rejects operations cleanly instead
//! of a constructor that can fail.

use alloc::boxed::Box;

use log::{error, info};

use crate::mmc::{Card, MmcError};
use crate::platform::Platform;
use crate::sdhc::regs::PresState;
use crate::sdhc::{Sdhc, SdioHost};
use crate::storage::{InitStage, ReadinessBitmap, Storage};

/// Bring up the SDHC host and attached SD card behind `platform`, and
/// return the block-addressed [`Storage`] surface the RPC glue layer
/// drives.
///
/// Never fails outright: every bring-up problem — no card inserted, an
/// unsupported card family, a hardware error mid-identification — is
/// recorded in the returned [`Storage`]'s [`ReadinessBitmap`] instead, so
/// callers always get a `Storage` whose operations report the right
/// error without this function itself returning a `Result` (spec
/// section 3, "the storage surface consults this bitmap to return the
/// right error without touching hardware").
///
/// `base_paddr`/`region_size` name the board slot to bring up (spec
/// section 6, "Platform configuration" — see [`crate::boards`] for the
/// three supported SoC families' constants).
pub fn init(platform: Box<dyn Platform>, base_paddr: usize, region_size: usize) -> Storage {
    let mut readiness = ReadinessBitmap::never_attempted();
    readiness.record_attempt();

    // SAFETY: `base_paddr`/`region_size` describe a real, exclusively
    // owned MMIO region, per this function's contract.
    let base = unsafe { platform.map(base_paddr, region_size) };

    let sdhc = Sdhc::new(platform, base);
    let mut host: Box<dyn SdioHost> = Box::new(sdhc);

    let card_inserted = match reset_and_probe(&mut host) {
        Ok(inserted) => inserted,
        Err(e) => {
            error!("lifecycle: sdhc reset failed: {e:?}");
            readiness.mark_failed(InitStage::IoOps);
            return Storage::new(None, readiness);
        }
    };

    if !card_inserted {
        readiness.mark_failed(InitStage::CardNotPresent);
        return Storage::new(None, readiness);
    }

    bring_up_card(host, readiness)
}

/// Reset the host and report whether a card is physically inserted,
/// without running the identification state machine yet.
fn reset_and_probe(host: &mut Box<dyn SdioHost>) -> Result<bool, crate::sdhc::SdhcError> {
    host.reset()?;
    let present = PresState::from_bits_retain(host.present_state()).contains(PresState::CINST);
    Ok(present)
}

fn bring_up_card(host: Box<dyn SdioHost>, mut readiness: ReadinessBitmap) -> Storage {
    match Card::init(host) {
        Ok(card) => {
            info!("lifecycle: card bring-up complete");
            Storage::new(Some(card), readiness)
        }
        Err(e) => {
            error!("lifecycle: card bring-up failed: {e:?}");
            match e {
                MmcError::LegacyCardUnsupported | MmcError::MmcCardUnsupported => {
                    readiness.mark_failed(InitStage::Sdio)
                }
                _ => readiness.mark_failed(InitStage::Mmc),
            }
            Storage::new(None, readiness)
        }
    }
}
