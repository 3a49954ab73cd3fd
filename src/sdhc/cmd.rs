//! Command and data-descriptor structures flowing through the command
//! queue (spec section 3, "Command" / "Data descriptor").

use core::ptr::NonNull;

/// Tag identifying which response format a command expects.
///
/// Drives both the transfer-type encoding ([`ResponseType::xfr_bits`]) and
/// the response-copy logic in the interrupt dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    None,
    R1,
    R1b,
    R2,
    R3,
    R4,
    R5,
    R5b,
    R6,
}

impl ResponseType {
    /// `(rsptyp, cicen, cccen)` bits per the response-type encoding table.
    pub fn xfr_bits(self) -> (u32, bool, bool) {
        match self {
            ResponseType::None => (0b00, false, false),
            ResponseType::R2 => (0b01, false, true),
            ResponseType::R3 | ResponseType::R4 => (0b10, false, false),
            ResponseType::R1 | ResponseType::R5 | ResponseType::R6 => (0b10, true, true),
            ResponseType::R1b | ResponseType::R5b => (0b11, true, true),
        }
    }
}

/// A data transfer attached to a command (spec section 3, "Data
/// descriptor").
#[derive(Debug, Clone, Copy)]
pub struct DataDescriptor {
    /// CPU-visible buffer address used for PIO.
    pub vbuf: NonNull<u8>,
    /// DMA-visible physical address; `0` means PIO, not DMA.
    pub pbuf: usize,
    /// Starting block address (card-relative, not byte offset).
    pub start_block: u32,
    /// Block size in bytes.
    pub block_size: u32,
    /// Block count.
    pub block_count: u32,
    /// Data direction: `true` if the card is sending data to the host.
    pub is_read: bool,
}

/// Completion callback signature: `(status, token)`.
///
/// Matches the dispatcher's invocation `(facade, 0, cmd, token)` from spec
/// section 4.3, minus the facade argument — callers close over whatever
/// facade handle they need, since the dispatcher already holds `&mut
/// Self` when it fires the callback.
pub type CommandCallback = fn(status: i32, token: usize);

/// One SD protocol command, in flight or waiting in the queue (spec
/// section 3, "Command").
///
/// `next` is an intrusive link, not an owning pointer: whoever calls
/// [`super::host::SdioHost::send_command`] keeps `Command` pinned (on the
/// stack for the blocking path, or boxed on the heap for the callback
/// path) until the queue detaches it. See the crate-level design note on
/// dynamic memory.
pub struct Command {
    pub index: u32,
    pub arg: u32,
    pub response_type: ResponseType,
    pub response: [u32; 4],
    pub data: Option<DataDescriptor>,
    /// `0` pending, `1` success, negative on error.
    pub complete: i32,
    pub callback: Option<CommandCallback>,
    pub token: usize,
    pub(crate) next: Option<NonNull<Command>>,
}

impl Command {
    pub fn new(index: u32, arg: u32, response_type: ResponseType) -> Self {
        Self {
            index,
            arg,
            response_type,
            response: [0; 4],
            data: None,
            complete: 0,
            callback: None,
            token: 0,
            next: None,
        }
    }

    pub fn with_data(mut self, data: DataDescriptor) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_pending(&self) -> bool {
        self.complete == 0
    }
}

impl core::fmt::Debug for Command {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Command")
            .field("index", &self.index)
            .field("arg", &self.arg)
            .field("response_type", &self.response_type)
            .field("complete", &self.complete)
            .finish()
    }
}
