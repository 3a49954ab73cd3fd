//! Command queue: a singly linked FIFO rooted at the host (spec section 3,
//! "Command queue").
//!
//! This is the intrusive-linked-list form the design notes call out as an
//! alternative to an owning boxed-node FIFO: the queue never allocates
//! and never owns a [`Command`] — it only links and unlinks pointers into
//! storage the caller already controls (a stack frame for the blocking
//! path, a `Box` the caller holds onto for the callback path). The head
//! is always the command whose registers are currently programmed in
//! hardware; only [`CommandQueue::push`] appends to the tail and only
//! [`CommandQueue::advance`] moves the head.

use core::ptr::NonNull;

use super::cmd::Command;

pub struct CommandQueue {
    head: Option<NonNull<Command>>,
    tail: Option<NonNull<Command>>,
}

impl CommandQueue {
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn head(&self) -> Option<&Command> {
        // SAFETY: `head`, while `Some`, always points at a command kept
        // alive by its caller until `advance` removes it.
        self.head.map(|p| unsafe { p.as_ref() })
    }

    pub fn head_mut(&mut self) -> Option<&mut Command> {
        self.head.map(|mut p| unsafe { p.as_mut() })
    }

    /// Append `cmd` to the tail. Returns `true` if the queue was empty
    /// (i.e. `cmd` is now the head and hardware must be programmed for
    /// it).
    ///
    /// # Safety
    ///
    /// `cmd` must stay valid and must not move in memory until it is
    /// returned by [`CommandQueue::advance`].
    pub unsafe fn push(&mut self, cmd: &mut Command) -> bool {
        cmd.next = None;
        let ptr = NonNull::from(cmd);
        match self.tail {
            None => {
                self.head = Some(ptr);
                self.tail = Some(ptr);
                true
            }
            Some(mut old_tail) => {
                // SAFETY: `old_tail` is a live node per this fn's own
                // invariant.
                unsafe { old_tail.as_mut().next = Some(ptr) };
                self.tail = Some(ptr);
                false
            }
        }
    }

    /// Detach and return the current head, advancing to the next node.
    /// Returns `None` if the queue was already empty.
    pub fn advance(&mut self) -> Option<NonNull<Command>> {
        let old_head = self.head.take()?;
        // SAFETY: `old_head` is a live node per `push`'s invariant.
        let next = unsafe { old_head.as_ref().next };
        match next {
            Some(n) => self.head = Some(n),
            None => {
                self.head = None;
                self.tail = None;
            }
        }
        Some(old_head)
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdhc::cmd::ResponseType;

    #[test]
    fn push_into_empty_reports_new_head() {
        let mut q = CommandQueue::new();
        let mut a = Command::new(1, 0, ResponseType::R1);
        assert!(unsafe { q.push(&mut a) });
    }

    #[test]
    fn push_into_nonempty_reports_not_head() {
        let mut q = CommandQueue::new();
        let mut a = Command::new(1, 0, ResponseType::R1);
        let mut b = Command::new(2, 0, ResponseType::R1);
        assert!(unsafe { q.push(&mut a) });
        assert!(!unsafe { q.push(&mut b) });
    }

    #[test]
    fn fifo_ordering_preserved() {
        let mut q = CommandQueue::new();
        let mut a = Command::new(1, 0, ResponseType::R1);
        let mut b = Command::new(2, 0, ResponseType::R1);
        let mut c = Command::new(3, 0, ResponseType::R1);
        unsafe {
            q.push(&mut a);
            q.push(&mut b);
            q.push(&mut c);
        }

        assert_eq!(unsafe { q.advance().unwrap().as_ref().index }, 1);
        assert_eq!(unsafe { q.advance().unwrap().as_ref().index }, 2);
        assert_eq!(unsafe { q.advance().unwrap().as_ref().index }, 3);
        assert!(q.advance().is_none());
    }

    #[test]
    fn advance_on_empty_is_none() {
        let mut q = CommandQueue::new();
        assert!(q.advance().is_none());
    }

    #[test]
    fn head_reflects_front_of_queue() {
        let mut q = CommandQueue::new();
        let mut a = Command::new(7, 0, ResponseType::R1);
        let mut b = Command::new(8, 0, ResponseType::R1);
        unsafe {
            q.push(&mut a);
            q.push(&mut b);
        }
        assert_eq!(q.head().unwrap().index, 7);
        q.advance();
        assert_eq!(q.head().unwrap().index, 8);
    }
}
