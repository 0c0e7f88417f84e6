use heapless::Vec;

use crate::regmap::{AsyncStatus, Completer, CompletionWatch, IoError, format::RegBuf};

/// Payload capacity of a [`BurstMessage`].
///
/// Backends may accept less per transfer; see
/// [`BurstBus::max_burst_len`](crate::regmap::BurstBus::max_burst_len).
pub const BURST_CAPACITY: usize = 256;

/// Lifecycle of a burst message.
///
/// Transitions only move forward one step at a time; `Completed` is reached
/// by [`BurstMessage::complete`] or [`BurstMessage::finish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BurstState {
    Allocated,
    Locked,
    Submitted,
    Completed,
}

/// One asynchronous bulk write: formatted register address, payload, and the
/// completion that reports its terminal status.
///
/// Ownership moves to the backend on submission. Whoever services the transfer
/// finishes it with [`complete`](Self::complete), which fires the completion
/// exactly once.
#[derive(Debug)]
pub struct BurstMessage<'a> {
    reg: RegBuf,
    val: Vec<u8, BURST_CAPACITY>,
    state: BurstState,
    completer: Completer<'a>,
}

impl<'a> BurstMessage<'a> {
    /// Empty message wired to `completer`.
    pub fn new(completer: Completer<'a>) -> Self {
        Self {
            reg: RegBuf::new(),
            val: Vec::new(),
            state: BurstState::Allocated,
            completer,
        }
    }

    /// Copies the address and payload into the message.
    ///
    /// Only allowed before the message is submitted.
    pub fn fill(&mut self, reg: &[u8], val: &[u8]) -> Result<(), IoError> {
        if self.state >= BurstState::Submitted {
            return Err(IoError::InvalidArgument);
        }

        self.reg.clear();
        self.val.clear();
        self.reg
            .extend_from_slice(reg)
            .map_err(|_| IoError::InvalidArgument)?;
        self.val
            .extend_from_slice(val)
            .map_err(|_| IoError::InvalidArgument)?;
        Ok(())
    }

    /// Formatted register address bytes.
    #[inline]
    pub fn reg(&self) -> &[u8] {
        &self.reg
    }

    #[inline]
    pub fn reg_len(&self) -> usize {
        self.reg.len()
    }

    /// Payload bytes, written starting at the register address.
    #[inline]
    pub fn val(&self) -> &[u8] {
        &self.val
    }

    #[inline]
    pub fn val_len(&self) -> usize {
        self.val.len()
    }

    #[inline]
    pub fn state(&self) -> BurstState {
        self.state
    }

    /// Observer of this message's completion; see [`CompletionWatch`].
    pub fn watch(&self) -> CompletionWatch<'a> {
        self.completer.watch()
    }

    /// Moves the message one step forward: `Allocated -> Locked -> Submitted`.
    ///
    /// Reaching `Submitted` counts the message as in flight in its pool.
    pub fn advance(&mut self, to: BurstState) -> Result<(), IoError> {
        let next = match self.state {
            BurstState::Allocated => BurstState::Locked,
            BurstState::Locked => BurstState::Submitted,
            BurstState::Submitted | BurstState::Completed => return Err(IoError::InvalidArgument),
        };

        if to != next {
            return Err(IoError::InvalidArgument);
        }
        if to == BurstState::Submitted {
            self.completer.mark_submitted();
        }
        self.state = to;
        Ok(())
    }

    /// Finishes the transfer with a raw transport status (zero is success).
    pub fn complete(self, raw: i32) {
        self.finish(IoError::from_status(raw))
    }

    /// Finishes the transfer with a translated status.
    pub fn finish(self, status: AsyncStatus) {
        let Self {
            completer, state, ..
        } = self;
        debug!("burst message completed from {:?}: {:?}", state, status);
        completer.finish(status);
    }
}
