use crate::regmap::{BracketToken, BurstBus, BurstMessage, BurstState, IoError};

/// Exclusive hold on a device's burst engine for one logical sequence.
///
/// Obtained from [`RegisterMap::lock_burst`](crate::regmap::RegisterMap::lock_burst).
/// Owns the transport's [`BracketToken`], so only this sequence can submit
/// into the bracket. [`unlock`](Self::unlock) consumes the bracket, so it runs
/// at most once; a bracket dropped while still locked unlocks itself.
pub struct BurstBracket<'b, 'a> {
    bus: &'b dyn BurstBus<'a>,
    reg: u32,
    submitted: usize,
    token: Option<BracketToken>,
}

impl<'b, 'a> BurstBracket<'b, 'a> {
    pub(crate) fn lock(
        bus: &'b dyn BurstBus<'a>,
        reg: u32,
        val_len: usize,
    ) -> Result<Self, IoError> {
        let token = bus.lock(reg, val_len)?;
        trace!(
            "burst bracket {} locked at {:#x} for {} bytes",
            token.generation(),
            reg,
            val_len
        );
        Ok(Self {
            bus,
            reg,
            submitted: 0,
            token: Some(token),
        })
    }

    /// Hands `msg` to the transport. Returns once the transfer has started.
    pub fn submit(&mut self, mut msg: BurstMessage<'a>) -> Result<(), IoError> {
        let token = self.token.as_ref().ok_or(IoError::NotLocked)?;
        msg.advance(BurstState::Locked)?;
        self.bus.submit(token, msg)?;
        self.submitted += 1;
        Ok(())
    }

    /// Number of messages submitted inside this bracket.
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Releases the bracket. The submitted transfer keeps running; the next
    /// lock on the same transport waits for it.
    pub fn unlock(mut self) -> Result<(), IoError> {
        let token = self.token.take().ok_or(IoError::NotLocked)?;
        trace!(
            "burst bracket at {:#x} unlocked after {} submits",
            self.reg,
            self.submitted
        );
        self.bus.unlock(token)
    }
}

impl Drop for BurstBracket<'_, '_> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            warn!("burst bracket at {:#x} dropped while locked", self.reg);
            if let Err(err) = self.bus.unlock(token) {
                warn!("unlock on drop failed: {:?}", err);
            }
        }
    }
}

impl core::fmt::Debug for BurstBracket<'_, '_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BurstBracket")
            .field("reg", &self.reg)
            .field("submitted", &self.submitted)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}
