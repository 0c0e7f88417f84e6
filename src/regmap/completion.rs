use core::cell::RefCell;

use bitmaps::Bitmap;
use critical_section::Mutex;
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};

use crate::regmap::IoError;

/// Terminal status of an asynchronous write.
pub type AsyncStatus = Result<(), IoError>;

/// Upper bound on the slots of a single [`CompletionPool`].
pub const MAX_COMPLETION_SLOTS: usize = 32;

type StatusSignal = Signal<CriticalSectionRawMutex, AsyncStatus>;
type SlotMask = Bitmap<MAX_COMPLETION_SLOTS>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Sender,
    Receiver,
}

/// Type-erased view of a pool, so messages and handles don't carry its size.
trait SlotRelease: Sync {
    fn signal(&self, idx: usize) -> &StatusSignal;
    fn record(&self, err: IoError);
    fn release(&self, idx: usize, side: Side);
    fn mark_submitted(&self, idx: usize);
    fn sender_live(&self, idx: usize, generation: u32) -> bool;
}

struct Slots {
    senders: SlotMask,
    receivers: SlotMask,
    submitted: SlotMask,
    generations: [u32; MAX_COMPLETION_SLOTS],
    first_error: Option<IoError>,
}

/// Fixed set of one-shot completion channels.
///
/// Each [`claim`](Self::claim) hands out a [`Completer`] (kept by the transport
/// with the burst message) and a [`Completion`] (kept by the caller). A slot is
/// reused only after both halves have been dropped.
///
/// The pool also remembers the first error status fired through it until
/// [`take_first_error`](Self::take_first_error) clears it; this is the only
/// trace left by a completion nobody waited on.
///
/// `N` must be between 1 and [`MAX_COMPLETION_SLOTS`].
pub struct CompletionPool<const N: usize> {
    signals: [StatusSignal; N],
    slots: Mutex<RefCell<Slots>>,
}

impl<const N: usize> CompletionPool<N> {
    pub fn new() -> Self {
        const { assert!(N > 0 && N <= MAX_COMPLETION_SLOTS) };
        Self {
            signals: core::array::from_fn(|_| Signal::new()),
            slots: Mutex::new(RefCell::new(Slots {
                senders: SlotMask::new(),
                receivers: SlotMask::new(),
                submitted: SlotMask::new(),
                generations: [0; MAX_COMPLETION_SLOTS],
                first_error: None,
            })),
        }
    }

    /// Claims a free slot, or `None` when every slot is still referenced.
    pub fn claim(&self) -> Option<(Completer<'_>, Completion<'_>)> {
        let (idx, generation) = critical_section::with(|cs| {
            let mut slots = self.slots.borrow_ref_mut(cs);
            let idx = (0..N).find(|&i| !slots.senders.get(i) && !slots.receivers.get(i))?;
            slots.senders.set(idx, true);
            slots.receivers.set(idx, true);
            slots.generations[idx] = slots.generations[idx].wrapping_add(1);
            Some((idx, slots.generations[idx]))
        })?;

        // Both halves are ours; nobody else can observe the stale status.
        self.signals[idx].reset();
        trace!("completion slot {} claimed", idx);

        Some((
            Completer {
                pool: self,
                idx,
                generation,
                fired: false,
            },
            Completion {
                pool: self,
                idx,
                status: None,
            },
        ))
    }

    /// Number of submitted transfers whose completer has neither fired nor
    /// been dropped. Messages allocated but never submitted are not counted.
    pub fn in_flight(&self) -> usize {
        critical_section::with(|cs| self.slots.borrow_ref(cs).submitted.len())
    }

    /// Number of slots free for [`claim`](Self::claim).
    pub fn available(&self) -> usize {
        critical_section::with(|cs| {
            let slots = self.slots.borrow_ref(cs);
            (0..N)
                .filter(|&i| !slots.senders.get(i) && !slots.receivers.get(i))
                .count()
        })
    }

    /// Returns and clears the first error status fired since the last call.
    pub fn take_first_error(&self) -> Option<IoError> {
        critical_section::with(|cs| self.slots.borrow_ref_mut(cs).first_error.take())
    }
}

impl<const N: usize> Default for CompletionPool<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> core::fmt::Debug for CompletionPool<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CompletionPool")
            .field("slots", &N)
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

impl<const N: usize> SlotRelease for CompletionPool<N> {
    fn signal(&self, idx: usize) -> &StatusSignal {
        &self.signals[idx]
    }

    fn record(&self, err: IoError) {
        critical_section::with(|cs| {
            let mut slots = self.slots.borrow_ref_mut(cs);
            if slots.first_error.is_none() {
                slots.first_error = Some(err);
            }
        });
    }

    fn release(&self, idx: usize, side: Side) {
        critical_section::with(|cs| {
            let mut slots = self.slots.borrow_ref_mut(cs);
            match side {
                Side::Sender => {
                    slots.senders.set(idx, false);
                    slots.submitted.set(idx, false)
                }
                Side::Receiver => slots.receivers.set(idx, false),
            };
        });
    }

    fn mark_submitted(&self, idx: usize) {
        critical_section::with(|cs| {
            let mut slots = self.slots.borrow_ref_mut(cs);
            if slots.senders.get(idx) {
                slots.submitted.set(idx, true);
            }
        });
    }

    fn sender_live(&self, idx: usize, generation: u32) -> bool {
        critical_section::with(|cs| {
            let slots = self.slots.borrow_ref(cs);
            slots.senders.get(idx) && slots.generations[idx] == generation
        })
    }
}

/// Sending half of a completion channel.
///
/// Firing consumes the completer, so a burst message completes at most once.
/// Dropping it unfired delivers [`IoError::Aborted`] to the waiting side.
pub struct Completer<'a> {
    pool: &'a dyn SlotRelease,
    idx: usize,
    generation: u32,
    fired: bool,
}

impl<'a> Completer<'a> {
    /// Handle that reports whether this completer is still pending, usable
    /// after the completer itself has moved on with its message.
    pub fn watch(&self) -> CompletionWatch<'a> {
        CompletionWatch {
            pool: self.pool,
            idx: self.idx,
            generation: self.generation,
        }
    }

    /// Counts the transfer in [`CompletionPool::in_flight`] until it fires.
    pub(crate) fn mark_submitted(&self) {
        self.pool.mark_submitted(self.idx);
    }

    /// Fires with a raw transport status: zero is success, anything else is
    /// reported as [`IoError::Transport`].
    pub fn complete(self, raw: i32) {
        self.finish(IoError::from_status(raw))
    }

    /// Fires with an already translated status.
    pub fn finish(mut self, status: AsyncStatus) {
        if let Err(err) = status {
            self.pool.record(err);
        }
        self.pool.signal(self.idx).signal(status);
        self.fired = true;
        trace!("completion slot {} fired: {:?}", self.idx, status);
    }
}

impl Drop for Completer<'_> {
    fn drop(&mut self) {
        if !self.fired {
            warn!("completion slot {} dropped without firing", self.idx);
            self.pool.signal(self.idx).signal(Err(IoError::Aborted));
        }
        self.pool.release(self.idx, Side::Sender);
    }
}

impl core::fmt::Debug for Completer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Completer")
            .field("slot", &self.idx)
            .finish_non_exhaustive()
    }
}

/// Observer of one completer, identified by slot and claim generation.
///
/// Stays valid after the slot is reused: a watch on an earlier claim reports
/// the transfer as finished.
#[derive(Clone, Copy)]
pub struct CompletionWatch<'a> {
    pool: &'a dyn SlotRelease,
    idx: usize,
    generation: u32,
}

impl CompletionWatch<'_> {
    /// True until the observed completer fires or is dropped.
    pub fn is_pending(&self) -> bool {
        self.pool.sender_live(self.idx, self.generation)
    }
}

impl PartialEq for CompletionWatch<'_> {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::addr_eq(self.pool, other.pool)
            && self.idx == other.idx
            && self.generation == other.generation
    }
}

impl core::fmt::Debug for CompletionWatch<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CompletionWatch")
            .field("slot", &self.idx)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Receiving half of a completion channel, returned by
/// [`RegisterMap::async_write`](crate::regmap::RegisterMap::async_write).
///
/// The status is delivered once. Waiting on it is the caller's obligation;
/// an unobserved failure only surfaces through
/// [`RegisterMap::async_complete`](crate::regmap::RegisterMap::async_complete).
pub struct Completion<'a> {
    pool: &'a dyn SlotRelease,
    idx: usize,
    status: Option<AsyncStatus>,
}

impl Completion<'_> {
    /// Returns the status if the transfer has finished, without blocking.
    pub fn poll_status(&mut self) -> Option<AsyncStatus> {
        if self.status.is_none() {
            self.status = self.pool.signal(self.idx).try_take();
        }
        self.status
    }

    /// Returns true once the transfer has finished.
    pub fn is_complete(&mut self) -> bool {
        self.poll_status().is_some()
    }

    /// Waits for the transfer to finish and returns its status.
    pub async fn wait(mut self) -> AsyncStatus {
        if let Some(status) = self.poll_status() {
            return status;
        }
        self.pool.signal(self.idx).wait().await
    }
}

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        self.pool.release(self.idx, Side::Receiver);
    }
}

impl core::fmt::Debug for Completion<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Completion")
            .field("slot", &self.idx)
            .field("status", &self.status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use embassy_futures::block_on;

    type TestPool = CompletionPool<2>;

    #[test]
    fn claim_exhausts_and_frees_slots() {
        let pool = TestPool::new();
        assert_eq!(pool.available(), 2);

        let first = pool.claim().unwrap();
        let second = pool.claim().unwrap();
        assert!(pool.claim().is_none());
        assert_eq!(pool.available(), 0);

        // Firing alone does not free the slot; the caller still holds the status
        let (completer, completion) = first;
        completer.complete(0);
        assert!(pool.claim().is_none());

        drop(completion);
        assert_eq!(pool.available(), 1);
        drop(second);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn success_and_failure_statuses() {
        let pool = TestPool::new();

        let (completer, completion) = pool.claim().unwrap();
        completer.complete(0);
        assert_eq!(block_on(completion.wait()), Ok(()));

        let (completer, completion) = pool.claim().unwrap();
        completer.complete(-110);
        assert_eq!(block_on(completion.wait()), Err(IoError::Transport(-110)));
    }

    #[test]
    fn poll_status_keeps_the_status() {
        let pool = TestPool::new();
        let (completer, mut completion) = pool.claim().unwrap();

        assert_eq!(completion.poll_status(), None);
        assert!(!completion.is_complete());

        completer.finish(Ok(()));
        assert_eq!(completion.poll_status(), Some(Ok(())));
        // Still available after the first poll consumed the signal
        assert_eq!(completion.poll_status(), Some(Ok(())));
        assert_eq!(block_on(completion.wait()), Ok(()));
    }

    #[test]
    fn dropped_completer_reports_aborted() {
        let pool = TestPool::new();
        let (completer, completion) = pool.claim().unwrap();

        drop(completer);

        assert_eq!(block_on(completion.wait()), Err(IoError::Aborted));
        // Aborts are not transfer failures
        assert_eq!(pool.take_first_error(), None);
    }

    #[test]
    fn first_error_is_sticky_until_taken() {
        let pool = TestPool::new();

        let (c1, _r1) = pool.claim().unwrap();
        let (c2, _r2) = pool.claim().unwrap();
        c1.complete(-5);
        c2.complete(-7);

        assert_eq!(pool.take_first_error(), Some(IoError::Transport(-5)));
        assert_eq!(pool.take_first_error(), None);
    }

    #[test]
    fn reused_slot_starts_without_status() {
        let pool = CompletionPool::<1>::new();

        let (completer, completion) = pool.claim().unwrap();
        completer.complete(-1);
        drop(completion);

        let (_completer, mut completion) = pool.claim().unwrap();
        assert_eq!(completion.poll_status(), None);
    }

    #[test]
    fn only_submitted_transfers_are_in_flight() {
        let pool = TestPool::new();
        let (held, _r1) = pool.claim().unwrap();
        let (sent, _r2) = pool.claim().unwrap();

        assert_eq!(pool.in_flight(), 0);
        sent.mark_submitted();
        assert_eq!(pool.in_flight(), 1);

        sent.complete(0);
        assert_eq!(pool.in_flight(), 0);
        drop(held);
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn watch_tracks_one_claim() {
        let pool = CompletionPool::<1>::new();

        let (completer, completion) = pool.claim().unwrap();
        let watch = completer.watch();
        assert!(watch.is_pending());
        completer.complete(0);
        assert!(!watch.is_pending());
        drop(completion);

        // Same slot, next claim: the old watch stays finished
        let (next, _completion) = pool.claim().unwrap();
        assert!(!watch.is_pending());
        assert!(next.watch().is_pending());
        assert!(next.watch() != watch);
    }

    #[test]
    fn completion_fired_from_another_thread() {
        let pool = TestPool::new();
        let (completer, completion) = pool.claim().unwrap();
        completer.mark_submitted();
        assert_eq!(pool.in_flight(), 1);

        std::thread::scope(|s| {
            s.spawn(move || {
                std::thread::sleep(std::time::Duration::from_millis(10));
                completer.complete(0);
            });
            assert_eq!(block_on(completion.wait()), Ok(()));
        });

        assert_eq!(pool.in_flight(), 0);
    }
}
