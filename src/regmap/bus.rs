use crate::regmap::{BurstMessage, Completer, ConfigError, Endian, IoError, RegmapConfig};

/// Synchronous register transport.
///
/// Buffers are already formatted by the register map: `reg` holds the address
/// bytes followed by any padding, `val` holds raw value bytes.
///
/// A transport may be shared between the thread that submits and the context
/// that completes transfers, hence the `Sync` bound.
pub trait Bus: Sync {
    /// Rejects configurations this transport cannot carry.
    ///
    /// Called once at bind time, after the core's own checks.
    fn check_config(&self, config: &RegmapConfig) -> Result<(), ConfigError> {
        let _ = config;
        Ok(())
    }

    /// Writes a single buffer holding the address followed by the value.
    fn write(&self, data: &[u8]) -> Result<(), IoError>;

    /// Writes with the address and the value in separate buffers.
    ///
    /// Must have the same effect as [`write`](Self::write) on the
    /// concatenation of both buffers.
    fn gather_write(&self, reg: &[u8], val: &[u8]) -> Result<(), IoError>;

    /// Fills `val` with the bytes starting at the address in `reg`.
    fn read(&self, reg: &[u8], val: &mut [u8]) -> Result<(), IoError>;

    /// Address byte order used unless the configuration overrides it.
    fn reg_format_endian_default(&self) -> Endian {
        Endian::Big
    }

    /// Value byte order used unless the configuration overrides it.
    fn val_format_endian_default(&self) -> Endian {
        Endian::Big
    }
}

/// Proof of holding a transport's lock bracket.
///
/// Returned by [`BurstBus::lock`] and presented back on every `submit` and on
/// `unlock`. The transport rejects a token that does not match the bracket it
/// currently has open, so a stale or foreign token cannot act on another
/// sequence's bracket. Not `Clone`: `unlock` consumes it.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BracketToken(u32);

impl BracketToken {
    /// Token for bracket number `generation`, for use by transport
    /// implementations.
    pub const fn new(generation: u32) -> Self {
        Self(generation)
    }

    pub const fn generation(&self) -> u32 {
        self.0
    }
}

/// Transport with an asynchronous bulk-write engine.
///
/// A burst sequence is `lock`, `submit`, `unlock`. Submitted messages
/// complete out of band through [`BurstMessage::complete`]; the engine stays
/// busy until then, so the next `lock` on the same transport waits for it.
///
/// `'a` is the lifetime of the completion pool the messages draw from.
pub trait BurstBus<'a>: Bus {
    /// Largest payload a single [`submit`](Self::submit) accepts.
    fn max_burst_len(&self) -> usize;

    /// Allocates an empty message wired to `completer`.
    ///
    /// Returns `None` only when the transport is out of message storage.
    fn alloc(&self, completer: Completer<'a>) -> Option<BurstMessage<'a>> {
        Some(BurstMessage::new(completer))
    }

    /// Acquires the burst engine for a sequence of `val_len` bytes at `reg`.
    ///
    /// Blocks while another bracket is open or the previous bracket's
    /// transfer has not completed.
    fn lock(&self, reg: u32, val_len: usize) -> Result<BracketToken, IoError>;

    /// Starts the transfer of `msg` and returns without waiting for it.
    ///
    /// `msg` must be in [`BurstState::Locked`](crate::regmap::BurstState::Locked)
    /// and `token` must match the open bracket, otherwise
    /// [`IoError::NotLocked`]. On error the message is dropped and its
    /// completion reports [`IoError::Aborted`].
    fn submit(&self, token: &BracketToken, msg: BurstMessage<'a>) -> Result<(), IoError>;

    /// Releases the bracket opened with `token`. Does not wait for the
    /// in-flight transfer.
    fn unlock(&self, token: BracketToken) -> Result<(), IoError>;
}

/// Transport bound to a register map, selected at bind time.
#[derive(Clone, Copy)]
pub enum Backend<'b, 'a> {
    /// Synchronous transport only; async writes complete immediately.
    Plain(&'b dyn Bus),
    /// Transport with a burst engine for async writes.
    Burst(&'b dyn BurstBus<'a>),
}

impl<'b, 'a> Backend<'b, 'a> {
    pub fn is_burst(&self) -> bool {
        matches!(self, Backend::Burst(_))
    }

    pub(crate) fn check_config(&self, config: &RegmapConfig) -> Result<(), ConfigError> {
        match self {
            Backend::Plain(bus) => bus.check_config(config),
            Backend::Burst(bus) => bus.check_config(config),
        }
    }

    pub(crate) fn write(&self, data: &[u8]) -> Result<(), IoError> {
        match self {
            Backend::Plain(bus) => bus.write(data),
            Backend::Burst(bus) => bus.write(data),
        }
    }

    pub(crate) fn gather_write(&self, reg: &[u8], val: &[u8]) -> Result<(), IoError> {
        match self {
            Backend::Plain(bus) => bus.gather_write(reg, val),
            Backend::Burst(bus) => bus.gather_write(reg, val),
        }
    }

    pub(crate) fn read(&self, reg: &[u8], val: &mut [u8]) -> Result<(), IoError> {
        match self {
            Backend::Plain(bus) => bus.read(reg, val),
            Backend::Burst(bus) => bus.read(reg, val),
        }
    }

    pub(crate) fn endian_defaults(&self) -> (Endian, Endian) {
        match self {
            Backend::Plain(bus) => (
                bus.reg_format_endian_default(),
                bus.val_format_endian_default(),
            ),
            Backend::Burst(bus) => (
                bus.reg_format_endian_default(),
                bus.val_format_endian_default(),
            ),
        }
    }
}

impl core::fmt::Debug for Backend<'_, '_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Backend::Plain(_) => f.write_str("Backend::Plain"),
            Backend::Burst(bus) => f
                .debug_struct("Backend::Burst")
                .field("max_burst_len", &bus.max_burst_len())
                .finish_non_exhaustive(),
        }
    }
}
