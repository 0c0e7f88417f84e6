use thiserror::Error;

/// Reasons a configuration cannot be bound to a backend.
///
/// Raised only by [`RegisterMap::validate_configuration`] and
/// [`RegisterMap::bind`]; a register map is never partially usable after one.
///
/// [`RegisterMap::validate_configuration`]: crate::regmap::RegisterMap::validate_configuration
/// [`RegisterMap::bind`]: crate::regmap::RegisterMap::bind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Register address width is not supported by the core or the backend.
    #[error("unsupported register address width")]
    UnsupportedAddressWidth,
    /// Padding between address and value is not supported.
    #[error("unsupported register padding")]
    UnsupportedPadding,
    /// Multi-register writes were requested but the backend only does bulk writes.
    #[error("multi-register writes not supported")]
    UnsupportedMultiWrite,
    /// Register value width is not supported.
    #[error("unsupported register value width")]
    UnsupportedValueWidth,
    /// Register stride must be non-zero.
    #[error("invalid register stride")]
    InvalidStride,
}

/// Errors raised by register accesses, burst submission and completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoError {
    /// Transport failure, carrying the raw code reported by the transport.
    #[error("transport error {0}")]
    Transport(i32),
    /// Length, alignment or address out of range; rejected before any access.
    #[error("invalid argument")]
    InvalidArgument,
    /// Device is not enumerated on the bus.
    #[error("device not ready")]
    DeviceNotReady,
    /// No completion slot left for a burst message.
    #[error("out of burst message slots")]
    NoMemory,
    /// Burst submit or unlock without a held lock bracket.
    #[error("burst engine not locked")]
    NotLocked,
    /// The lock bracket already has a message in flight.
    #[error("burst engine busy")]
    Busy,
    /// A submitted message was dropped without being completed.
    #[error("burst transfer aborted")]
    Aborted,
}

impl IoError {
    /// Translates a raw transfer status: zero is success, anything else is a
    /// [`IoError::Transport`] carrying the code.
    #[inline]
    pub fn from_status(raw: i32) -> Result<(), IoError> {
        match raw {
            0 => Ok(()),
            code => Err(IoError::Transport(code)),
        }
    }
}
