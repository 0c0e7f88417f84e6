mod macros;

use heapless::Vec;

use crate::regmap::{Endian, IoError};
use macros::{impl_value_reader, impl_value_readers};

/// Largest number of bytes a single synchronous read returns by value.
///
/// Use [`RegisterMap::read_into`](crate::regmap::RegisterMap::read_into) for
/// longer reads into a caller-owned buffer.
pub const MAX_RAW_READ: usize = 64;

/// Bytes read back from consecutive registers.
///
/// Accessors decode 8, 16 and 32-bit values and return `None` instead of
/// reading past the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueBuffer(Vec<u8, MAX_RAW_READ>);

impl ValueBuffer {
    /// Zero-filled buffer of `len` bytes.
    pub(crate) fn zeroed(len: usize) -> Result<Self, IoError> {
        let mut bytes = Vec::new();
        bytes
            .resize(len, 0)
            .map_err(|_| IoError::InvalidArgument)?;
        Ok(Self(bytes))
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.0
    }

    /// The bytes as read, in register order.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    impl_value_readers!();
}

impl AsRef<[u8]> for ValueBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}
