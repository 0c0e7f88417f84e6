//! Utility functions for address range calculations.
//!
//! These are useful when implementing a [`Peripheral`](crate::regmap::Peripheral)
//! or [`Bus`](crate::regmap::Bus) backed by a flat register file.

use crate::regmap::IoError;

/// Calculates the byte offset range for an address and length inside a
/// register file of `TS` bytes.
///
/// Returns `(start_offset, end_offset)` where end is exclusive.
///
/// # Errors
/// * [`IoError::InvalidArgument`] - if `len` is 0 or the range exceeds `TS`
///
/// # Example
/// ```
/// use burst_regmap::regmap::helpers::range_span;
///
/// assert_eq!(range_span::<64>(0x10, 4), Ok((16, 20)));
/// assert!(range_span::<64>(62, 4).is_err());
/// ```
pub fn range_span<const TS: usize>(addr: u32, len: usize) -> Result<(usize, usize), IoError> {
    if len == 0 {
        return Err(IoError::InvalidArgument);
    }

    let offset = usize::try_from(addr).map_err(|_| IoError::InvalidArgument)?;
    let end = offset.checked_add(len).ok_or(IoError::InvalidArgument)?;

    if end > TS {
        return Err(IoError::InvalidArgument);
    }

    Ok((offset, end))
}

/// Address of the last register touched by an access of `count` registers
/// starting at `reg`, `stride` apart. `None` on overflow or empty access.
pub fn last_register(reg: u32, count: usize, stride: u32) -> Option<u32> {
    let steps = u32::try_from(count.checked_sub(1)?).ok()?;
    reg.checked_add(steps.checked_mul(stride)?)
}

#[test]
fn range_span_edge_cases() {
    // Zero length
    assert_eq!(range_span::<16>(0, 0), Err(IoError::InvalidArgument));

    // Out of bounds
    assert_eq!(range_span::<16>(15, 2), Err(IoError::InvalidArgument));
    assert_eq!(range_span::<16>(u32::MAX, 1), Err(IoError::InvalidArgument));

    // Last byte of the file
    assert_eq!(range_span::<16>(15, 1), Ok((15, 16)));

    // Whole file
    assert_eq!(range_span::<16>(0, 16), Ok((0, 16)));
}

#[test]
fn last_register_edge_cases() {
    assert_eq!(last_register(0x10, 1, 4), Some(0x10));
    assert_eq!(last_register(0x10, 4, 4), Some(0x1C));
    assert_eq!(last_register(0x10, 0, 4), None);
    assert_eq!(last_register(u32::MAX, 2, 1), None);
}
