use heapless::Vec;

use crate::regmap::{Endian, IoError, RegmapConfig, helpers::last_register};

/// Capacity of a formatted register address including padding.
pub const REG_BUF_CAPACITY: usize = 8;

/// Formatted register address: address bytes followed by padding bytes.
pub type RegBuf = Vec<u8, REG_BUF_CAPACITY>;

/// Formatted single register value.
pub(crate) type ValBuf = Vec<u8, 4>;

/// Wire layout derived from a validated [`RegmapConfig`] and the bus defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Format {
    reg_bits: u8,
    reg_bytes: usize,
    pad_bytes: usize,
    val_bits: u8,
    val_bytes: usize,
    reg_endian: Endian,
    val_endian: Endian,
    stride: u32,
    max_register: Option<u32>,
}

impl Format {
    /// Expects a configuration that already passed validation.
    pub(crate) fn new(config: &RegmapConfig, reg_default: Endian, val_default: Endian) -> Self {
        Self {
            reg_bits: config.reg_bits,
            reg_bytes: usize::from(config.reg_bits / 8),
            pad_bytes: usize::from(config.pad_bits / 8),
            val_bits: config.val_bits,
            val_bytes: usize::from(config.val_bits / 8),
            reg_endian: config.reg_format_endian.unwrap_or(reg_default),
            val_endian: config.val_format_endian.unwrap_or(val_default),
            stride: config.reg_stride,
            max_register: config.max_register,
        }
    }

    pub(crate) fn val_bytes(&self) -> usize {
        self.val_bytes
    }

    /// Serializes `reg` in the address byte order, followed by zero padding.
    pub(crate) fn reg(&self, reg: u32) -> Result<RegBuf, IoError> {
        if !fits(reg, self.reg_bits) {
            return Err(IoError::InvalidArgument);
        }

        let mut buf = RegBuf::new();
        buf.extend_from_slice(&encode(reg, self.reg_bytes, self.reg_endian)?)
            .map_err(|_| IoError::InvalidArgument)?;
        for _ in 0..self.pad_bytes {
            buf.push(0).map_err(|_| IoError::InvalidArgument)?;
        }
        Ok(buf)
    }

    /// Serializes one register value in the value byte order.
    pub(crate) fn value(&self, value: u32) -> Result<ValBuf, IoError> {
        if !fits(value, self.val_bits) {
            return Err(IoError::InvalidArgument);
        }

        encode(value, self.val_bytes, self.val_endian)
    }

    /// Decodes one register value. `bytes` must be exactly one value wide.
    pub(crate) fn parse_value(&self, bytes: &[u8]) -> Result<u32, IoError> {
        if bytes.len() != self.val_bytes {
            return Err(IoError::InvalidArgument);
        }

        let fold = |acc: u32, b: &u8| (acc << 8) | u32::from(*b);
        Ok(match self.val_endian {
            Endian::Big => bytes.iter().fold(0, fold),
            Endian::Little => bytes.iter().rev().fold(0, fold),
        })
    }

    /// Validates an access of `len` value bytes starting at `reg`.
    pub(crate) fn check_access(&self, reg: u32, len: usize) -> Result<(), IoError> {
        if len == 0 || len % self.val_bytes != 0 {
            return Err(IoError::InvalidArgument);
        }
        if reg % self.stride != 0 || !fits(reg, self.reg_bits) {
            return Err(IoError::InvalidArgument);
        }

        if let Some(max) = self.max_register {
            let last = last_register(reg, len / self.val_bytes, self.stride)
                .ok_or(IoError::InvalidArgument)?;
            if last > max {
                return Err(IoError::InvalidArgument);
            }
        }

        Ok(())
    }
}

fn fits(value: u32, bits: u8) -> bool {
    bits >= 32 || value >> bits == 0
}

fn encode(value: u32, width: usize, endian: Endian) -> Result<ValBuf, IoError> {
    let (bytes, range) = match endian {
        Endian::Big => {
            let start = 4usize.checked_sub(width).ok_or(IoError::InvalidArgument)?;
            (value.to_be_bytes(), start..4)
        }
        Endian::Little => (value.to_le_bytes(), 0..width),
    };

    let mut out = ValBuf::new();
    out.extend_from_slice(bytes.get(range).ok_or(IoError::InvalidArgument)?)
        .map_err(|_| IoError::InvalidArgument)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(config: RegmapConfig) -> Format {
        Format::new(&config, Endian::Big, Endian::Big)
    }

    #[test]
    fn address_layout_follows_byte_order() {
        let le = Format::new(&RegmapConfig::new(32, 8), Endian::Little, Endian::Little);
        assert_eq!(le.reg(0x1234_5678).unwrap().as_slice(), &[0x78, 0x56, 0x34, 0x12]);

        let be = format(RegmapConfig::new(16, 8));
        assert_eq!(be.reg(0x1234).unwrap().as_slice(), &[0x12, 0x34]);

        // Config override beats the bus default
        let overridden = format(RegmapConfig::new(24, 8).reg_endian(Endian::Little));
        assert_eq!(overridden.reg(0x0A_0B0C).unwrap().as_slice(), &[0x0C, 0x0B, 0x0A]);
    }

    #[test]
    fn padding_is_appended_as_zeros() {
        let f = format(RegmapConfig::new(8, 8).pad_bits(16));
        assert_eq!(f.reg(0x7F).unwrap().as_slice(), &[0x7F, 0x00, 0x00]);
    }

    #[test]
    fn address_wider_than_reg_bits_is_rejected() {
        let f = format(RegmapConfig::new(8, 8));
        assert_eq!(f.reg(0x100), Err(IoError::InvalidArgument));
    }

    #[test]
    fn value_round_trip_and_width_check() {
        let f = format(RegmapConfig::new(16, 16).val_endian(Endian::Little));
        let bytes = f.value(0xBEEF).unwrap();
        assert_eq!(bytes.as_slice(), &[0xEF, 0xBE]);
        assert_eq!(f.parse_value(&bytes), Ok(0xBEEF));

        assert_eq!(f.value(0x1_0000), Err(IoError::InvalidArgument));
        assert_eq!(f.parse_value(&[0x01]), Err(IoError::InvalidArgument));
    }

    #[test]
    fn access_checks() {
        let f = format(RegmapConfig::new(16, 16).reg_stride(2).max_register(0x10));

        assert_eq!(f.check_access(0x00, 2), Ok(()));
        // Last register is 0x0E + 1 * 2 = 0x10
        assert_eq!(f.check_access(0x0E, 4), Ok(()));

        // Empty, partial value, misaligned, past max_register
        assert_eq!(f.check_access(0x00, 0), Err(IoError::InvalidArgument));
        assert_eq!(f.check_access(0x00, 3), Err(IoError::InvalidArgument));
        assert_eq!(f.check_access(0x01, 2), Err(IoError::InvalidArgument));
        assert_eq!(f.check_access(0x10, 4), Err(IoError::InvalidArgument));
    }
}
