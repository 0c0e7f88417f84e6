/// Byte order used to serialize register addresses or values on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Endian {
    Big,
    Little,
}

/// Immutable description of a register map, supplied once at bind time.
///
/// Built with `const fn` setters:
///
/// ```
/// use burst_regmap::regmap::{Endian, RegmapConfig};
///
/// const CONFIG: RegmapConfig = RegmapConfig::new(32, 8)
///     .pad_bits(0)
///     .multi_write(false)
///     .max_register(0x4000_0000)
///     .reg_endian(Endian::Little);
///
/// assert_eq!(CONFIG.reg_bits, 32);
/// assert!(!CONFIG.can_multi_write);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegmapConfig {
    /// Width of a register address in bits.
    pub reg_bits: u8,
    /// Zero bits inserted between the address and the value.
    pub pad_bits: u8,
    /// Width of a single register value in bits.
    pub val_bits: u8,
    /// Address increment between consecutive registers.
    pub reg_stride: u32,
    /// Highest valid register address, if bounded.
    pub max_register: Option<u32>,
    /// Whether several `(reg, value)` pairs may be packed into one write.
    pub can_multi_write: bool,
    /// Overrides the bus default address byte order.
    pub reg_format_endian: Option<Endian>,
    /// Overrides the bus default value byte order.
    pub val_format_endian: Option<Endian>,
}

impl RegmapConfig {
    pub const fn new(reg_bits: u8, val_bits: u8) -> Self {
        Self {
            reg_bits,
            pad_bits: 0,
            val_bits,
            reg_stride: 1,
            max_register: None,
            can_multi_write: false,
            reg_format_endian: None,
            val_format_endian: None,
        }
    }

    pub const fn pad_bits(mut self, bits: u8) -> Self {
        self.pad_bits = bits;
        self
    }

    pub const fn multi_write(mut self, enabled: bool) -> Self {
        self.can_multi_write = enabled;
        self
    }

    pub const fn reg_stride(mut self, stride: u32) -> Self {
        self.reg_stride = stride;
        self
    }

    pub const fn max_register(mut self, reg: u32) -> Self {
        self.max_register = Some(reg);
        self
    }

    pub const fn reg_endian(mut self, endian: Endian) -> Self {
        self.reg_format_endian = Some(endian);
        self
    }

    pub const fn val_endian(mut self, endian: Endian) -> Self {
        self.val_format_endian = Some(endian);
        self
    }
}
