//! SoundWire transport with Bulk Payload Transport (BPT) bursts.
//!
//! Register addresses are 32-bit little-endian with no padding. Plain accesses
//! go through the peripheral's paged read/write; async writes go through the
//! BPT engine, one message per lock bracket. The engine serves one transfer
//! at a time: a new bracket opens only after the previous bracket's message
//! has completed.
//!
//! ```text
//!   lock(reg, len)      ──► Idle, last transfer done ─► Open { token, in_flight: false }
//!   submit(token, msg)  ──► Open { in_flight: true }, last = msg ──► bpt_send
//!   unlock(token)       ──► Idle (last transfer may still be running)
//! ```

use core::cell::Cell;

use critical_section::Mutex;

use crate::regmap::{
    BracketToken, BurstBus, BurstMessage, BurstState, Bus, CompletionWatch, ConfigError, Endian,
    IoError, RegmapConfig,
};

/// Device number of a peripheral that has not been enumerated yet.
pub const SDW_ENUM_DEV_NUM: u8 = 0;

/// Highest device number a peripheral can be assigned.
pub const SDW_MAX_DEVICES: u8 = 11;

/// Largest payload accepted by a single BPT message.
pub const SDW_BPT_MSG_MAX_BYTES: usize = 128;

/// A SoundWire peripheral as seen by the register transport.
pub trait Peripheral: Sync {
    /// Current device number; [`SDW_ENUM_DEV_NUM`] until enumerated.
    fn dev_num(&self) -> u8;

    /// Reads `buf.len()` bytes starting at `addr`.
    fn nread(&self, addr: u32, buf: &mut [u8]) -> Result<(), IoError>;

    /// Writes `data` starting at `addr`.
    fn nwrite(&self, addr: u32, data: &[u8]) -> Result<(), IoError>;
}

/// A peripheral whose bus controller supports Bulk Payload Transport.
pub trait BptPeripheral<'a>: Peripheral {
    /// Starts sending `msg` to `addr` and returns without waiting.
    ///
    /// The controller owns the message from here and must eventually call
    /// [`BurstMessage::complete`] on it.
    fn bpt_send(&self, addr: u32, msg: BurstMessage<'a>) -> Result<(), IoError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Bracket {
    token: u32,
    in_flight: bool,
}

#[derive(Debug, Clone, Copy)]
struct Engine<'a> {
    bracket: Option<Bracket>,
    last: Option<CompletionWatch<'a>>,
    next_token: u32,
}

/// Register transport for one SoundWire peripheral.
///
/// `'a` is the lifetime of the completion pool its burst messages draw from.
pub struct SdwBus<'p, 'a, P> {
    peripheral: &'p P,
    engine: Mutex<Cell<Engine<'a>>>,
}

impl<'p, 'a, P> SdwBus<'p, 'a, P> {
    pub fn new(peripheral: &'p P) -> Self {
        Self {
            peripheral,
            engine: Mutex::new(Cell::new(Engine {
                bracket: None,
                last: None,
                next_token: 1,
            })),
        }
    }

    /// The only layout this transport accepts: 32-bit addresses, no padding,
    /// no multi-register writes.
    pub const fn config(val_bits: u8) -> RegmapConfig {
        RegmapConfig::new(32, val_bits)
    }

    pub fn peripheral(&self) -> &'p P {
        self.peripheral
    }

    /// Whether a lock bracket is currently open.
    pub fn is_locked(&self) -> bool {
        self.engine().bracket.is_some()
    }

    /// Whether a bracket is open or the last submitted transfer is still
    /// running. A `lock` issued now would block.
    pub fn is_busy(&self) -> bool {
        let engine = self.engine();
        engine.bracket.is_some() || engine.last.is_some_and(|last| last.is_pending())
    }

    fn engine(&self) -> Engine<'a> {
        critical_section::with(|cs| self.engine.borrow(cs).get())
    }

    /// Opens a bracket if none is open and `last` is still the most recent
    /// transfer. Returns the new bracket's token.
    fn try_open(&self, last: Option<CompletionWatch<'a>>) -> Option<u32> {
        critical_section::with(|cs| {
            let cell = self.engine.borrow(cs);
            let mut engine = cell.get();
            if engine.bracket.is_some() || engine.last != last {
                return None;
            }

            let token = engine.next_token;
            engine.next_token = token.wrapping_add(1);
            engine.bracket = Some(Bracket {
                token,
                in_flight: false,
            });
            engine.last = None;
            cell.set(engine);
            Some(token)
        })
    }
}

impl<P: Peripheral> SdwBus<'_, '_, P> {
    fn check_enumerated(&self) -> Result<(), IoError> {
        let dev_num = self.peripheral.dev_num();
        if dev_num == SDW_ENUM_DEV_NUM || dev_num > SDW_MAX_DEVICES {
            debug!("peripheral not enumerated (dev_num {})", dev_num);
            return Err(IoError::DeviceNotReady);
        }
        Ok(())
    }
}

fn decode_addr(reg: &[u8]) -> Result<u32, IoError> {
    reg.first_chunk::<4>()
        .map(|bytes| u32::from_le_bytes(*bytes))
        .ok_or(IoError::InvalidArgument)
}

impl<P: Peripheral> Bus for SdwBus<'_, '_, P> {
    fn check_config(&self, config: &RegmapConfig) -> Result<(), ConfigError> {
        if config.reg_bits != 32 {
            return Err(ConfigError::UnsupportedAddressWidth);
        }
        if config.pad_bits != 0 {
            return Err(ConfigError::UnsupportedPadding);
        }
        if config.can_multi_write {
            return Err(ConfigError::UnsupportedMultiWrite);
        }
        Ok(())
    }

    fn write(&self, data: &[u8]) -> Result<(), IoError> {
        let (addr, val) = data
            .split_first_chunk::<4>()
            .ok_or(IoError::InvalidArgument)?;
        self.peripheral.nwrite(u32::from_le_bytes(*addr), val)
    }

    fn gather_write(&self, reg: &[u8], val: &[u8]) -> Result<(), IoError> {
        self.peripheral.nwrite(decode_addr(reg)?, val)
    }

    fn read(&self, reg: &[u8], val: &mut [u8]) -> Result<(), IoError> {
        self.peripheral.nread(decode_addr(reg)?, val)
    }

    fn reg_format_endian_default(&self) -> Endian {
        Endian::Little
    }

    fn val_format_endian_default(&self) -> Endian {
        Endian::Little
    }
}

impl<'a, P: BptPeripheral<'a>> BurstBus<'a> for SdwBus<'_, 'a, P> {
    fn max_burst_len(&self) -> usize {
        SDW_BPT_MSG_MAX_BYTES
    }

    /// Spins until no bracket is open and the previous bracket's transfer
    /// has completed. Enumeration is rechecked on every attempt so a detached
    /// device does not keep the caller spinning.
    fn lock(&self, reg: u32, val_len: usize) -> Result<BracketToken, IoError> {
        loop {
            self.check_enumerated()?;

            // The pool is consulted outside the engine's critical section;
            // `try_open` bails if another sequence moved the engine meanwhile.
            let engine = self.engine();
            let drained = engine.last.is_none_or(|last| !last.is_pending());
            if engine.bracket.is_none() && drained {
                if let Some(token) = self.try_open(engine.last) {
                    trace!("bpt bracket {} locked at {:#x} for {} bytes", token, reg, val_len);
                    return Ok(BracketToken::new(token));
                }
            }
            core::hint::spin_loop();
        }
    }

    fn submit(&self, token: &BracketToken, mut msg: BurstMessage<'a>) -> Result<(), IoError> {
        if msg.val_len() > SDW_BPT_MSG_MAX_BYTES {
            warn!(
                "bpt message of {} bytes exceeds {}",
                msg.val_len(),
                SDW_BPT_MSG_MAX_BYTES
            );
            return Err(IoError::InvalidArgument);
        }
        self.check_enumerated()?;
        let addr = decode_addr(msg.reg())?;

        let state = msg.state();
        let watch = msg.watch();
        critical_section::with(|cs| {
            let cell = self.engine.borrow(cs);
            let mut engine = cell.get();
            let bracket = match engine.bracket {
                Some(bracket) if bracket.token == token.generation() => bracket,
                _ => return Err(IoError::NotLocked),
            };
            if state != BurstState::Locked {
                return Err(IoError::NotLocked);
            }
            if bracket.in_flight {
                return Err(IoError::Busy);
            }

            engine.bracket = Some(Bracket {
                in_flight: true,
                ..bracket
            });
            engine.last = Some(watch);
            cell.set(engine);
            Ok(())
        })?;
        msg.advance(BurstState::Submitted)?;

        let val_len = msg.val_len();
        match self.peripheral.bpt_send(addr, msg) {
            Ok(()) => {
                trace!("bpt submitted {} bytes to {:#x}", val_len, addr);
                Ok(())
            }
            Err(err) => {
                warn!("bpt send to {:#x} failed: {:?}", addr, err);
                critical_section::with(|cs| {
                    let cell = self.engine.borrow(cs);
                    let mut engine = cell.get();
                    let open = engine.bracket.filter(|b| b.token == token.generation());
                    if let Some(bracket) = open {
                        engine.bracket = Some(Bracket {
                            in_flight: false,
                            ..bracket
                        });
                        engine.last = None;
                        cell.set(engine);
                    }
                });
                Err(err)
            }
        }
    }

    fn unlock(&self, token: BracketToken) -> Result<(), IoError> {
        critical_section::with(|cs| {
            let cell = self.engine.borrow(cs);
            let mut engine = cell.get();
            match engine.bracket {
                Some(bracket) if bracket.token == token.generation() => {
                    engine.bracket = None;
                    cell.set(engine);
                    Ok(())
                }
                _ => Err(IoError::NotLocked),
            }
        })?;
        trace!("bpt bracket {} unlocked", token.generation());
        Ok(())
    }
}

impl<P> core::fmt::Debug for SdwBus<'_, '_, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SdwBus")
            .field("locked", &self.is_locked())
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}
