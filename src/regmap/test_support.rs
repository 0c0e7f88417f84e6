//! Test doubles - only compiled in test builds.

use core::{
    cell::RefCell,
    sync::atomic::{AtomicU8, AtomicUsize, Ordering},
};

use critical_section::Mutex;
use heapless::{Deque, Vec};

use crate::regmap::{
    BptPeripheral, BurstMessage, Bus, ConfigError, Endian, IoError, Peripheral, RegmapConfig,
    helpers::range_span,
};

/// Standard layout for the SoundWire tests: 32-bit addresses, 8-bit values.
pub const SDW_CONFIG: RegmapConfig = RegmapConfig::new(32, 8);

/// Transfers a [`SimPeripheral`] can hold before `bpt_send` reports busy.
const PENDING_DEPTH: usize = 4;

/// SoundWire peripheral backed by a flat register file of `TS` bytes.
///
/// BPT messages are queued and only land in the register file when the test
/// calls [`complete_next`](Self::complete_next), standing in for the bus
/// controller's completion interrupt.
pub struct SimPeripheral<'a, const TS: usize> {
    regs: Mutex<RefCell<[u8; TS]>>,
    dev_num: AtomicU8,
    accesses: AtomicUsize,
    bpt_sends: AtomicUsize,
    pending: Mutex<RefCell<Deque<(u32, BurstMessage<'a>), PENDING_DEPTH>>>,
    bpt_failure: Mutex<RefCell<Option<IoError>>>,
}

impl<'a, const TS: usize> SimPeripheral<'a, TS> {
    pub fn new(dev_num: u8) -> Self {
        Self {
            regs: Mutex::new(RefCell::new([0; TS])),
            dev_num: AtomicU8::new(dev_num),
            accesses: AtomicUsize::new(0),
            bpt_sends: AtomicUsize::new(0),
            pending: Mutex::new(RefCell::new(Deque::new())),
            bpt_failure: Mutex::new(RefCell::new(None)),
        }
    }

    pub fn set_dev_num(&self, dev_num: u8) {
        self.dev_num.store(dev_num, Ordering::SeqCst);
    }

    /// Makes every following `bpt_send` fail with `err` (or succeed on `None`).
    pub fn fail_bpt_send(&self, err: Option<IoError>) {
        critical_section::with(|cs| *self.bpt_failure.borrow_ref_mut(cs) = err);
    }

    /// Total hardware accesses: reads, writes and BPT sends.
    pub fn accesses(&self) -> usize {
        self.accesses.load(Ordering::SeqCst)
    }

    pub fn bpt_sends(&self) -> usize {
        self.bpt_sends.load(Ordering::SeqCst)
    }

    pub fn pending(&self) -> usize {
        critical_section::with(|cs| self.pending.borrow_ref(cs).len())
    }

    /// Finishes the oldest queued BPT transfer with a raw status. The payload
    /// is applied only on success. Returns false when nothing was queued.
    pub fn complete_next(&self, raw: i32) -> bool {
        let next = critical_section::with(|cs| self.pending.borrow_ref_mut(cs).pop_front());
        let Some((addr, msg)) = next else {
            return false;
        };

        if raw != 0 {
            msg.complete(raw);
            return true;
        }

        match self.store(addr, msg.val()) {
            Ok(()) => msg.complete(0),
            Err(err) => msg.finish(Err(err)),
        }
        true
    }

    /// Raw register file contents, bypassing the access counters.
    pub fn peek<const LEN: usize>(&self, addr: u32) -> [u8; LEN] {
        let mut out = [0; LEN];
        self.load(addr, &mut out).unwrap();
        out
    }

    fn load(&self, addr: u32, buf: &mut [u8]) -> Result<(), IoError> {
        let (start, end) = range_span::<TS>(addr, buf.len())?;
        critical_section::with(|cs| buf.copy_from_slice(&self.regs.borrow_ref(cs)[start..end]));
        Ok(())
    }

    fn store(&self, addr: u32, data: &[u8]) -> Result<(), IoError> {
        let (start, end) = range_span::<TS>(addr, data.len())?;
        critical_section::with(|cs| self.regs.borrow_ref_mut(cs)[start..end].copy_from_slice(data));
        Ok(())
    }
}

impl<const TS: usize> Peripheral for SimPeripheral<'_, TS> {
    fn dev_num(&self) -> u8 {
        self.dev_num.load(Ordering::SeqCst)
    }

    fn nread(&self, addr: u32, buf: &mut [u8]) -> Result<(), IoError> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        self.load(addr, buf)
    }

    fn nwrite(&self, addr: u32, data: &[u8]) -> Result<(), IoError> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        self.store(addr, data)
    }
}

impl<'a, const TS: usize> BptPeripheral<'a> for SimPeripheral<'a, TS> {
    fn bpt_send(&self, addr: u32, msg: BurstMessage<'a>) -> Result<(), IoError> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        self.bpt_sends.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = critical_section::with(|cs| *self.bpt_failure.borrow_ref(cs)) {
            return Err(err);
        }

        critical_section::with(|cs| self.pending.borrow_ref_mut(cs).push_back((addr, msg)))
            .map_err(|_| IoError::Busy)
    }
}

/// Plain big-endian bus over a register file of `TS` bytes.
///
/// Frames are `[address | padding | value]`; with multi-write enabled a frame
/// may hold several such records back to back.
pub struct RecordingBus<const TS: usize> {
    regs: Mutex<RefCell<[u8; TS]>>,
    reg_bytes: usize,
    pad_bytes: usize,
    record_val_bytes: Option<usize>,
    writes: AtomicUsize,
    gather_writes: AtomicUsize,
    reads: AtomicUsize,
    last_frame: Mutex<RefCell<Vec<u8, 128>>>,
}

impl<const TS: usize> RecordingBus<TS> {
    pub fn new(reg_bytes: usize, pad_bytes: usize) -> Self {
        Self {
            regs: Mutex::new(RefCell::new([0; TS])),
            reg_bytes,
            pad_bytes,
            record_val_bytes: None,
            writes: AtomicUsize::new(0),
            gather_writes: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
            last_frame: Mutex::new(RefCell::new(Vec::new())),
        }
    }

    /// Parses write frames as repeated records of `val_bytes` values.
    pub fn multi_write(mut self, val_bytes: usize) -> Self {
        self.record_val_bytes = Some(val_bytes);
        self
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn gather_writes(&self) -> usize {
        self.gather_writes.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn last_frame(&self) -> Vec<u8, 128> {
        critical_section::with(|cs| self.last_frame.borrow_ref(cs).clone())
    }

    pub fn peek<const LEN: usize>(&self, addr: u32) -> [u8; LEN] {
        let (start, end) = range_span::<TS>(addr, LEN).unwrap();
        let mut out = [0; LEN];
        critical_section::with(|cs| out.copy_from_slice(&self.regs.borrow_ref(cs)[start..end]));
        out
    }

    fn decode_addr(&self, reg: &[u8]) -> Result<u32, IoError> {
        let addr = reg.get(..self.reg_bytes).ok_or(IoError::InvalidArgument)?;
        Ok(addr.iter().fold(0, |acc, b| (acc << 8) | u32::from(*b)))
    }

    fn store(&self, reg: &[u8], val: &[u8]) -> Result<(), IoError> {
        let (start, end) = range_span::<TS>(self.decode_addr(reg)?, val.len())?;
        critical_section::with(|cs| self.regs.borrow_ref_mut(cs)[start..end].copy_from_slice(val));
        Ok(())
    }
}

impl<const TS: usize> Bus for RecordingBus<TS> {
    fn check_config(&self, config: &RegmapConfig) -> Result<(), ConfigError> {
        if usize::from(config.reg_bits / 8) != self.reg_bytes {
            return Err(ConfigError::UnsupportedAddressWidth);
        }
        if usize::from(config.pad_bits / 8) != self.pad_bytes {
            return Err(ConfigError::UnsupportedPadding);
        }
        Ok(())
    }

    fn write(&self, data: &[u8]) -> Result<(), IoError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        critical_section::with(|cs| {
            let mut frame = self.last_frame.borrow_ref_mut(cs);
            frame.clear();
            frame.extend_from_slice(data).map_err(|_| IoError::InvalidArgument)
        })?;

        let header = self.reg_bytes + self.pad_bytes;
        match self.record_val_bytes {
            None => {
                let (reg, val) = data.split_at_checked(header).ok_or(IoError::InvalidArgument)?;
                self.store(reg, val)
            }
            Some(val_bytes) => {
                for record in data.chunks(header + val_bytes) {
                    let (reg, val) = record
                        .split_at_checked(header)
                        .ok_or(IoError::InvalidArgument)?;
                    self.store(reg, val)?;
                }
                Ok(())
            }
        }
    }

    fn gather_write(&self, reg: &[u8], val: &[u8]) -> Result<(), IoError> {
        self.gather_writes.fetch_add(1, Ordering::SeqCst);
        self.store(reg, val)
    }

    fn read(&self, reg: &[u8], val: &mut [u8]) -> Result<(), IoError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let (start, end) = range_span::<TS>(self.decode_addr(reg)?, val.len())?;
        critical_section::with(|cs| val.copy_from_slice(&self.regs.borrow_ref(cs)[start..end]));
        Ok(())
    }

    fn reg_format_endian_default(&self) -> Endian {
        Endian::Big
    }
}
