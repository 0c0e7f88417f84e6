use embassy_futures::yield_now;
use heapless::Vec;

use crate::regmap::{
    Backend, BurstBracket, BurstMessage, Completion, CompletionPool, ConfigError, IoError,
    RegmapConfig, ValueBuffer,
    format::{Format, REG_BUF_CAPACITY},
};

/// Largest value payload of a single synchronous [`RegisterMap::write`].
pub const MAX_RAW_WRITE: usize = 64;

type Frame = Vec<u8, { REG_BUF_CAPACITY + MAX_RAW_WRITE }>;

/// A register map bound to one transport.
///
/// Formats register addresses and values according to its [`RegmapConfig`]
/// and routes accesses to the [`Backend`] chosen at bind time. Async writes
/// draw their completions from a [`CompletionPool`] of `N` slots shared with
/// the caller.
///
/// ```text
///   write / read ───► Format ───► Bus::write / Bus::read
///   async_write  ───► alloc ─► lock ─► submit ─► unlock ──► Completion
///                                        │
///                                        └──► transport completes later
/// ```
pub struct RegisterMap<'b, 'a, const N: usize> {
    backend: Backend<'b, 'a>,
    config: RegmapConfig,
    format: Format,
    pool: &'a CompletionPool<N>,
}

impl<'b, 'a, const N: usize> RegisterMap<'b, 'a, N> {
    /// Checks `config` against the core's limits, then against the backend.
    pub fn validate_configuration(
        backend: &Backend<'_, '_>,
        config: &RegmapConfig,
    ) -> Result<(), ConfigError> {
        if !matches!(config.reg_bits, 8 | 16 | 24 | 32) {
            return Err(ConfigError::UnsupportedAddressWidth);
        }
        if config.pad_bits % 8 != 0 || config.pad_bits > 32 {
            return Err(ConfigError::UnsupportedPadding);
        }
        if !matches!(config.val_bits, 8 | 16 | 24 | 32) {
            return Err(ConfigError::UnsupportedValueWidth);
        }
        if config.reg_stride == 0 {
            return Err(ConfigError::InvalidStride);
        }

        backend.check_config(config)
    }

    /// Validates `config` and binds it to `backend`.
    ///
    /// # Errors
    /// Any [`ConfigError`] from [`validate_configuration`](Self::validate_configuration);
    /// no map is created in that case.
    pub fn bind(
        backend: Backend<'b, 'a>,
        config: RegmapConfig,
        pool: &'a CompletionPool<N>,
    ) -> Result<Self, ConfigError> {
        if let Err(err) = Self::validate_configuration(&backend, &config) {
            warn!("register map rejected: {:?}", err);
            return Err(err);
        }

        let (reg_default, val_default) = backend.endian_defaults();
        let format = Format::new(&config, reg_default, val_default);
        debug!(
            "register map bound: reg_bits={} val_bits={} burst={}",
            config.reg_bits,
            config.val_bits,
            backend.is_burst()
        );

        Ok(Self {
            backend,
            config,
            format,
            pool,
        })
    }

    pub fn config(&self) -> &RegmapConfig {
        &self.config
    }

    pub fn backend(&self) -> Backend<'b, 'a> {
        self.backend
    }

    /// Writes `val` to consecutive registers starting at `reg` as one frame.
    ///
    /// `val` holds at most [`MAX_RAW_WRITE`] bytes; use
    /// [`async_write`](Self::async_write) for longer payloads.
    pub fn write(&self, reg: u32, val: &[u8]) -> Result<(), IoError> {
        if val.len() > MAX_RAW_WRITE {
            return Err(IoError::InvalidArgument);
        }
        self.format.check_access(reg, val.len())?;

        let mut frame = Frame::new();
        frame
            .extend_from_slice(&self.format.reg(reg)?)
            .map_err(|_| IoError::InvalidArgument)?;
        frame
            .extend_from_slice(val)
            .map_err(|_| IoError::InvalidArgument)?;
        self.backend.write(&frame)
    }

    /// Same effect as [`write`](Self::write), with address and value handed
    /// to the transport separately.
    pub fn gather_write(&self, reg: u32, val: &[u8]) -> Result<(), IoError> {
        if val.len() > MAX_RAW_WRITE {
            return Err(IoError::InvalidArgument);
        }
        self.format.check_access(reg, val.len())?;
        let reg_buf = self.format.reg(reg)?;
        self.backend.gather_write(&reg_buf, val)
    }

    /// Reads `len` bytes of consecutive registers starting at `reg`.
    pub fn read(&self, reg: u32, len: usize) -> Result<ValueBuffer, IoError> {
        self.format.check_access(reg, len)?;
        let mut buf = ValueBuffer::zeroed(len)?;
        self.read_into(reg, buf.as_mut_bytes())?;
        Ok(buf)
    }

    /// Reads into a caller-owned buffer; no length limit beyond the map's.
    pub fn read_into(&self, reg: u32, val: &mut [u8]) -> Result<(), IoError> {
        self.format.check_access(reg, val.len())?;
        let reg_buf = self.format.reg(reg)?;
        self.backend.read(&reg_buf, val)
    }

    pub fn read_reg(&self, reg: u32) -> Result<u32, IoError> {
        let mut raw = [0u8; 4];
        let bytes = raw
            .get_mut(..self.format.val_bytes())
            .ok_or(IoError::InvalidArgument)?;
        self.read_into(reg, bytes)?;
        self.format.parse_value(bytes)
    }

    pub fn write_reg(&self, reg: u32, value: u32) -> Result<(), IoError> {
        let bytes = self.format.value(value)?;
        self.write(reg, &bytes)
    }

    /// Read-modify-write of the bits in `mask`. Skips the write when nothing
    /// changes; returns whether it wrote.
    pub fn update_bits(&self, reg: u32, mask: u32, value: u32) -> Result<bool, IoError> {
        let current = self.read_reg(reg)?;
        let next = (current & !mask) | (value & mask);
        if next == current {
            return Ok(false);
        }

        self.write_reg(reg, next)?;
        Ok(true)
    }

    /// Writes several `(reg, value)` pairs.
    ///
    /// Packed into a single frame when the configuration allows multi-writes,
    /// otherwise issued one register at a time. Every pair is checked before
    /// anything is written.
    pub fn multi_reg_write(&self, regs: &[(u32, u32)]) -> Result<(), IoError> {
        for &(reg, value) in regs {
            self.format.check_access(reg, self.format.val_bytes())?;
            self.format.value(value)?;
        }

        if !self.config.can_multi_write {
            return regs
                .iter()
                .try_for_each(|&(reg, value)| self.write_reg(reg, value));
        }
        if regs.is_empty() {
            return Ok(());
        }

        let mut frame = Frame::new();
        for &(reg, value) in regs {
            frame
                .extend_from_slice(&self.format.reg(reg)?)
                .map_err(|_| IoError::InvalidArgument)?;
            frame
                .extend_from_slice(&self.format.value(value)?)
                .map_err(|_| IoError::InvalidArgument)?;
        }
        self.backend.write(&frame)
    }

    /// Prepares a burst message for `val` at `reg` without touching the
    /// transport. Submit it inside a [`lock_burst`](Self::lock_burst) bracket.
    ///
    /// # Errors
    /// * [`IoError::InvalidArgument`] - plain backend, bad range, or `val`
    ///   longer than the backend's burst limit
    /// * [`IoError::NoMemory`] - no completion slot or message left
    pub fn alloc_burst(
        &self,
        reg: u32,
        val: &[u8],
    ) -> Result<(BurstMessage<'a>, Completion<'a>), IoError> {
        let Backend::Burst(bus) = self.backend else {
            return Err(IoError::InvalidArgument);
        };

        self.format.check_access(reg, val.len())?;
        if val.len() > bus.max_burst_len() {
            warn!(
                "burst of {} bytes exceeds backend limit {}",
                val.len(),
                bus.max_burst_len()
            );
            return Err(IoError::InvalidArgument);
        }
        let reg_buf = self.format.reg(reg)?;

        let (completer, completion) = self.pool.claim().ok_or(IoError::NoMemory)?;
        let mut msg = bus.alloc(completer).ok_or(IoError::NoMemory)?;
        msg.fill(&reg_buf, val)?;
        Ok((msg, completion))
    }

    /// Opens a lock bracket on the burst engine, blocking while another
    /// bracket is open on the same transport or its last transfer is still
    /// running.
    pub fn lock_burst(&self, reg: u32, val_len: usize) -> Result<BurstBracket<'b, 'a>, IoError> {
        match self.backend {
            Backend::Burst(bus) => BurstBracket::lock(bus, reg, val_len),
            Backend::Plain(_) => Err(IoError::InvalidArgument),
        }
    }

    /// Starts writing `val` at `reg` and returns without waiting for the
    /// transfer.
    ///
    /// Validation and allocation happen before the lock is taken, so a
    /// rejected request leaves the transport untouched. On a plain backend
    /// the write is performed synchronously and the returned completion is
    /// already finished.
    pub fn async_write(&self, reg: u32, val: &[u8]) -> Result<Completion<'a>, IoError> {
        if let Backend::Plain(_) = self.backend {
            self.format.check_access(reg, val.len())?;
            let (completer, completion) = self.pool.claim().ok_or(IoError::NoMemory)?;
            self.gather_write(reg, val)?;
            completer.finish(Ok(()));
            return Ok(completion);
        }

        let (msg, completion) = self.alloc_burst(reg, val)?;
        let mut bracket = self.lock_burst(reg, val.len())?;
        bracket.submit(msg)?;
        bracket.unlock()?;
        Ok(completion)
    }

    /// Waits until every burst submitted with a completion from this map's
    /// pool has finished.
    ///
    /// The pool is counted as a whole: when several maps share one pool,
    /// their transfers are waited on too. Messages taken with
    /// [`alloc_burst`](Self::alloc_burst) but never submitted are not
    /// counted. The wait polls with `yield_now`, so under a blocking executor
    /// it spins until the transport completes.
    ///
    /// Returns the first failure reported since the previous call, including
    /// failures of completions that were never awaited.
    pub async fn async_complete(&self) -> Result<(), IoError> {
        while self.pool.in_flight() > 0 {
            yield_now().await;
        }

        match self.pool.take_first_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl<const N: usize> core::fmt::Debug for RegisterMap<'_, '_, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RegisterMap")
            .field("backend", &self.backend)
            .field("config", &self.config)
            .field("pool", &self.pool)
            .finish()
    }
}
