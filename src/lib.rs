//! A `no_std`, no-alloc register map with an asynchronous burst-write path.
//!
//! This crate formats register accesses for a device and hands them to a
//! pluggable transport. Transports with a bulk-write engine, such as a
//! SoundWire link with Bulk Payload Transport, additionally accept
//! non-blocking burst writes whose completion is reported later.
//!
//! # Features
//!
//! - **Zero heap allocation** - Messages, frames and completions live in fixed buffers
//! - **Configurable layout** - Address/value widths, padding, stride and byte order
//! - **Two transport kinds** - Plain synchronous buses and burst-capable buses
//! - **Lock brackets** - Exclusive `lock → submit → unlock` sequences per device
//! - **Deferred completion** - Await one write, or drain all with a sticky first error
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐        ┌───────────────┐        ┌──────────────────┐
//! │  RegisterMap     │        │  Backend      │        │  Transport       │
//! │                  │        │               │        │                  │
//! │  write / read    │───────▶│  Bus          │───────▶│  nwrite / nread  │
//! │                  │        │               │        │                  │
//! │  async_write     │───────▶│  BurstBus     │───────▶│  bpt_send        │
//! │                  │ lock   │  lock/submit/ │        │                  │
//! │                  │ submit │  unlock       │        │                  │
//! │  Completion      │◀───────┼───────────────┼────────│  msg.complete()  │
//! └──────────────────┘        └───────────────┘        └──────────────────┘
//! ```
//!
//! - **Sync accesses** are formatted and forwarded in one call
//! - **Async writes** are validated and allocated first, then submitted inside
//!   a lock bracket, and return before the transfer finishes
//! - **Completions** fire exactly once from whichever context services the transfer
//! - **`async_complete`** waits for all outstanding writes and reports the first failure
//!
//! # Example
//!
//! ```rust,no_run
//! use burst_regmap::prelude::*;
//!
//! struct Codec;
//!
//! impl Peripheral for Codec {
//!     fn dev_num(&self) -> u8 {
//!         1
//!     }
//!     fn nread(&self, _addr: u32, buf: &mut [u8]) -> Result<(), IoError> {
//!         buf.fill(0);
//!         Ok(())
//!     }
//!     fn nwrite(&self, _addr: u32, _data: &[u8]) -> Result<(), IoError> {
//!         Ok(())
//!     }
//! }
//!
//! impl<'a> BptPeripheral<'a> for Codec {
//!     fn bpt_send(&self, _addr: u32, msg: BurstMessage<'a>) -> Result<(), IoError> {
//!         // A real controller completes from its interrupt handler
//!         msg.complete(0);
//!         Ok(())
//!     }
//! }
//!
//! let pool = CompletionPool::<8>::new();
//! let codec = Codec;
//! let bus = SdwBus::new(&codec);
//! let map = RegisterMap::bind(Backend::Burst(&bus), SdwBus::<Codec>::config(8), &pool).unwrap();
//!
//! // Synchronous register write
//! map.write_reg(0x0040, 0x1F).unwrap();
//!
//! // Burst write, awaited later
//! let done = map.async_write(0x4000, &[0u8; 64]).unwrap();
//! embassy_futures::block_on(done.wait()).unwrap();
//! embassy_futures::block_on(map.async_complete()).unwrap();
//! ```

#![deny(unsafe_code)]
#![no_std]

mod fmt;

pub mod regmap;

pub mod prelude {
    pub use crate::regmap::prelude::*;
}
