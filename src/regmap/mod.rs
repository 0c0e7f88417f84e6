pub mod bus;
pub mod completion;
pub mod config;
pub mod error;
pub(crate) mod format;
pub mod helpers;
pub mod lock;
pub mod map;
pub mod message;
pub mod sdw;
pub mod value;

#[cfg(test)]
mod test_support;

pub use bus::{Backend, BracketToken, BurstBus, Bus};
pub use completion::{
    AsyncStatus, Completer, Completion, CompletionPool, CompletionWatch, MAX_COMPLETION_SLOTS,
};
pub use config::{Endian, RegmapConfig};
pub use error::{ConfigError, IoError};
pub use format::{REG_BUF_CAPACITY, RegBuf};
pub use lock::BurstBracket;
pub use map::{MAX_RAW_WRITE, RegisterMap};
pub use message::{BURST_CAPACITY, BurstMessage, BurstState};
pub use sdw::{BptPeripheral, Peripheral, SdwBus};
pub use value::{MAX_RAW_READ, ValueBuffer};

pub mod prelude {
    pub use super::{
        AsyncStatus, Backend, BptPeripheral, BracketToken, BurstBracket, BurstBus, BurstMessage,
        BurstState, Bus, Completer, Completion, CompletionPool, ConfigError, Endian, IoError,
        Peripheral, RegisterMap, RegmapConfig, SdwBus, ValueBuffer,
    };
}
