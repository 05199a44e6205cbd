//! nvstore Core — Key-Value Store over Router NVRAM
//!
//! Persists accessory identity, key material, schema/version markers, the
//! configuration hash and pairing records in the NVRAM of router firmware
//! (FreshTomato), driving the firmware's `nvram` command-line tool.
//!
//! # Architecture
//!
//! - **Key encoder**: logical keys to `hkt_`-prefixed NVRAM names, pairing
//!   keys shortened to `hkt_p_<uuid>` to fit the 64-character name limit
//! - **Value codec**: `configHash` stored as hex, everything else verbatim
//! - **Tool seam**: `NvramTool`, implemented by `CommandTool` (the real
//!   binary) and `MemoryNvram` (in-process)
//! - **Store**: `NvramStore`, one reader/writer lock, commits to flash only
//!   when pairings change
//!
//! # Flash Wear
//!
//! Flash has a limited number of write cycles. Normal startup issues no
//! commit; each pairing added or removed issues exactly one.

pub mod codec;
pub mod config;
pub mod error;
pub mod keys;
pub mod memory;
pub mod store;
pub mod tool;

// Re-export key types for convenience
pub use codec::{ValueCodec, ValueKind, CONFIG_HASH_KEY};
pub use config::Config;
pub use error::{NvError, NvResult};
pub use keys::{KeyEncoder, MAX_NAME_LEN, NVRAM_PREFIX, PAIRING_PREFIX, PAIRING_SUFFIX};
pub use memory::MemoryNvram;
pub use store::{NvramStore, Store, WearStats};
pub use tool::{parse_show, CommandTool, NvramTool, ToolOp};
