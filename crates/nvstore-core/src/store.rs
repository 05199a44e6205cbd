//! Store orchestrator: the key-value interface over NVRAM.
//!
//! NvramStore combines the key encoder, the value codec and an `NvramTool`
//! under one reader/writer lock.
//!
//! **Commit policy**: flash tolerates a limited number of write cycles, so
//! only pairing changes are committed. Identity, key material, schema,
//! version and config hash stay in the working copy; they are regenerated if
//! power is lost before the first pairing, and the pairing commit captures
//! them along with the pairing. This gives:
//! - Normal startup: 0 flash writes
//! - Per pairing added: 1 flash write
//! - Per pairing removed: 1 flash write
//!
//! A commit that fails after an applied `set`/`unset` is returned to the
//! caller without rolling the mutation back.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::codec::ValueCodec;
use crate::config::Config;
use crate::error::{NvError, NvResult};
use crate::keys::KeyEncoder;
use crate::tool::{parse_show, CommandTool, NvramTool};

/// Key-value capability consumed by the accessory server.
pub trait Store: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> NvResult<()>;

    /// Value under `key`. `NvError::NotFound` if absent or empty.
    fn get(&self, key: &str) -> NvResult<Vec<u8>>;

    /// Remove `key`.
    fn delete(&self, key: &str) -> NvResult<()>;

    /// All logical keys ending with `suffix`, in no particular order.
    fn keys_with_suffix(&self, suffix: &str) -> NvResult<Vec<String>>;
}

/// Flash wear counters.
#[derive(Debug, Default)]
pub struct WearStats {
    /// Successful commits issued by this store
    commits: AtomicU64,
    /// Mutations applied since the last successful commit
    pending: AtomicU64,
    /// Total set/unset calls applied
    writes: AtomicU64,
}

impl WearStats {
    /// Flash writes issued since the store was created.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Mutations in the working copy not yet known to be in flash.
    pub fn pending(&self) -> u64 {
        self.pending.load(Ordering::Relaxed)
    }

    /// Total mutations applied to the working copy.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.pending.fetch_add(1, Ordering::Relaxed);
    }

    fn record_commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
        self.pending.store(0, Ordering::Relaxed);
    }
}

/// `Store` backed by the NVRAM facility behind `T`.
///
/// All public methods take `&self`. `get` holds the lock shared;
/// `set`, `delete` and `keys_with_suffix` hold it exclusively. The lock only
/// orders callers within this process. Nothing is cached between calls.
pub struct NvramStore<T: NvramTool = CommandTool> {
    /// The tool, reachable only through the lock
    tool: RwLock<T>,
    encoder: KeyEncoder,
    codec: ValueCodec,
    stats: WearStats,
    config: Config,
}

impl NvramStore<CommandTool> {
    /// Store running the program named in `config`.
    pub fn open(config: Config) -> NvResult<Self> {
        let tool = CommandTool::from_config(&config);
        Self::new(config, tool)
    }
}

impl<T: NvramTool> NvramStore<T> {
    /// Store over `tool`, after validating `config`.
    pub fn new(config: Config, tool: T) -> NvResult<Self> {
        config.validate().map_err(NvError::Config)?;
        Ok(Self {
            tool: RwLock::new(tool),
            encoder: KeyEncoder::from_config(&config),
            codec: ValueCodec::from_config(&config),
            stats: WearStats::default(),
            config,
        })
    }

    /// Logical key to physical name mapping in use.
    pub fn encoder(&self) -> &KeyEncoder {
        &self.encoder
    }

    /// Value representation policy in use.
    pub fn codec(&self) -> &ValueCodec {
        &self.codec
    }

    /// Configuration the store was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Flash wear counters of this store.
    pub fn stats(&self) -> &WearStats {
        &self.stats
    }

    fn physical(&self, key: &str) -> NvResult<String> {
        let name = self.encoder.to_physical(key);
        self.encoder.check_len(&name)?;
        Ok(name)
    }

    /// Commit after a pairing mutation. The mutation stays applied on failure.
    fn commit_pairing(&self, tool: &T, key: &str) -> NvResult<()> {
        match tool.commit() {
            Ok(()) => {
                self.stats.record_commit();
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    key,
                    error = %err,
                    "pairing change applied but not committed to flash"
                );
                Err(err)
            }
        }
    }
}

impl<T: NvramTool> Store for NvramStore<T> {
    fn set(&self, key: &str, value: &[u8]) -> NvResult<()> {
        let tool = self.tool.write();
        let name = self.physical(key)?;
        let encoded = self.codec.encode(key, value)?;

        tool.set(&name, &encoded)?;
        self.stats.record_write();
        tracing::debug!(key, name = %name, len = value.len(), "nvram set");

        if self.encoder.is_pairing(key) {
            return self.commit_pairing(&tool, key);
        }
        Ok(())
    }

    fn get(&self, key: &str) -> NvResult<Vec<u8>> {
        let tool = self.tool.read();
        let name = self.physical(key)?;

        let stored = tool.get(&name)?;
        if stored.is_empty() {
            return Err(NvError::NotFound { key: key.to_string() });
        }
        self.codec.decode(key, stored)
    }

    fn delete(&self, key: &str) -> NvResult<()> {
        let tool = self.tool.write();
        let name = self.physical(key)?;

        tool.unset(&name)?;
        self.stats.record_write();
        tracing::debug!(key, name = %name, "nvram unset");

        if self.encoder.is_pairing(key) {
            return self.commit_pairing(&tool, key);
        }
        Ok(())
    }

    fn keys_with_suffix(&self, suffix: &str) -> NvResult<Vec<String>> {
        let tool = self.tool.write();
        let dump = tool.show()?;

        let pairing = suffix == self.encoder.pairing_suffix();
        let mut keys = Vec::new();
        for (name, _) in parse_show(&dump) {
            if pairing {
                // only `<prefix>p_<id>` names are pairing records
                keys.extend(self.encoder.pairing_logical(name));
                continue;
            }
            match self.encoder.plain_logical(name) {
                Some(key) if key.ends_with(suffix) => keys.push(key.to_string()),
                _ => {}
            }
        }
        tracing::debug!(suffix, found = keys.len(), "nvram keys with suffix");
        Ok(keys)
    }
}

impl<T: NvramTool> std::fmt::Debug for NvramStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NvramStore")
            .field("program", &self.config.program)
            .field("prefix", &self.encoder.prefix())
            .field("commits", &self.stats.commits())
            .field("pending", &self.stats.pending())
            .finish()
    }
}
