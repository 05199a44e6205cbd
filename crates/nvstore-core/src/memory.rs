//! In-process NVRAM facility
//!
//! `MemoryNvram` keeps a working copy (what `set`/`unset` change and what
//! `get`/`show` report) and a durable copy (what survives `power_cycle`).
//! `commit` copies the working copy over the durable copy. This lets tests
//! observe exactly what a given commit policy leaves in flash.

use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::{HashMap, HashSet};
use parking_lot::Mutex;

use crate::error::{NvError, NvResult};
use crate::tool::{NvramTool, ToolOp};

#[derive(Default)]
struct Banks {
    working: HashMap<String, Vec<u8>>,
    durable: HashMap<String, Vec<u8>>,
}

/// NVRAM stand-in with commit accounting and failure injection.
#[derive(Default)]
pub struct MemoryNvram {
    banks: Mutex<Banks>,
    /// Ops that fail once on their next call
    failures: Mutex<HashSet<ToolOp>>,
    commits: AtomicU64,
}

impl MemoryNvram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful commits.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Value in the working copy.
    pub fn working(&self, name: &str) -> Option<Vec<u8>> {
        self.banks.lock().working.get(name).cloned()
    }

    /// Value in the durable copy.
    pub fn durable(&self, name: &str) -> Option<Vec<u8>> {
        self.banks.lock().durable.get(name).cloned()
    }

    /// Entries in the working copy.
    pub fn len(&self) -> usize {
        self.banks.lock().working.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Seed the working copy directly, bypassing the store's naming.
    pub fn insert_raw(&self, name: &str, value: impl AsRef<[u8]>) {
        self.banks.lock().working.insert(name.to_string(), value.as_ref().to_vec());
    }

    /// Lose power: the working copy reverts to what was last committed.
    pub fn power_cycle(&self) {
        let mut banks = self.banks.lock();
        banks.working = banks.durable.clone();
    }

    /// Make the next call of `op` fail with a non-zero exit.
    pub fn fail_next(&self, op: ToolOp) {
        self.failures.lock().insert(op);
    }

    fn check(&self, op: ToolOp) -> NvResult<()> {
        if self.failures.lock().remove(&op) {
            return Err(NvError::Exit {
                op,
                status: Some(1),
                stderr: format!("injected {} failure", op),
            });
        }
        Ok(())
    }
}

impl NvramTool for MemoryNvram {
    fn get(&self, name: &str) -> NvResult<Vec<u8>> {
        self.check(ToolOp::Get)?;
        Ok(self.working(name).unwrap_or_default())
    }

    fn set(&self, name: &str, value: &[u8]) -> NvResult<()> {
        self.check(ToolOp::Set)?;
        self.insert_raw(name, value);
        Ok(())
    }

    fn unset(&self, name: &str) -> NvResult<()> {
        self.check(ToolOp::Unset)?;
        self.banks.lock().working.remove(name);
        Ok(())
    }

    fn commit(&self) -> NvResult<()> {
        self.check(ToolOp::Commit)?;
        let mut banks = self.banks.lock();
        banks.durable = banks.working.clone();
        self.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn show(&self) -> NvResult<Vec<u8>> {
        self.check(ToolOp::Show)?;
        let banks = self.banks.lock();
        let mut dump = Vec::new();
        for (name, value) in banks.working.iter() {
            dump.extend_from_slice(name.as_bytes());
            dump.push(b'=');
            dump.extend_from_slice(value);
            dump.push(b'\n');
        }
        Ok(dump)
    }
}
