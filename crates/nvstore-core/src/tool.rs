//! The nvram command-line tool
//!
//! `NvramTool` is the only I/O boundary of the crate. `CommandTool` runs the
//! firmware's `nvram` binary; `MemoryNvram` (see `memory`) stands in for it
//! in tests.
//!
//! Tool protocol:
//! - `nvram get <name>`: value on stdout
//! - `nvram set <name>=<value>`, `nvram unset <name>`: mutate the working copy
//! - `nvram commit`: write the working copy to flash
//! - `nvram show`: every entry as `name=value` lines (the size summary goes to stderr)
//!
//! Values cross this boundary as raw bytes. Every call blocks until the
//! process exits. There is no timeout or retry.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::sync::Arc;

use crate::config::Config;
use crate::error::{NvError, NvResult};

/// Tool sub-commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolOp {
    /// Read one entry
    Get,
    /// Write one entry to the working copy
    Set,
    /// Remove one entry from the working copy
    Unset,
    /// Flush the working copy to flash
    Commit,
    /// Dump every entry
    Show,
}

impl ToolOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolOp::Get => "get",
            ToolOp::Set => "set",
            ToolOp::Unset => "unset",
            ToolOp::Commit => "commit",
            ToolOp::Show => "show",
        }
    }
}

impl fmt::Display for ToolOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primitive operations against the NVRAM facility.
///
/// Names passed in are physical names. Implementations return tool errors
/// unmodified and never retry.
pub trait NvramTool: Send + Sync {
    /// Read one entry. An absent entry yields an empty value.
    fn get(&self, name: &str) -> NvResult<Vec<u8>>;

    /// Write one entry to the working copy.
    fn set(&self, name: &str, value: &[u8]) -> NvResult<()>;

    /// Remove one entry from the working copy.
    fn unset(&self, name: &str) -> NvResult<()>;

    /// Flush the working copy to flash. This is the wear-sensitive operation.
    fn commit(&self) -> NvResult<()>;

    /// Dump the whole namespace as newline-delimited `name=value` lines.
    fn show(&self) -> NvResult<Vec<u8>>;
}

impl<T: NvramTool + ?Sized> NvramTool for Arc<T> {
    fn get(&self, name: &str) -> NvResult<Vec<u8>> {
        (**self).get(name)
    }

    fn set(&self, name: &str, value: &[u8]) -> NvResult<()> {
        (**self).set(name, value)
    }

    fn unset(&self, name: &str) -> NvResult<()> {
        (**self).unset(name)
    }

    fn commit(&self) -> NvResult<()> {
        (**self).commit()
    }

    fn show(&self) -> NvResult<Vec<u8>> {
        (**self).show()
    }
}

/// Split a `show` dump into `(name, value)` pairs.
///
/// Lines are split on the first `=`. Empty lines, lines without `=` and
/// lines whose name is not UTF-8 are skipped. A trailing `\r` is dropped.
pub fn parse_show(dump: &[u8]) -> impl Iterator<Item = (&str, &[u8])> {
    dump.split(|&b| b == b'\n').filter_map(|line| {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let eq = line.iter().position(|&b| b == b'=')?;
        let name = std::str::from_utf8(&line[..eq]).ok()?;
        Some((name, &line[eq + 1..]))
    })
}

/// Runs the `nvram` binary for each operation.
#[derive(Debug, Clone)]
pub struct CommandTool {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandTool {
    /// Tool for `program`, with `args` placed before every sub-command.
    pub fn new<P: Into<PathBuf>>(program: P, args: Vec<String>) -> Self {
        Self { program: program.into(), args }
    }

    /// Tool for the program and arguments named in `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.program.clone(), config.program_args.clone())
    }

    fn command(&self, op: ToolOp) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(op.as_str());
        cmd.stdin(Stdio::null());
        cmd
    }

    /// Run to completion, capturing output. Non-zero exit is an error.
    fn run(&self, op: ToolOp, mut cmd: Command) -> NvResult<Output> {
        let output = cmd.output().map_err(|e| NvError::Spawn {
            op,
            program: self.program.display().to_string(),
            kind: e.kind(),
            message: e.to_string(),
        })?;
        if !output.status.success() {
            return Err(NvError::Exit {
                op,
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

impl Default for CommandTool {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl NvramTool for CommandTool {
    fn get(&self, name: &str) -> NvResult<Vec<u8>> {
        let mut cmd = self.command(ToolOp::Get);
        cmd.arg(name);
        let output = self.run(ToolOp::Get, cmd)?;
        Ok(trim_ascii_whitespace(&output.stdout).to_vec())
    }

    fn set(&self, name: &str, value: &[u8]) -> NvResult<()> {
        let mut cmd = self.command(ToolOp::Set);
        cmd.arg(set_arg(name, value));
        self.run(ToolOp::Set, cmd).map(drop)
    }

    fn unset(&self, name: &str) -> NvResult<()> {
        let mut cmd = self.command(ToolOp::Unset);
        cmd.arg(name);
        self.run(ToolOp::Unset, cmd).map(drop)
    }

    fn commit(&self) -> NvResult<()> {
        tracing::info!("Committing NVRAM to flash");
        let cmd = self.command(ToolOp::Commit);
        self.run(ToolOp::Commit, cmd).map(drop)
    }

    fn show(&self) -> NvResult<Vec<u8>> {
        let cmd = self.command(ToolOp::Show);
        Ok(self.run(ToolOp::Show, cmd)?.stdout)
    }
}

/// `<name>=<value>` with the value bytes passed through untouched.
#[cfg(unix)]
fn set_arg(name: &str, value: &[u8]) -> OsString {
    use std::os::unix::ffi::OsStringExt;

    let mut arg = Vec::with_capacity(name.len() + 1 + value.len());
    arg.extend_from_slice(name.as_bytes());
    arg.push(b'=');
    arg.extend_from_slice(value);
    OsString::from_vec(arg)
}

// nvram only ships on unix firmware; elsewhere arguments must be text.
#[cfg(not(unix))]
fn set_arg(name: &str, value: &[u8]) -> OsString {
    OsString::from(format!("{}={}", name, String::from_utf8_lossy(value)))
}

fn trim_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
    &bytes[start..end]
}
