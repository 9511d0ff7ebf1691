//! Program execution and child reaping.
//!
//! Everything `execve(2)` needs is converted up front, in the parent, so
//! the forked child only has to hand prepared buffers to the kernel.

use std::convert::Infallible;
use std::ffi::CString;
use std::path::{Path, PathBuf};

use vessel_common::config::ProcessSpec;
use vessel_common::error::{Result, VesselError};

/// Program, argument vector, and environment ready for `execve(2)`.
#[derive(Debug, Clone)]
pub struct ExecSpec {
    program: CString,
    argv: Vec<CString>,
    envp: Vec<CString>,
    cwd: PathBuf,
}

impl ExecSpec {
    /// Converts a process specification. The program is `args[0]`.
    ///
    /// Environment entries are split into a key/value map first, so a
    /// repeated key keeps its last value.
    ///
    /// # Errors
    ///
    /// Returns [`VesselError::Config`] if `args` is empty, an environment
    /// entry is not `KEY=VALUE`, or any string contains a NUL byte.
    pub fn prepare(process: &ProcessSpec) -> Result<Self> {
        let program = process.args.first().ok_or_else(|| VesselError::Config {
            message: "process.args must name the program to run".into(),
        })?;
        let envp = process
            .environment()?
            .into_iter()
            .map(|(key, value)| c_string(format!("{key}={value}")))
            .collect::<Result<_>>()?;
        Ok(Self {
            program: c_string(program.clone())?,
            argv: process
                .args
                .iter()
                .cloned()
                .map(c_string)
                .collect::<Result<_>>()?,
            envp,
            cwd: process.cwd.clone(),
        })
    }

    /// Program path as passed to `execve(2)`.
    #[must_use]
    pub fn program(&self) -> &CString {
        &self.program
    }

    /// Argument vector, program included.
    #[must_use]
    pub fn argv(&self) -> &[CString] {
        &self.argv
    }

    /// `KEY=VALUE` environment entries.
    #[must_use]
    pub fn envp(&self) -> &[CString] {
        &self.envp
    }

    /// Working directory inside the new root.
    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Replaces the current process image. Returns only on failure.
    ///
    /// # Errors
    ///
    /// Returns an error if `execve(2)` fails.
    pub fn exec(&self) -> Result<Infallible> {
        nix::unistd::execve(&self.program, &self.argv, &self.envp).map_err(|e| {
            VesselError::io(
                self.program.to_string_lossy().into_owned(),
                std::io::Error::from(e),
            )
        })
    }
}

fn c_string(value: String) -> Result<CString> {
    CString::new(value).map_err(|e| VesselError::Config {
        message: format!("string contains a NUL byte: {e}"),
    })
}

/// Blocks until `pid` terminates and returns its exit status, `128 + n`
/// for a child killed by signal `n`.
///
/// # Errors
///
/// Returns an error if `waitpid(2)` fails.
pub fn wait_for_child(pid: nix::unistd::Pid) -> Result<i32> {
    use nix::sys::wait::{WaitStatus, waitpid};

    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, status)) => return Ok(status),
            Ok(WaitStatus::Signaled(_, signal, _)) => return Ok(128 + signal as i32),
            Ok(_) | Err(nix::errno::Errno::EINTR) => {}
            Err(e) => {
                return Err(VesselError::io(
                    format!("/proc/{pid}"),
                    std::io::Error::from(e),
                ));
            }
        }
    }
}

/// Ends a forked child with `code` without running the parent's exit
/// handlers or flushing stdio buffers it inherited.
pub fn exit_child(code: i32) -> ! {
    // SAFETY: _exit is async-signal-safe and only terminates this process.
    unsafe { nix::libc::_exit(code) }
}
