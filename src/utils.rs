//! Small helpers shared by the binaries.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;

/// One byte of exit status, the way a shell reports it: the exit code on a
/// normal exit, 128 plus the signal number on a signal death, 255 for
/// anything else.
pub fn exit_byte(status: WaitStatus) -> u8 {
    match status {
        WaitStatus::Exited(_, code) => code as u8,
        WaitStatus::Signaled(_, signal, _) => (128 + signal as i32) as u8,
        _ => 255,
    }
}

/// waitpid with the EINTR retry every caller here wants.
pub fn wait_for(pid: Pid) -> Result<WaitStatus> {
    loop {
        match waitpid(pid, None) {
            Err(Errno::EINTR) => continue,
            other => return other.with_context(|| format!("failed to wait for {}", pid)),
        }
    }
}

/// A scratch directory for tests, named after the test and removed on
/// drop. Fixtures here only ever create files under it and hand paths
/// around, so that is all it offers.
pub struct TempDir {
    path: PathBuf,
}

pub fn create_temp_dir(test_name: &str) -> Result<TempDir> {
    let path = std::env::temp_dir().join(test_name);
    fs::create_dir_all(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    Ok(TempDir { path })
}

impl TempDir {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join<P: AsRef<Path>>(&self, entry: P) -> PathBuf {
        self.path.join(entry)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::Signal;

    #[test]
    fn exit_byte_normal_exit() {
        assert_eq!(exit_byte(WaitStatus::Exited(Pid::from_raw(10), 7)), 7);
        assert_eq!(exit_byte(WaitStatus::Exited(Pid::from_raw(10), 0)), 0);
    }

    #[test]
    fn exit_byte_signal_death() {
        assert_eq!(
            exit_byte(WaitStatus::Signaled(Pid::from_raw(10), Signal::SIGKILL, false)),
            137
        );
        assert_eq!(
            exit_byte(WaitStatus::Signaled(Pid::from_raw(10), Signal::SIGTERM, false)),
            143
        );
    }

    #[test]
    fn exit_byte_other() {
        assert_eq!(
            exit_byte(WaitStatus::Stopped(Pid::from_raw(10), Signal::SIGSTOP)),
            255
        );
    }
}
