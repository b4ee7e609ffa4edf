//! The .pid1 file ties a rootfs directory to its running container.
//!
//! It holds the pid of the container's init in the outer pid namespace and
//! lives at the top of the rootfs, so later invocations against the same
//! directory can find the namespaces to join.

use std::path::Path;

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::fcntl::{open, OFlag};
use nix::sys::stat::Mode;
use nix::unistd::{close, read, Pid};

use crate::procfile;

pub const PIDFILE: &str = ".pid1";

/// A pid has at most 15 digits; seeing a 16th byte means the file was not
/// written by us.
const READ_MAX: usize = 16;

pub enum Probe {
    Absent,
    Stale,
    Live(Pid),
}

/// Reads the pidfile in the current directory (the rootfs) and checks that
/// the recorded process still looks like a container init.
pub fn probe() -> Probe {
    probe_in(Path::new(PIDFILE))
}

fn probe_in(path: &Path) -> Probe {
    let fd = match open(path, OFlag::O_RDONLY | OFlag::O_CLOEXEC, Mode::empty()) {
        Ok(fd) => fd,
        Err(_) => return Probe::Absent,
    };

    let mut buf = [0u8; READ_MAX];
    let mut len = 0;
    loop {
        match read(fd, &mut buf[len..]) {
            Ok(0) => break,
            Ok(n) => {
                len += n;
                if len == READ_MAX {
                    break;
                }
            }
            Err(Errno::EINTR) => continue,
            Err(_) => break,
        }
    }
    let _ = close(fd);

    if len == 0 || len == READ_MAX {
        return Probe::Stale;
    }
    match parse_decimal_prefix(&buf[..len]) {
        Some(pid) if init_is_live(pid) => Probe::Live(Pid::from_raw(pid)),
        _ => Probe::Stale,
    }
}

/// Leading decimal digits; whatever follows them (usually a newline) is
/// ignored, the way atoi reads.
fn parse_decimal_prefix(bytes: &[u8]) -> Option<i32> {
    let end = bytes
        .iter()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(bytes.len());
    std::str::from_utf8(&bytes[..end])
        .ok()?
        .parse()
        .ok()
        .filter(|pid| *pid > 0)
}

/// A recorded pid is only trusted while the process exists and sits at /,
/// which is where a container init always is. Anything else is stale.
fn init_is_live(pid: i32) -> bool {
    procfs::process::Process::new(pid)
        .and_then(|process| process.cwd())
        .map(|cwd| cwd == Path::new("/"))
        .unwrap_or(false)
}

/// Records the container init's pid. Written by the launcher parent right
/// after the fork into the new pid namespace succeeds.
pub fn write(pid: Pid) -> Result<()> {
    procfile::write_new(Path::new(PIDFILE), &pid.to_string())
        .context("failed to record pid 1")
}

pub fn remove() {
    let _ = std::fs::remove_file(PIDFILE);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::create_temp_dir;
    use anyhow::Result;

    #[test]
    fn decimal_prefix_parses_like_atoi() {
        assert_eq!(parse_decimal_prefix(b"123"), Some(123));
        assert_eq!(parse_decimal_prefix(b"123\n"), Some(123));
        assert_eq!(parse_decimal_prefix(b"42abc"), Some(42));
        assert_eq!(parse_decimal_prefix(b"0"), None);
        assert_eq!(parse_decimal_prefix(b"-5"), None);
        assert_eq!(parse_decimal_prefix(b"abc"), None);
    }

    #[test]
    fn missing_file_probes_absent() -> Result<()> {
        let tmp = create_temp_dir("test_missing_file_probes_absent")?;
        assert!(matches!(probe_in(&tmp.join(PIDFILE)), Probe::Absent));
        Ok(())
    }

    #[test]
    fn empty_file_probes_stale() -> Result<()> {
        let tmp = create_temp_dir("test_empty_file_probes_stale")?;
        let path = tmp.join(PIDFILE);
        std::fs::write(&path, "")?;
        assert!(matches!(probe_in(&path), Probe::Stale));
        Ok(())
    }

    #[test]
    fn overlong_file_probes_stale() -> Result<()> {
        let tmp = create_temp_dir("test_overlong_file_probes_stale")?;
        let path = tmp.join(PIDFILE);
        std::fs::write(&path, "1234567890123456")?;
        assert!(matches!(probe_in(&path), Probe::Stale));
        Ok(())
    }

    #[test]
    fn dead_pid_probes_stale() -> Result<()> {
        let tmp = create_temp_dir("test_dead_pid_probes_stale")?;
        let path = tmp.join(PIDFILE);
        // The kernel's pid max is well below this.
        std::fs::write(&path, "999999999")?;
        assert!(matches!(probe_in(&path), Probe::Stale));
        Ok(())
    }

    #[test]
    fn live_pid_with_other_cwd_probes_stale() -> Result<()> {
        let tmp = create_temp_dir("test_live_pid_with_other_cwd_probes_stale")?;
        let path = tmp.join(PIDFILE);
        // This very process exists but does not sit at /.
        std::fs::write(&path, std::process::id().to_string())?;
        assert!(matches!(probe_in(&path), Probe::Stale));
        Ok(())
    }
}
