//! Single-shot writes to files under /proc.
//!
//! The kernel only accepts one write for `uid_map`, `gid_map` and
//! `setgroups`; a partial write would leave the namespace half configured.
//! Short writes are therefore an error here, never retried.

use std::path::Path;

use anyhow::{bail, Context, Result};
use nix::fcntl::{open, OFlag};
use nix::sys::stat::Mode;
use nix::unistd::{close, write};

/// Anything longer than this cannot be a valid map line or pid entry.
pub const LINE_MAX: usize = 80;

/// Writes `contents` to an existing file in a single write.
pub fn write_proc<P: AsRef<Path>>(path: P, contents: &str) -> Result<()> {
    write_once(path.as_ref(), contents, OFlag::O_WRONLY)
}

/// Like [`write_proc`], but creates the file first. Used for the pidfile.
pub fn write_new<P: AsRef<Path>>(path: P, contents: &str) -> Result<()> {
    write_once(path.as_ref(), contents, OFlag::O_WRONLY | OFlag::O_CREAT)
}

fn write_once(path: &Path, contents: &str, oflag: OFlag) -> Result<()> {
    if contents.len() >= LINE_MAX {
        bail!(
            "refusing to write {} bytes to {}",
            contents.len(),
            path.display()
        );
    }

    let fd = open(path, oflag, Mode::S_IRUSR | Mode::S_IWUSR)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let res = write(fd, contents.as_bytes());
    let _ = close(fd);

    match res {
        Ok(n) if n == contents.len() => Ok(()),
        Ok(n) => bail!(
            "short write to {} ({} of {} bytes)",
            path.display(),
            n,
            contents.len()
        ),
        Err(e) => Err(e).with_context(|| format!("failed to write {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::create_temp_dir;

    #[test]
    fn write_new_creates_and_writes() -> Result<()> {
        let tmp = create_temp_dir("test_write_new_creates_and_writes")?;
        let path = tmp.join("pidfile");
        write_new(&path, "12345")?;
        assert_eq!(std::fs::read_to_string(&path)?, "12345");
        Ok(())
    }

    #[test]
    fn write_proc_requires_existing_file() -> Result<()> {
        let tmp = create_temp_dir("test_write_proc_requires_existing_file")?;
        assert!(write_proc(tmp.join("missing"), "deny").is_err());
        Ok(())
    }

    #[test]
    fn oversized_line_is_rejected() -> Result<()> {
        let tmp = create_temp_dir("test_oversized_line_is_rejected")?;
        let path = tmp.join("target");
        std::fs::write(&path, "")?;
        let long = "x".repeat(LINE_MAX);
        assert!(write_proc(&path, &long).is_err());
        // One byte below the limit is fine.
        let ok = "x".repeat(LINE_MAX - 1);
        assert!(write_proc(&path, &ok).is_ok());
        Ok(())
    }
}
