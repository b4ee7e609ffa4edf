//! Reading /proc/self/mounts and detaching everything outside the rootfs.

use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::Path;

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::fcntl::{open, OFlag};
use nix::mount::MntFlags;
use nix::sys::stat::Mode;
use nix::unistd::{close, read};

use crate::syscall::Syscall;

const MOUNTS: &str = "/proc/self/mounts";

/// The mount table has no useful size up front, so the buffer grows by a
/// fixed step whenever the headroom for the next read runs low.
const GROW_STEP: usize = 4096;
const HEADROOM: usize = 2048;

/// Reads the whole of /proc/self/mounts.
pub fn read_table() -> Result<String> {
    let fd = open(Path::new(MOUNTS), OFlag::O_RDONLY | OFlag::O_CLOEXEC, Mode::empty())
        .with_context(|| format!("failed to open {}", MOUNTS))?;

    let mut buf: Vec<u8> = Vec::new();
    let mut len = 0;
    let res = loop {
        if buf.len() - len < HEADROOM {
            buf.resize(buf.len() + GROW_STEP, 0);
        }
        match read(fd, &mut buf[len..]) {
            Ok(0) => break Ok(()),
            Ok(n) => len += n,
            Err(Errno::EINTR) => continue,
            Err(e) => break Err(e),
        }
    };
    let _ = close(fd);
    res.with_context(|| format!("failed to read {}", MOUNTS))?;

    buf.truncate(len);
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Undoes the escaping the kernel applies to awkward bytes in mount paths:
/// a backslash followed by exactly three octal digits stands for one byte.
pub fn unescape_path(field: &str) -> OsString {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let value = ((bytes[i + 1] as u32 & 0o7) << 6)
                | ((bytes[i + 2] as u32 & 0o7) << 3)
                | (bytes[i + 3] as u32 & 0o7);
            out.push(value as u8);
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    OsString::from_vec(out)
}

/// The inverse of [`unescape_path`]: space, tab, newline and backslash
/// become a backslash and three octal digits, as the kernel writes them.
pub fn escape_path(path: &OsStr) -> String {
    let mut out = Vec::new();
    for &b in path.as_bytes() {
        match b {
            b' ' | b'\t' | b'\n' | b'\\' => {
                out.push(b'\\');
                out.extend_from_slice(format!("{:03o}", b).as_bytes());
            }
            _ => out.push(b),
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// The mount path is the second whitespace-delimited field of each table
/// line.
pub fn mount_points(table: &str) -> Vec<OsString> {
    table
        .lines()
        .filter_map(|line| line.split(' ').nth(1))
        .map(unescape_path)
        .collect()
}

/// Detaches every mount whose path does not share a prefix with `keep`.
///
/// Detaching one mount can expose further detachable mounts underneath it,
/// so the table is re-read and the pass repeated. A pass that unmounts
/// nothing has converged; a pass where nothing fails will leave the next
/// table empty of candidates, so both stop the loop.
pub fn detach_all_except(keep: &Path, syscall: &dyn Syscall) -> Result<()> {
    loop {
        let table = read_table()?;
        let (umounted, failed) = detach_pass(&table, keep, syscall);
        if umounted == 0 || failed == 0 {
            return Ok(());
        }
    }
}

fn detach_pass(table: &str, keep: &Path, syscall: &dyn Syscall) -> (usize, usize) {
    let keep = keep.as_os_str().as_bytes();
    let mut umounted = 0;
    let mut failed = 0;
    for point in mount_points(table) {
        let path = point.as_bytes();
        let shorter = keep.len().min(path.len());
        if path[..shorter] == keep[..shorter] {
            continue;
        }
        match syscall.umount(Path::new(&point), MntFlags::MNT_DETACH) {
            Ok(()) => umounted += 1,
            Err(_) => failed += 1,
        }
    }
    (umounted, failed)
}
