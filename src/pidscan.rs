//! Enumerating processes by scanning a proc directory.

use std::fs::{self, ReadDir};
use std::path::Path;

/// Iterator over the entries of a proc directory whose names are clean
/// positive decimals, which is how the kernel names per-process
/// directories. The directory handle is held across calls and dropped on
/// exhaustion.
pub struct PidIter {
    entries: Option<ReadDir>,
}

/// Scans `proc_dir` for processes. A directory that cannot be opened scans
/// as empty, the same as a pid namespace with nothing in it.
pub fn pids_in(proc_dir: &Path) -> PidIter {
    PidIter {
        entries: fs::read_dir(proc_dir).ok(),
    }
}

fn parse_pid(name: &str) -> Option<i32> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok().filter(|pid| *pid > 0)
}

impl Iterator for PidIter {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        let entries = self.entries.as_mut()?;
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(_) => continue,
            };
            if let Some(pid) = entry.file_name().to_str().and_then(parse_pid) {
                return Some(pid);
            }
        }
        self.entries = None;
        None
    }
}
