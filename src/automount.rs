//! Optional /proc, /dev and /sys amenities inside the container.
//!
//! A freshly unpacked rootfs usually has none of these. /dev and /sys have
//! to be prepared while the outer ones are still reachable, i.e. before the
//! pivot; /proc can only be mounted once the process is in the new PID
//! namespace, i.e. after the init fork. Everything here is best effort: the
//! container is already committed by the time it runs.

use std::path::Path;

use nix::mount::MsFlags;

use crate::syscall::Syscall;

/// Replaces `dev` and `sys` under the current directory, which is the
/// rootfs bind mount. An unprivileged user gets symlinks into the old
/// root; real root gets bind mounts of the host's.
pub fn prepare_dev_sys(old_root: Option<&Path>, superuser: bool, syscall: &dyn Syscall) {
    // Whichever of these the rootfs has, it goes; failure here is the
    // normal case of the entry not existing.
    for entry in &["dev", "sys"] {
        let _ = std::fs::remove_file(entry);
        let _ = std::fs::remove_dir(entry);
    }

    if superuser {
        let _ = std::fs::create_dir("dev");
        let _ = std::fs::create_dir("sys");
        if let Err(e) = syscall.mount(
            Some(Path::new("/dev")),
            Path::new("dev"),
            None,
            MsFlags::MS_BIND | MsFlags::MS_REC,
            None,
        ) {
            log::warn!("could not bind /dev: {:#}", e);
        }
        if let Err(e) = syscall.mount(
            Some(Path::new("/sys")),
            Path::new("sys"),
            None,
            MsFlags::MS_BIND,
            None,
        ) {
            log::warn!("could not bind /sys: {:#}", e);
        }
    } else {
        let old_root = match old_root {
            Some(path) => path,
            None => return,
        };
        if let Err(e) = syscall.symlink(&old_root.join("dev"), Path::new("dev")) {
            log::warn!("could not symlink dev: {:#}", e);
        }
        if let Err(e) = syscall.symlink(&old_root.join("sys"), Path::new("sys")) {
            log::warn!("could not symlink sys: {:#}", e);
        }
    }
}

/// Mounts a fresh procfs at /proc, so it reflects the new PID namespace.
pub fn mount_proc(syscall: &dyn Syscall) {
    let _ = std::fs::create_dir("proc");
    if let Err(e) = syscall.mount(
        Some(Path::new("proc")),
        Path::new("/proc"),
        Some("proc"),
        MsFlags::MS_NOSUID | MsFlags::MS_NODEV | MsFlags::MS_NOEXEC,
        None,
    ) {
        log::warn!("could not mount /proc: {:#}", e);
    }
}
