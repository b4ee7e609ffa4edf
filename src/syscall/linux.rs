//! Implements the Syscall trait for Linux.

use std::any::Any;
use std::path::Path;

use anyhow::{Context, Result};
use nix::mount::{mount, umount2, MntFlags, MsFlags};
use nix::sched::{setns, unshare, CloneFlags};
use nix::unistd::{self, sethostname};

use super::Syscall;
use crate::procfile;

#[derive(Clone)]
pub struct LinuxSyscall;

impl Syscall for LinuxSyscall {
    fn as_any(&self) -> &dyn Any {
        self
    }

    /// Disassociate parts of the execution context.
    // see https://man7.org/linux/man-pages/man2/unshare.2.html
    fn unshare(&self, flags: CloneFlags) -> Result<()> {
        unshare(flags).context("unshare")?;
        Ok(())
    }

    fn mount(
        &self,
        source: Option<&Path>,
        target: &Path,
        fstype: Option<&str>,
        flags: MsFlags,
        data: Option<&str>,
    ) -> Result<()> {
        mount(source, target, fstype, flags, data)
            .with_context(|| format!("failed to mount {}", target.display()))?;
        Ok(())
    }

    fn umount(&self, target: &Path, flags: MntFlags) -> Result<()> {
        umount2(target, flags)
            .with_context(|| format!("failed to unmount {}", target.display()))?;
        Ok(())
    }

    /// Moves the process into the namespace behind `rawfd`.
    fn set_ns(&self, rawfd: i32, nstype: CloneFlags) -> Result<()> {
        setns(rawfd, nstype).context("setns")?;
        Ok(())
    }

    fn chroot(&self, path: &Path) -> Result<()> {
        unistd::chroot(path).with_context(|| format!("failed to chroot to {}", path.display()))?;
        Ok(())
    }

    fn chdir(&self, path: &Path) -> Result<()> {
        unistd::chdir(path).with_context(|| format!("failed to chdir to {}", path.display()))?;
        Ok(())
    }

    fn set_hostname(&self, hostname: &str) -> Result<()> {
        sethostname(hostname)
            .with_context(|| format!("failed to set hostname to {}", hostname))?;
        Ok(())
    }

    fn symlink(&self, original: &Path, link: &Path) -> Result<()> {
        std::os::unix::fs::symlink(original, link)
            .with_context(|| format!("failed to symlink {}", link.display()))?;
        Ok(())
    }

    fn write_proc(&self, path: &Path, contents: &str) -> Result<()> {
        procfile::write_proc(path, contents)
    }
}
