//! An interface trait so the launcher's sequencing can be exercised in
//! tests without actually reconfiguring the test process.

pub mod linux;
pub mod test;

use std::any::Any;
use std::path::Path;

use anyhow::Result;
use nix::mount::{MntFlags, MsFlags};
use nix::sched::CloneFlags;

use self::linux::LinuxSyscall;
use self::test::TestHelperSyscall;

/// The kernel-facing operations the launcher sequences.
pub trait Syscall {
    fn as_any(&self) -> &dyn Any;
    fn unshare(&self, flags: CloneFlags) -> Result<()>;
    fn mount(
        &self,
        source: Option<&Path>,
        target: &Path,
        fstype: Option<&str>,
        flags: MsFlags,
        data: Option<&str>,
    ) -> Result<()>;
    fn umount(&self, target: &Path, flags: MntFlags) -> Result<()>;
    fn set_ns(&self, rawfd: i32, nstype: CloneFlags) -> Result<()>;
    fn chroot(&self, path: &Path) -> Result<()>;
    fn chdir(&self, path: &Path) -> Result<()>;
    fn set_hostname(&self, hostname: &str) -> Result<()>;
    fn symlink(&self, original: &Path, link: &Path) -> Result<()>;
    fn write_proc(&self, path: &Path, contents: &str) -> Result<()>;
}

pub fn create_syscall() -> Box<dyn Syscall> {
    if cfg!(test) {
        Box::new(TestHelperSyscall::default())
    } else {
        Box::new(LinuxSyscall)
    }
}
