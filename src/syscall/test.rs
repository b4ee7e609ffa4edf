use std::any::Any;
use std::cell::RefCell;
use std::path::{Path, PathBuf};

use anyhow::Result;
use nix::mount::{MntFlags, MsFlags};
use nix::sched::CloneFlags;

use super::Syscall;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MountArgs {
    pub source: Option<PathBuf>,
    pub target: PathBuf,
    pub fstype: Option<String>,
    pub flags: MsFlags,
    pub data: Option<String>,
}

#[derive(Clone, Default)]
pub struct TestHelperSyscall {
    unshare_args: RefCell<Vec<CloneFlags>>,
    mount_args: RefCell<Vec<MountArgs>>,
    umount_args: RefCell<Vec<(PathBuf, MntFlags)>>,
    set_ns_args: RefCell<Vec<(i32, CloneFlags)>>,
    chroot_args: RefCell<Vec<PathBuf>>,
    chdir_args: RefCell<Vec<PathBuf>>,
    hostname_args: RefCell<Vec<String>>,
    symlink_args: RefCell<Vec<(PathBuf, PathBuf)>>,
    write_proc_args: RefCell<Vec<(PathBuf, String)>>,
}

impl Syscall for TestHelperSyscall {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn unshare(&self, flags: CloneFlags) -> Result<()> {
        self.unshare_args.borrow_mut().push(flags);
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
        self.mount_args.borrow_mut().push(MountArgs {
            source: source.map(|x| x.to_owned()),
            target: target.to_owned(),
            fstype: fstype.map(|x| x.to_owned()),
            flags,
            data: data.map(|x| x.to_owned()),
        });
        Ok(())
    }

    fn umount(&self, target: &Path, flags: MntFlags) -> Result<()> {
        self.umount_args.borrow_mut().push((target.to_owned(), flags));
        Ok(())
    }

    fn set_ns(&self, rawfd: i32, nstype: CloneFlags) -> Result<()> {
        self.set_ns_args.borrow_mut().push((rawfd, nstype));
        Ok(())
    }

    fn chroot(&self, path: &Path) -> Result<()> {
        self.chroot_args.borrow_mut().push(path.to_owned());
        Ok(())
    }

    fn chdir(&self, path: &Path) -> Result<()> {
        self.chdir_args.borrow_mut().push(path.to_owned());
        Ok(())
    }

    fn set_hostname(&self, hostname: &str) -> Result<()> {
        self.hostname_args.borrow_mut().push(hostname.to_owned());
        Ok(())
    }

    fn symlink(&self, original: &Path, link: &Path) -> Result<()> {
        self.symlink_args
            .borrow_mut()
            .push((original.to_owned(), link.to_owned()));
        Ok(())
    }

    fn write_proc(&self, path: &Path, contents: &str) -> Result<()> {
        self.write_proc_args
            .borrow_mut()
            .push((path.to_owned(), contents.to_owned()));
        Ok(())
    }
}

impl TestHelperSyscall {
    pub fn get_unshare_args(&self) -> Vec<CloneFlags> {
        self.unshare_args.borrow().clone()
    }

    pub fn get_mount_args(&self) -> Vec<MountArgs> {
        self.mount_args.borrow().clone()
    }

    pub fn get_umount_args(&self) -> Vec<(PathBuf, MntFlags)> {
        self.umount_args.borrow().clone()
    }

    pub fn get_set_ns_args(&self) -> Vec<(i32, CloneFlags)> {
        self.set_ns_args.borrow().clone()
    }

    pub fn get_chroot_args(&self) -> Vec<PathBuf> {
        self.chroot_args.borrow().clone()
    }

    pub fn get_chdir_args(&self) -> Vec<PathBuf> {
        self.chdir_args.borrow().clone()
    }

    pub fn get_hostname_args(&self) -> Vec<String> {
        self.hostname_args.borrow().clone()
    }

    pub fn get_symlink_args(&self) -> Vec<(PathBuf, PathBuf)> {
        self.symlink_args.borrow().clone()
    }

    pub fn get_write_proc_args(&self) -> Vec<(PathBuf, String)> {
        self.write_proc_args.borrow().clone()
    }
}
