//! Building the container's namespaces and turning a directory into /.
//!
//! An unprivileged process cannot pivot_root an arbitrary directory or
//! unmount the host's mounts. What it can do, once inside a fresh user and
//! mount namespace, is bind the directory onto itself (MS_MOVE insists its
//! source is a mount), detach everything else lazily, move the bind over /
//! and chroot into it. None of it leaks back out because / is made a slave
//! first.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nix::mount::MsFlags;
use nix::sched::CloneFlags;
use nix::unistd::{Gid, Uid};

use crate::mounts;
use crate::syscall::{create_syscall, Syscall};

pub struct ContainerNs {
    rootfs: PathBuf,
    old_root: Option<PathBuf>,
    uid: Uid,
    gid: Gid,
    syscall: Box<dyn Syscall>,
}

impl ContainerNs {
    pub fn new(rootfs: PathBuf, old_root: Option<PathBuf>, uid: Uid, gid: Gid) -> Self {
        Self {
            rootfs,
            old_root,
            uid,
            gid,
            syscall: create_syscall(),
        }
    }

    /// Real root gets by without a user namespace; everyone else needs one
    /// to be allowed the rest.
    pub fn clone_flags(&self) -> CloneFlags {
        let mut flags =
            CloneFlags::CLONE_NEWNS | CloneFlags::CLONE_NEWPID | CloneFlags::CLONE_NEWUTS;
        if !self.uid.is_root() {
            flags |= CloneFlags::CLONE_NEWUSER;
        }
        flags
    }

    pub fn unshare(&self) -> Result<()> {
        self.syscall.unshare(self.clone_flags())
    }

    /// Maps container root to the invoking user, range length 1. The
    /// kernel refuses a gid map from a process that could still call
    /// setgroups, so that is denied first.
    pub fn write_id_maps(&self) -> Result<()> {
        if self.uid.is_root() {
            return Ok(());
        }
        self.syscall
            .write_proc(Path::new("/proc/self/setgroups"), "deny")?;
        self.syscall
            .write_proc(Path::new("/proc/self/uid_map"), &format!("0 {} 1", self.uid))?;
        self.syscall
            .write_proc(Path::new("/proc/self/gid_map"), &format!("0 {} 1", self.gid))?;
        Ok(())
    }

    /// Host mount events may propagate in, ours must not propagate out.
    pub fn make_root_slave(&self) -> Result<()> {
        self.syscall
            .mount(
                None,
                Path::new("/"),
                None,
                MsFlags::MS_REC | MsFlags::MS_SLAVE,
                None,
            )
            .context("failed to make / a slave mount")
    }

    /// Binds the rootfs onto itself and steps into the bind, so relative
    /// paths now resolve inside the mount that will become /.
    pub fn bind_rootfs(&self) -> Result<()> {
        self.syscall
            .mount(
                Some(self.rootfs.as_path()),
                self.rootfs.as_path(),
                None,
                MsFlags::MS_BIND | MsFlags::MS_REC,
                None,
            )
            .context("failed to bind the rootfs onto itself")?;
        self.syscall
            .chdir(self.rootfs.as_path())
            .context("failed to enter the rootfs bind mount")
    }

    /// Keeps the outer / reachable inside the container. Best effort: a
    /// container without its old root is degraded, not broken.
    pub fn expose_old_root(&self) {
        let old_root = match &self.old_root {
            Some(path) => path,
            None => return,
        };
        let _ = std::fs::create_dir(old_root);
        if let Err(e) = self.syscall.mount(
            Some(Path::new("/")),
            old_root,
            None,
            MsFlags::MS_BIND | MsFlags::MS_REC,
            None,
        ) {
            log::warn!("could not expose the old root at {}: {:#}", old_root.display(), e);
        }
    }

    /// Lazily detaches every mount that is not under the rootfs.
    pub fn detach_foreign_mounts(&self) -> Result<()> {
        mounts::detach_all_except(&self.rootfs, self.syscall.as_ref())
    }

    /// Moves the rootfs bind over / and chroots into it.
    pub fn swap_root(&self) -> Result<()> {
        self.syscall
            .mount(
                Some(self.rootfs.as_path()),
                Path::new("/"),
                None,
                MsFlags::MS_MOVE,
                None,
            )
            .context("failed to move the rootfs over /")?;
        self.syscall.chroot(Path::new(".")).context("chroot")?;
        self.syscall
            .chdir(Path::new("/"))
            .context("failed to chdir into the new root")
    }

    pub fn set_hostname(&self, hostname: &str) {
        if let Err(e) = self.syscall.set_hostname(hostname) {
            log::warn!("could not set hostname: {:#}", e);
        }
    }

    pub fn syscall(&self) -> &dyn Syscall {
        self.syscall.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscall::test::TestHelperSyscall;
    use anyhow::Result;
    use std::path::PathBuf;

    fn test_ns(uid: u32) -> ContainerNs {
        ContainerNs::new(
            PathBuf::from("/tmp/rootfs"),
            Some(std::env::temp_dir().join("test_container_ns_oldroot")),
            Uid::from_raw(uid),
            Gid::from_raw(uid),
        )
    }

    fn helper(ns: &ContainerNs) -> &TestHelperSyscall {
        ns.syscall.as_any().downcast_ref().unwrap()
    }

    #[test]
    fn user_namespace_only_for_non_root() {
        assert!(test_ns(1000)
            .clone_flags()
            .contains(CloneFlags::CLONE_NEWUSER));
        assert!(!test_ns(0).clone_flags().contains(CloneFlags::CLONE_NEWUSER));
    }

    #[test]
    fn unshare_requests_mount_pid_and_uts() -> Result<()> {
        let ns = test_ns(1000);
        ns.unshare()?;
        let args = helper(&ns).get_unshare_args();
        assert_eq!(args.len(), 1);
        assert!(args[0].contains(
            CloneFlags::CLONE_NEWNS | CloneFlags::CLONE_NEWPID | CloneFlags::CLONE_NEWUTS
        ));
        Ok(())
    }

    #[test]
    fn setgroups_denied_before_gid_map() -> Result<()> {
        let ns = test_ns(1000);
        ns.write_id_maps()?;

        let writes = helper(&ns).get_write_proc_args();
        assert_eq!(
            writes,
            vec![
                (PathBuf::from("/proc/self/setgroups"), "deny".to_owned()),
                (PathBuf::from("/proc/self/uid_map"), "0 1000 1".to_owned()),
                (PathBuf::from("/proc/self/gid_map"), "0 1000 1".to_owned()),
            ]
        );
        Ok(())
    }

    #[test]
    fn root_writes_no_maps() -> Result<()> {
        let ns = test_ns(0);
        ns.write_id_maps()?;
        assert!(helper(&ns).get_write_proc_args().is_empty());
        Ok(())
    }

    #[test]
    fn pivot_mounts_in_order() -> Result<()> {
        let ns = test_ns(1000);
        ns.make_root_slave()?;
        ns.bind_rootfs()?;
        ns.expose_old_root();
        ns.swap_root()?;

        let mounts = helper(&ns).get_mount_args();
        assert_eq!(mounts.len(), 4);

        assert_eq!(mounts[0].target, PathBuf::from("/"));
        assert_eq!(mounts[0].flags, MsFlags::MS_REC | MsFlags::MS_SLAVE);

        assert_eq!(mounts[1].source, Some(PathBuf::from("/tmp/rootfs")));
        assert_eq!(mounts[1].target, PathBuf::from("/tmp/rootfs"));
        assert_eq!(mounts[1].flags, MsFlags::MS_BIND | MsFlags::MS_REC);

        assert_eq!(mounts[2].source, Some(PathBuf::from("/")));
        assert_eq!(
            mounts[2].target,
            std::env::temp_dir().join("test_container_ns_oldroot")
        );

        assert_eq!(mounts[3].source, Some(PathBuf::from("/tmp/rootfs")));
        assert_eq!(mounts[3].target, PathBuf::from("/"));
        assert_eq!(mounts[3].flags, MsFlags::MS_MOVE);

        let chroots = helper(&ns).get_chroot_args();
        assert_eq!(chroots, vec![PathBuf::from(".")]);

        let chdirs = helper(&ns).get_chdir_args();
        assert_eq!(
            chdirs,
            vec![PathBuf::from("/tmp/rootfs"), PathBuf::from("/")]
        );
        Ok(())
    }
}
