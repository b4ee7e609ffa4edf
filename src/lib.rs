//! # nsroot
//! Rootless chroot-style containers built on Linux user namespaces.
//! The library backs four small binaries: the `nsroot` launcher, the `nsu`
//! identity switcher, the `nsfilter` seccomp helper and `psgrep`.

#[cfg(test)]
#[macro_use]
extern crate quickcheck;

pub mod automount;
pub mod channel;
pub mod enter;
pub mod env;
pub mod init;
pub mod launcher;
pub mod logger;
pub mod mounts;
pub mod namespaces;
pub mod pidfile;
pub mod pidscan;
pub mod procfile;
pub mod seccomp;
pub mod su;
pub mod syscall;
pub mod utils;
