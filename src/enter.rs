//! Joining the namespaces of an already-running container init.

use std::convert::Infallible;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nix::fcntl::{open, OFlag};
use nix::sched::CloneFlags;
use nix::sys::stat::Mode;
use nix::unistd::{self, close, fork, ForkResult, Pid};

use crate::env::{self, EnvPolicy};
use crate::syscall::Syscall;
use crate::utils;

/// user has to come first so the others become ours to enter; mnt last so
/// the ns files keep resolving while we go.
const NAMESPACES: [&str; 4] = ["user", "uts", "pid", "mnt"];

/// Joins the namespaces of `pid` and runs the program there. A caller that
/// is already root skips the user namespace.
pub fn enter(
    pid: Pid,
    program: &str,
    args: &[String],
    policy: EnvPolicy,
    syscall: &dyn Syscall,
) -> Result<Infallible> {
    join_namespaces(pid, syscall)?;
    syscall
        .chdir(Path::new("/"))
        .context("failed to chdir into the entered root")?;

    // setns on a pid namespace only applies to children created
    // afterwards, so the program must run in a fork.
    match unsafe { fork() }.context("fork")? {
        ForkResult::Parent { child } => {
            let status = utils::wait_for(child)?;
            std::process::exit(utils::exit_byte(status) as i32);
        }
        ForkResult::Child => env::exec_program(program, args, policy),
    }
}

fn join_namespaces(pid: Pid, syscall: &dyn Syscall) -> Result<()> {
    let skip_user = unistd::getuid().is_root();
    for name in &NAMESPACES {
        if skip_user && *name == "user" {
            continue;
        }
        let path = PathBuf::from(format!("/proc/{}/ns/{}", pid, name));
        let fd = open(&path, OFlag::O_RDONLY | OFlag::O_CLOEXEC, Mode::empty())
            .with_context(|| format!("failed to open {}", path.display()))?;
        let res = syscall.set_ns(fd, CloneFlags::empty());
        let _ = close(fd);
        res.with_context(|| format!("failed to enter {}", path.display()))?;
    }
    Ok(())
}
