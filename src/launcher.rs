//! The launcher driver: decide between entering, killing and building,
//! then sequence the namespace construction and relay the exit status.

use std::path::PathBuf;

use anyhow::{Context, Result};
use nix::sys::signal::{kill, Signal};
use nix::unistd::{self, fork, ForkResult};

use crate::automount;
use crate::channel::ExitPipe;
use crate::enter;
use crate::env::{self, EnvPolicy};
use crate::init;
use crate::namespaces::ContainerNs;
use crate::pidfile::{self, Probe};
use crate::syscall::create_syscall;
use crate::utils;

/// Three-valued option flags. Auto is resolved to a concrete choice before
/// the sequence starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Policy {
    On,
    Off,
    Auto,
}

impl Policy {
    pub fn resolve(self, auto_means: bool) -> bool {
        match self {
            Policy::On => true,
            Policy::Off => false,
            Policy::Auto => auto_means,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnterMode {
    /// Enter a live container when there is one, else build fresh.
    Auto,
    /// -E: entering is required, a fresh build is an error.
    Required,
    /// -k: kill any live pid 1 and build fresh.
    Kill,
}

pub struct Config {
    pub dir: PathBuf,
    pub program: String,
    pub args: Vec<String>,
    pub init: Policy,
    pub enter: EnterMode,
    pub automounts: Policy,
    pub env: EnvPolicy,
    pub hostname: Option<String>,
    pub old_root: Option<PathBuf>,
    pub init_timeout: i32,
}

/// Only a path whose last component is `init` under some directory counts,
/// the way /sbin/init and /init do: such a program is its own init and
/// needs no supervisor.
pub fn is_init_path(program: &str) -> bool {
    program.ends_with("/init")
}

/// Runs the launcher. Returns the byte to exit with; the paths that exec
/// or supervise never come back.
pub fn run(mut config: Config) -> Result<u8> {
    let uid = unistd::getuid();
    let gid = unistd::getgid();

    let automounts = config.automounts.resolve(!uid.is_root());
    if config.old_root.is_none() && !uid.is_root() {
        config.old_root = Some(PathBuf::from("oldroot"));
    }

    unistd::chdir(&config.dir)
        .with_context(|| format!("failed to chdir to {}", config.dir.display()))?;

    match pidfile::probe() {
        Probe::Live(pid) => match config.enter {
            EnterMode::Kill => {
                kill(pid, Signal::SIGKILL)
                    .with_context(|| format!("failed to kill pid {}", pid))?;
                eprintln!("Killed previous pid 1 ({})", pid);
                pidfile::remove();
            }
            EnterMode::Auto | EnterMode::Required => {
                let syscall = create_syscall();
                match enter::enter(pid, &config.program, &config.args, config.env, syscall.as_ref())? {}
            }
        },
        Probe::Stale => {
            pidfile::remove();
            if config.enter != EnterMode::Kill {
                eprintln!("Removed stale {} file", pidfile::PIDFILE);
            }
            if config.enter == EnterMode::Required {
                eprintln!("Cannot enter (-E) old namespace");
                std::process::exit(1);
            }
        }
        Probe::Absent => {
            if config.enter == EnterMode::Required {
                eprintln!("Cannot enter (-E) old namespace");
                std::process::exit(1);
            }
        }
    }

    let rootfs = std::fs::canonicalize(".").context("failed to resolve the container root")?;
    let hostname = config.hostname.clone().unwrap_or_else(|| {
        rootfs
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "(container)".to_owned())
    });

    let ns = ContainerNs::new(rootfs, config.old_root.clone(), uid, gid);
    ns.unshare()?;
    ns.write_id_maps()?;
    ns.make_root_slave()?;
    ns.bind_rootfs()?;

    if automounts {
        automount::prepare_dev_sys(config.old_root.as_deref(), uid.is_root(), ns.syscall());
    }
    ns.expose_old_root();
    ns.detach_foreign_mounts()?;
    ns.swap_root()?;

    let provide_init = config.init.resolve(!is_init_path(&config.program));
    let mut pipe = if provide_init {
        Some(ExitPipe::new()?)
    } else {
        None
    };

    match unsafe { fork() }.context("failed to fork into the pid namespace")? {
        ForkResult::Parent { child } => {
            pidfile::write(child)?;
            if let Some(pipe) = pipe.as_mut() {
                // The init reports the program's exit; stragglers keep it
                // alive past that without holding us up.
                pipe.close_sender();
                pipe.wait_exit_code()
            } else {
                let status = utils::wait_for(child)?;
                pidfile::remove();
                Ok(utils::exit_byte(status))
            }
        }
        ForkResult::Child => {
            if let Some(pipe) = pipe.as_mut() {
                pipe.close_receiver();
            }
            if automounts {
                automount::mount_proc(ns.syscall());
            }
            ns.set_hostname(&hostname);

            if let Some(mut pipe) = pipe {
                match unsafe { fork() }.context("failed to fork the container program")? {
                    ForkResult::Parent { child } => {
                        init::supervise(child, &mut pipe, config.init_timeout)
                    }
                    ForkResult::Child => env::exec_program(&config.program, &config.args, config.env),
                }
            } else {
                env::exec_program(&config.program, &config.args, config.env)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_resolution() {
        assert!(Policy::On.resolve(false));
        assert!(!Policy::Off.resolve(true));
        assert!(Policy::Auto.resolve(true));
        assert!(!Policy::Auto.resolve(false));
    }

    #[test]
    fn init_path_detection() {
        assert!(is_init_path("/sbin/init"));
        assert!(is_init_path("/init"));
        assert!(is_init_path("rootfs/init"));
        assert!(!is_init_path("/myinit"));
        assert!(!is_init_path("init"));
        assert!(!is_init_path("/sbin/initd"));
    }
}
