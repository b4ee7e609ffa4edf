//! nsu: change apparent identity with a single-uid user namespace map.
//!
//! No setuid bit anywhere: the target uid is mapped onto the caller's own
//! uid, so the kernel treats the process as the target within the
//! namespace while every file access still happens as the caller.

use std::convert::Infallible;
use std::ffi::CString;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use nix::errno::Errno;
use nix::sched::{unshare, CloneFlags};
use nix::unistd::{self, Gid, Uid, User};

use crate::procfile;

pub const ROOT_PATH: &str = "/bin:/sbin:/usr/bin:/usr/sbin";
pub const USER_PATH: &str = "/bin:/usr/bin";

pub struct Request {
    /// Target user; defaults to root.
    pub user: Option<String>,
    pub shell: Option<PathBuf>,
    /// Command for the shell's -c.
    pub command: Option<String>,
    pub login: bool,
    /// -p/-m: prefer $SHELL from the environment over the passwd entry.
    pub preserve: bool,
    pub args: Vec<String>,
}

pub struct Target {
    pub name: String,
    pub uid: Uid,
    pub gid: Gid,
    pub home: PathBuf,
    pub shell: PathBuf,
}

/// Looks the target up in the passwd database. A named user that is
/// missing is an error; a missing root entry silently gets the classic
/// defaults, which is all the switcher needs.
pub fn lookup_target(user: Option<&str>) -> Result<Target> {
    let name = user.unwrap_or("root");
    match User::from_name(name).unwrap_or(None) {
        Some(pw) => Ok(Target {
            name: name.to_owned(),
            uid: pw.uid,
            gid: pw.gid,
            home: pw.dir,
            shell: pw.shell,
        }),
        None if user.is_some() => bail!("Unknown user"),
        None => Ok(Target {
            name: "root".to_owned(),
            uid: Uid::from_raw(0),
            gid: Gid::from_raw(0),
            home: PathBuf::from("/root"),
            shell: PathBuf::from("/bin/sh"),
        }),
    }
}

/// This tool hands out pretend identities. If setuid to the target
/// actually works (or would after retry), the process has real privileges
/// and must not be doing this.
fn refuse_if_privileged(target: Uid) -> Result<()> {
    match unistd::setuid(target) {
        Ok(()) if unistd::getuid() == target => bail!("Do not use nsu while actually root"),
        Err(Errno::EAGAIN) => bail!("Do not use nsu while actually root"),
        _ => Ok(()),
    }
}

/// One uid and one gid, target mapped onto the caller. setgroups is denied
/// first or the kernel rejects the gid map.
fn map_identity(target: &Target) -> Result<()> {
    let uid = unistd::getuid();
    let gid = unistd::getgid();

    unshare(CloneFlags::CLONE_NEWUSER).context("unshare")?;
    procfile::write_proc("/proc/self/setgroups", "deny")?;
    procfile::write_proc(
        "/proc/self/uid_map",
        &format!("{} {} 1", target.uid, uid),
    )?;
    procfile::write_proc(
        "/proc/self/gid_map",
        &format!("{} {} 1", target.gid, gid),
    )?;
    Ok(())
}

/// The variables a login shell starts from; the caller clears everything
/// else. TERM survives, root gets the sbin PATH.
pub fn login_environment(target: &Target, shell: &Path, term: Option<&str>) -> Vec<(String, String)> {
    let mut vars = Vec::new();
    if let Some(term) = term {
        vars.push(("TERM".to_owned(), term.to_owned()));
    }
    vars.push((
        "PATH".to_owned(),
        if target.uid.is_root() { ROOT_PATH } else { USER_PATH }.to_owned(),
    ));
    vars.push(("USER".to_owned(), target.name.clone()));
    vars.push(("LOGNAME".to_owned(), target.name.clone()));
    vars.push(("HOME".to_owned(), target.home.display().to_string()));
    vars.push(("SHELL".to_owned(), shell.display().to_string()));
    vars
}

/// argv[0] for the shell: its basename, with the login dash when asked.
pub fn shell_argv0(shell: &Path, login: bool) -> String {
    let base = shell
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| shell.display().to_string());
    if login {
        format!("-{}", base)
    } else {
        base
    }
}

pub fn run(mut request: Request) -> Result<Infallible> {
    // A lone "-" argument is the historical spelling of -l; the username,
    // if any, follows it.
    if request.user.as_deref() == Some("-") {
        request.login = true;
        request.user = if request.args.is_empty() {
            None
        } else {
            Some(request.args.remove(0))
        };
    }

    let target = lookup_target(request.user.as_deref())?;

    let shell = request
        .shell
        .clone()
        .or_else(|| {
            if request.preserve {
                std::env::var_os("SHELL").map(PathBuf::from)
            } else {
                None
            }
        })
        .unwrap_or_else(|| target.shell.clone());

    // No namespace when no identity change is needed.
    if target.uid != unistd::getuid() {
        refuse_if_privileged(target.uid)?;
        map_identity(&target)?;
    }

    if request.login {
        let term = std::env::var("TERM").ok();
        if let Err(e) = unistd::chdir(&target.home) {
            eprintln!("chdir {}: {}", target.home.display(), e);
            eprintln!("Instead you'll be at /");
            if let Err(e) = unistd::chdir("/") {
                eprintln!("chdir /: {}", e);
            }
        }
        for (key, _) in std::env::vars_os().collect::<Vec<_>>() {
            std::env::remove_var(key);
        }
        for (key, value) in login_environment(&target, &shell, term.as_deref()) {
            std::env::set_var(key, value);
        }
    } else {
        if !target.uid.is_root() {
            std::env::set_var("USER", &target.name);
            std::env::set_var("LOGNAME", &target.name);
        }
        std::env::set_var("HOME", &target.home);
        std::env::set_var("SHELL", &shell);
    }

    let mut argv = vec![CString::new(shell_argv0(&shell, request.login))
        .context("shell name contains a NUL byte")?];
    if let Some(command) = &request.command {
        argv.push(CString::new("-c").unwrap());
        argv.push(CString::new(command.as_str()).context("command contains a NUL byte")?);
    }
    for arg in &request.args {
        argv.push(CString::new(arg.as_str()).context("argument contains a NUL byte")?);
    }

    crate::env::exec_with_argv(&shell.display().to_string(), argv)
}
