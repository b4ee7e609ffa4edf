//! The environment handed to the container program, and the exec itself.

use std::convert::Infallible;
use std::env;
use std::ffi::CString;
use std::process;

use anyhow::{Context, Result};
use nix::unistd::{execvp, execvpe};

/// PATH for a cleaned environment. sbin is included because the caller is
/// root inside the namespace.
pub const CLEAN_PATH: &str = "PATH=/bin:/sbin:/usr/bin:/usr/sbin";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvPolicy {
    /// Pass the caller's environment through untouched.
    Preserve,
    /// A fixed PATH plus the caller's TERM, nothing else.
    Clean,
}

pub fn clean_environment() -> Vec<CString> {
    let mut envp = vec![CString::new(CLEAN_PATH).unwrap()];
    if let Ok(term) = env::var("TERM") {
        if let Ok(entry) = CString::new(format!("TERM={}", term)) {
            envp.push(entry);
        }
    }
    envp
}

/// Replaces this process with `program`. Does not return; an exec that
/// fails exits with 127, the shell's code for a command that could not be
/// run.
pub fn exec_program(program: &str, args: &[String], policy: EnvPolicy) -> ! {
    let err = match try_exec(program, args, policy) {
        Ok(never) => match never {},
        Err(err) => err,
    };
    eprintln!("exec {}: {:#}", program, err);
    process::exit(127);
}

fn try_exec(program: &str, args: &[String], policy: EnvPolicy) -> Result<Infallible> {
    let prog = CString::new(program).context("program name contains a NUL byte")?;
    let mut argv = vec![prog.clone()];
    for arg in args {
        argv.push(CString::new(arg.as_str()).context("argument contains a NUL byte")?);
    }

    let res = match policy {
        EnvPolicy::Preserve => execvp(&prog, &argv),
        EnvPolicy::Clean => execvpe(&prog, &argv, &clean_environment()),
    };
    res.context("execvp")
}

/// Exec with an explicit argv, for callers whose argv[0] differs from the
/// binary (the identity switcher's login shells). Keeps the current
/// environment.
pub fn exec_with_argv(program: &str, argv: Vec<CString>) -> ! {
    let err = match CString::new(program) {
        Ok(prog) => match execvp(&prog, &argv) {
            Ok(never) => match never {},
            Err(err) => anyhow::Error::new(err).context("execvp"),
        },
        Err(err) => anyhow::Error::new(err).context("program name contains a NUL byte"),
    };
    eprintln!("exec {}: {:#}", program, err);
    process::exit(127);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn clean_environment_keeps_term() {
        env::set_var("TERM", "xterm-256color");
        let envp = clean_environment();
        assert_eq!(envp[0], CString::new(CLEAN_PATH).unwrap());
        assert!(envp.contains(&CString::new("TERM=xterm-256color").unwrap()));
        assert_eq!(envp.len(), 2);
    }

    #[test]
    #[serial]
    fn clean_environment_without_term_is_path_only() {
        env::remove_var("TERM");
        let envp = clean_environment();
        assert_eq!(envp, vec![CString::new(CLEAN_PATH).unwrap()]);
    }
}
