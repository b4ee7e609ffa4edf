//! The in-container init: reap everything, report the program's exit, and
//! stay for as long as the namespace has inhabitants.
//!
//! The launched program may fork daemons and exit; those get reparented to
//! this process. Programs that join the namespace later (re-entry) are not
//! our children until their own parents die, so an ECHILD from wait does
//! not yet mean the namespace is empty; /proc is the authority.

use std::path::Path;
use std::thread;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::wait::wait;
use nix::unistd::Pid;

use crate::channel::ExitPipe;
use crate::pidfile;
use crate::pidscan;
use crate::utils;

/// How long to nap after spotting a non-child inhabitant.
const OCCUPIED_RECHECK: Duration = Duration::from_secs(3);
/// Nap length for `-t -1`, where the init never gives up.
const FOREVER_NAP: Duration = Duration::from_secs(30);

/// Runs as pid 1 of the container. `program` is the single child whose
/// exit status gets reported through `pipe`; everything else is reaped and
/// dropped. Exits 0 once the namespace stays empty past `init_timeout`
/// seconds (negative: never).
pub fn supervise(program: Pid, pipe: &mut ExitPipe, init_timeout: i32) -> ! {
    let mut program = Some(program);
    let mut timeout = 0;

    loop {
        match wait() {
            Ok(status) if program.is_some() && status.pid() == program => {
                if let Err(e) = pipe.send_exit_code(utils::exit_byte(status)) {
                    log::warn!("could not report the program's exit: {:#}", e);
                }
                program = None;
            }
            // Reaped somebody's orphan; not ours to report.
            Ok(_) => {}
            Err(Errno::EINTR) => {}
            Err(Errno::ECHILD) => {
                if init_timeout < 0 {
                    thread::sleep(FOREVER_NAP);
                    continue;
                }
                if pidscan::pids_in(Path::new("/proc")).any(|pid| pid > 1) {
                    timeout = 0;
                    thread::sleep(OCCUPIED_RECHECK);
                    continue;
                }
                timeout += 1;
                if timeout <= init_timeout {
                    thread::sleep(Duration::from_secs(1));
                    continue;
                }
                pidfile::remove();
                std::process::exit(0);
            }
            Err(_) => {
                pidfile::remove();
                std::process::exit(0);
            }
        }
    }
}
