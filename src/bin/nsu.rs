//! nsu: become another user in the eyes of a user namespace.

use std::path::PathBuf;
use std::process;

use clap::{AppSettings, Parser};

use nsroot::logger;
use nsroot::su::{self, Request};

#[derive(Parser, Debug)]
#[clap(
    version = "0.1.0",
    about = "Change apparent identity to that of USER (default root) and run a shell",
    setting = AppSettings::TrailingVarArg
)]
struct Opts {
    /// Do not set $HOME, $SHELL, $USER or $LOGNAME
    #[clap(short = 'p')]
    preserve: bool,
    /// Same as -p
    #[clap(short = 'm')]
    preserve_too: bool,
    /// Clear the environment, go home, run the shell as a login shell
    #[clap(short = 'l')]
    login: bool,
    /// Command to pass to the shell with -c
    #[clap(short = 'c')]
    command: Option<String>,
    /// Shell to use instead of the user's
    #[clap(short = 's')]
    shell: Option<PathBuf>,
    /// Target user; a leading lone "-" also selects a login shell
    #[clap(allow_hyphen_values = true)]
    user: Option<String>,
    /// Arguments for the shell
    #[clap(allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() {
    let opts = Opts::parse();

    if let Err(e) = logger::init(None) {
        eprintln!("log init failed: {:?}", e);
    }

    let request = Request {
        user: opts.user,
        shell: opts.shell,
        command: opts.command,
        login: opts.login,
        preserve: opts.preserve || opts.preserve_too,
        args: opts.args,
    };

    if let Err(e) = su::run(request) {
        eprintln!("nsu: {:#}", e);
        process::exit(1);
    }
}
