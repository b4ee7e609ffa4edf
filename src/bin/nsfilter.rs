//! nsfilter: run a command with chown and the set*id family rewritten to
//! succeed without doing anything. Meant for software inside unprivileged
//! user namespaces that treats their EPERM as fatal.

use std::process;

use clap::{AppSettings, Parser};

use nsroot::env::{self, EnvPolicy};
use nsroot::logger;
use nsroot::seccomp;

#[derive(Parser, Debug)]
#[clap(
    version = "0.1.0",
    about = "Run a command with identity-changing syscalls neutralized",
    setting = AppSettings::TrailingVarArg
)]
struct Opts {
    /// Command and its arguments
    #[clap(required = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn main() {
    let opts = Opts::parse();

    if let Err(e) = logger::init(None) {
        eprintln!("log init failed: {:?}", e);
    }

    if let Err(e) = seccomp::neutralize_identity_changes() {
        eprintln!("nsfilter: {:#}", e);
        process::exit(1);
    }

    let mut command = opts.command;
    let program = command.remove(0);
    env::exec_program(&program, &command, EnvPolicy::Preserve)
}
