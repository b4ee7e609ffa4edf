//! # nsroot
//! Turns a directory into the root filesystem of a lightweight container,
//! isolated in fresh user, mount, pid and uts namespaces. No privileges
//! needed: inside the new user namespace the caller is root enough for all
//! of it.

use std::path::PathBuf;
use std::process;

use clap::{AppSettings, Parser};

use nsroot::env::EnvPolicy;
use nsroot::launcher::{self, Config, EnterMode, Policy};
use nsroot::logger;

#[derive(Parser, Debug)]
#[clap(
    version = "0.1.0",
    about = "Run a program with DIR as its root filesystem, in its own namespaces",
    setting = AppSettings::TrailingVarArg
)]
struct Opts {
    /// Provide an init process for the container
    #[clap(short = 'i', conflicts_with = "boot")]
    init: bool,
    /// The program is the container's init; do not supervise it
    #[clap(short = 'b')]
    boot: bool,
    /// Kill the previous pid 1 and set up a fresh namespace
    #[clap(short = 'k', conflicts_with = "enter")]
    kill: bool,
    /// Only enter a previously created namespace
    #[clap(short = 'E')]
    enter: bool,
    /// Mount /proc and provide /dev and /sys
    #[clap(short = 'A', conflicts_with = "no_automounts")]
    automounts: bool,
    /// Do not mount /proc, /dev or /sys
    #[clap(short = 'N')]
    no_automounts: bool,
    /// Clean the environment: a fixed PATH plus TERM, nothing else
    #[clap(short = 'c')]
    clean_env: bool,
    /// Hostname for the container (default: the name of DIR)
    #[clap(short = 'M')]
    hostname: Option<String>,
    /// Where to mount the old root inside the container
    #[clap(short = 'r')]
    old_root: Option<PathBuf>,
    /// Seconds to linger as init in an empty namespace; -1 means forever
    #[clap(short = 't', default_value = "5", allow_hyphen_values = true)]
    init_timeout: i32,
    /// Directory that becomes the container's root filesystem
    dir: PathBuf,
    /// Program to run inside, followed by its arguments
    #[clap(required = true, allow_hyphen_values = true)]
    program: Vec<String>,
}

fn main() {
    let opts = Opts::parse();

    if let Err(e) = logger::init(std::env::var_os("NSROOT_LOG").map(PathBuf::from)) {
        eprintln!("log init failed: {:?}", e);
    }

    let mut program = opts.program;
    let config = Config {
        dir: opts.dir,
        program: program.remove(0),
        args: program,
        init: if opts.init {
            Policy::On
        } else if opts.boot {
            Policy::Off
        } else {
            Policy::Auto
        },
        enter: if opts.kill {
            EnterMode::Kill
        } else if opts.enter {
            EnterMode::Required
        } else {
            EnterMode::Auto
        },
        automounts: if opts.automounts {
            Policy::On
        } else if opts.no_automounts {
            Policy::Off
        } else {
            Policy::Auto
        },
        env: if opts.clean_env {
            EnvPolicy::Clean
        } else {
            EnvPolicy::Preserve
        },
        hostname: opts.hostname,
        old_root: opts.old_root,
        init_timeout: opts.init_timeout,
    };

    match launcher::run(config) {
        Ok(code) => process::exit(code as i32),
        Err(e) => {
            eprintln!("nsroot: {:#}", e);
            process::exit(1);
        }
    }
}
