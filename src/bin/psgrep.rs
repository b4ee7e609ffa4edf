//! psgrep: print the pids under a proc directory whose command name
//! contains the given string.

use std::fs;
use std::path::PathBuf;

use clap::Parser;

use nsroot::pidscan;

#[derive(Parser, Debug)]
#[clap(version = "0.1.0", about = "Grep process names in a proc filesystem")]
struct Opts {
    /// A proc filesystem mount to scan
    proc_dir: PathBuf,
    /// Substring of the command name to look for
    name: String,
}

fn main() {
    let opts = Opts::parse();

    let mut found = Vec::new();
    for pid in pidscan::pids_in(&opts.proc_dir) {
        // Processes are allowed to disappear mid-scan.
        let comm = match fs::read_to_string(opts.proc_dir.join(pid.to_string()).join("comm")) {
            Ok(comm) => comm,
            Err(_) => continue,
        };
        if comm.contains(&opts.name) {
            found.push(pid.to_string());
        }
    }
    println!("{}", found.join(" "));
}
