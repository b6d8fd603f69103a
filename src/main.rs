use clap::{App, Arg};
use lc3vm::{Config, RunError, Stop};
use std::process;

fn main() {
    env_logger::init();

    let matches = App::new("LC-3 VM")
        .arg(
            Arg::with_name("PROGRAMS")
                .help("LC-3 object files to load, in order")
                .multiple(true)
                .index(1),
        )
        .get_matches();

    // clap's own `required(true)` exits with code 1 on a missing argument;
    // the usage-line/exit-2 contract is ours to enforce, so PROGRAMS is left
    // optional here and checked by hand.
    let paths = match matches.values_of("PROGRAMS") {
        Some(values) => values.map(String::from).collect(),
        None => {
            eprintln!("usage: lc3vm PROGRAM [PROGRAM...]");
            process::exit(2);
        }
    };

    let config = Config { paths };

    match lc3vm::run(config) {
        Ok(Stop::Halted) => process::exit(0),
        Ok(Stop::Interrupted) => {
            println!();
            process::exit(130);
        }
        Err(RunError::Load(e)) => {
            eprintln!("failed to load program: {}", e);
            process::exit(1);
        }
        Err(RunError::Terminal(e)) => {
            eprintln!("failed to prepare terminal: {}", e);
            process::exit(1);
        }
        Err(RunError::Fault(fault)) => {
            eprintln!("guest program faulted at {:#06x}: {}", fault.pc(), fault);
            process::exit(1);
        }
    }
}
