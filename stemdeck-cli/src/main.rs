//! # Stemdeck
//!
//! A headless command-line player for multitrack song stems.

use log::error;

mod cli;
mod controls;
mod logging;
mod runner;

const FAILURE_HISTORY_LINES: usize = 20;

fn main() {
    let args = cli::args::build_cli().get_matches();
    let quiet = args.get_flag("quiet");
    let history = logging::init(quiet);

    let code = match runner::run(&args) {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err);
            -1
        }
    };

    if quiet && code != 0 {
        let lines = logging::snapshot(&history);
        let start = lines.len().saturating_sub(FAILURE_HISTORY_LINES);
        for line in &lines[start..] {
            eprintln!("{}", line);
        }
    }

    std::process::exit(code)
}
