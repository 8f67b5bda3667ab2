mod commands;
mod logging;
mod opts;

use clap::Parser;
use gd_browser::Browser;
use opts::Opts;
use std::process::ExitCode;

fn main() -> ExitCode {
    let opts = Opts::parse();
    logging::log_init(opts.verbose);

    let browser = match Browser::with_config(opts.browser_config()) {
        Ok(browser) => browser,
        Err(error) => {
            eprintln!("gemdust-certs startup error: {error}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(error) = browser.boot() {
        eprintln!("gemdust-certs startup error: {error}");
        return ExitCode::FAILURE;
    }

    let mut out = std::io::stdout().lock();
    match commands::run(&browser, opts.subcmd, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::debug!(%error, "command failed");
            eprintln!("gemdust-certs: {}", error.user_message());
            ExitCode::FAILURE
        }
    }
}
