use clap::Parser;
use filetidy::cli::{Cli, run};
use filetidy::logging::init_logger;
use filetidy::output::OutputFormatter;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Held until exit so the log file is flushed.
    let _log_guard = match init_logger(cli.verbose, cli.log.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            OutputFormatter::error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            OutputFormatter::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
