//! `renamer` - batch file renamer with previews, transactional apply and undo.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use renamer::cancel::CancelToken;
use renamer::cli::Cli;
use renamer::exit_codes::exit;

fn init_logging(verbose: bool) {
    let default = if verbose { "renamer=debug" } else { "renamer=warn" };
    let filter = EnvFilter::try_from_env("RENAMER_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        eprintln!("\nReceived SIGINT, stopping...");
        handler_token.cancel();
    }) {
        tracing::warn!(error = %err, "failed to install Ctrl-C handler");
    }

    let exit_code = match renamer::engine::run(cli, &cancel) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit::OPERATIONAL_FAILURE
        }
    };
    std::process::exit(exit_code);
}
