use std::process::ExitCode;

use clap::Parser;
use leadboard_client::cli::Cli;
use leadboard_client::{log_bridge, Dashboard};
use leadboard_core::search::FilterState;

/// Loads the board, optionally runs a search, and prints one line per column.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = log_bridge::init() {
        log_bridge::write_fallback_line(&format!("failed to initialize logger: {}", e));
    }

    let dashboard = match Dashboard::open(&cli.config_path()) {
        Ok(dashboard) => dashboard,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = dashboard.load().await {
        eprintln!("Failed to load board: {}", e);
        return ExitCode::FAILURE;
    }

    let mut presentation = dashboard.search.subscribe();
    if let Some(search) = cli.search_text() {
        dashboard.search.submit(FilterState {
            search,
            ..Default::default()
        });
        // Local results are already in; wait for the server's answer.
        let _ = presentation.wait_for(|p| !p.searching).await;
    }

    let shown = dashboard.search.presentation();
    for column in &shown.board.columns {
        println!("{:<24} {:>4}", column.name, column.leads.len());
    }
    ExitCode::SUCCESS
}
