use std::fs::File;
use std::path::Path;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::Parser;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use counters_tv::cli::Args;
use counters_tv::client::{HttpCountersApi, resolve_roles};
use counters_tv::controller::Controller;
use counters_tv::domain::{CTVConfig, CTVError};
use counters_tv::model::{CountersTable, Status};
use counters_tv::ui::TableUI;

#[tokio::main]
async fn main() -> ExitCode {
    let result = match Args::parse().into_config() {
        Ok(config) => run(config).await,
        Err(e) => Err(e),
    };
    ratatui::restore();
    match result {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn init_tracing(path: &Path) -> Result<(), CTVError> {
    let file = File::create(path)?;
    let filter = EnvFilter::try_from_env("CTV_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

async fn run(config: CTVConfig) -> Result<(), CTVError> {
    init_tracing(&config.log_file)?;
    info!("Starting ctv against {}", config.base_url);

    let api = Arc::new(HttpCountersApi::new(&config)?);
    let roles = resolve_roles(api.as_ref(), config.privileged).await;

    let mut table = CountersTable::new(api, roles, &config);
    table.init();

    let controller = Controller::new(&config);
    let mut ui = TableUI::new();
    let mut terminal = ratatui::init();

    let size = terminal.size()?;
    let (width, height) = TableUI::table_area(size.width, size.height);
    table.reset_table_size(width, height);
    table.load_counters_table();

    while table.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&table, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&table)?;
        table.update(message)?;
    }

    info!("Bye");
    Ok(())
}
