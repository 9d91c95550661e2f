pub mod app;
pub mod capture;
pub mod cli;
pub mod compose;
pub mod config;
pub mod error;
pub mod logging;
pub mod navigation;
pub mod notification;
pub mod records;
pub mod state;
pub mod storage;
mod worker;
pub use error::{AppError, AppResult};

/// Entrypoint used by the `fishtrack` binary.
pub fn run() -> AppResult<()> {
    logging::init();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = cli::parse_args(&args)?;
    tracing::info!(?command, "starting FishTrack");

    let config = config::load_app_config();
    let mut app = app::App::from_config(config)?;
    cli::execute(&mut app, command)?;

    tracing::info!(route = app.route().path(), "finished");
    Ok(())
}
