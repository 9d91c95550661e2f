use std::path::PathBuf;

use crate::app::{App, HomeView, RecordsView, NO_RECORDS_MESSAGE};
use crate::error::{AppError, AppResult};
use crate::navigation::Route;
use crate::records::CatchRecord;

pub const USAGE: &str = "usage:
  fishtrack                         show the latest catch
  fishtrack capture [location]      capture a still from the camera and save it
  fishtrack upload <path> [location] identify an image file and save it
  fishtrack records [query]         list saved catches
  fishtrack latest                  print the latest catch as JSON";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Home,
    Capture { location: Option<String> },
    Upload { path: PathBuf, location: Option<String> },
    Records { query: String },
    Latest,
}

pub fn parse_args(args: &[String]) -> AppResult<Command> {
    let mut args = args.iter().map(String::as_str);
    let command = match args.next() {
        None => Command::Home,
        Some("capture") => Command::Capture {
            location: args.next().map(str::to_string),
        },
        Some("upload") => {
            let path = args
                .next()
                .ok_or_else(|| AppError::UnknownCommand("upload needs an image path".into()))?;
            Command::Upload {
                path: PathBuf::from(path),
                location: args.next().map(str::to_string),
            }
        }
        Some("records") => Command::Records {
            query: args.by_ref().collect::<Vec<_>>().join(" "),
        },
        Some("latest") => Command::Latest,
        Some(other) => return Err(AppError::UnknownCommand(other.to_string())),
    };
    if matches!(command, Command::Capture { .. } | Command::Upload { .. } | Command::Latest)
        && args.next().is_some()
    {
        return Err(AppError::UnknownCommand("too many arguments".into()));
    }
    Ok(command)
}

pub fn execute(app: &mut App, command: Command) -> AppResult<()> {
    app.navigate(Route::Home)?;
    match command {
        Command::Home => println!("{}", render_home(&app.home_view())),
        Command::Capture { location } => {
            app.navigate(Route::Camera)?;
            if let Some(session) = app.camera_mut() {
                session.start_session()?;
                session.capture_still()?;
            }
            let record = analyze_and_save(app, location.as_deref())?;
            println!("{}", render_record(&record));
        }
        Command::Upload { path, location } => {
            app.navigate(Route::Camera)?;
            app.upload_image(&path)?;
            let record = analyze_and_save(app, location.as_deref())?;
            println!("{}", render_record(&record));
        }
        Command::Records { query } => {
            app.navigate(Route::Records)?;
            println!("{}", render_records(&app.records_view(&query)));
        }
        Command::Latest => match app.records().latest_record() {
            Some(record) => match serde_json::to_string_pretty(&record) {
                Ok(json) => println!("{json}"),
                Err(err) => return Err(crate::records::RecordError::Encode(err).into()),
            },
            None => println!("{}", crate::app::NO_SCANS_MESSAGE),
        },
    }
    Ok(())
}

fn analyze_and_save(app: &mut App, location: Option<&str>) -> AppResult<CatchRecord> {
    app.analyze()?;
    if let Some(view) = app.result_view() {
        tracing::info!(
            species = %view.species,
            confidence = view.confidence,
            "analysed catch"
        );
    }
    app.save_result(location)
}

pub fn render_record(record: &CatchRecord) -> String {
    format!(
        "{}\t{}\t{}\t{} {}\t{}\t{}",
        record.id,
        record.species,
        record.weight,
        record.date,
        record.time,
        record.location,
        record.freshness
    )
}

pub fn render_home(view: &HomeView) -> String {
    format!("{}\ntotal scans: {}", view.summary_line(), view.total_scans)
}

pub fn render_records(view: &RecordsView) -> String {
    if view.is_empty() {
        return NO_RECORDS_MESSAGE.to_string();
    }
    let mut lines = vec![view.summary()];
    lines.extend(view.records.iter().map(render_record));
    lines.join("\n")
}
