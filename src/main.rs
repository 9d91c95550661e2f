use anyhow::Context;
use fishtrack::AppError;

fn main() -> anyhow::Result<()> {
    match fishtrack::run() {
        Err(err @ AppError::UnknownCommand(_)) => {
            eprintln!("{err}");
            eprintln!("{}", fishtrack::cli::USAGE);
            std::process::exit(2);
        }
        other => other.context("fishtrack failed"),
    }
}
