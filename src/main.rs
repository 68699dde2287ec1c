mod arc;
mod ast;
mod codegen;
mod geometry;
mod kinematics;
mod lexer;
mod machine;
mod parser;
mod registry;

use ariadne::{Color, Label, Report, ReportKind, Source};
use clap::Parser as _;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Post-process a Siemens NX CLSF toolpath into Haas UMC-750 G-code
#[derive(clap::Parser, Debug)]
#[command(name = "umc-post", version, about)]
struct Cli {
    /// CLSF toolpath to read
    #[arg(short, long)]
    input: PathBuf,

    /// G-code file to write
    #[arg(short, long)]
    output: PathBuf,

    /// Machine profile JSON; the built-in UMC-750 profile is used if absent
    #[arg(short, long)]
    machine: Option<PathBuf>,
}

#[derive(thiserror::Error, Debug)]
enum Error {
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Profile(#[from] machine::ProfileError),

    #[error(transparent)]
    Translate(#[from] codegen::TranslateError),
}

fn init_logging() {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        // Already rendered against the source
        Err(Error::Translate(_)) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Error> {
    let profile = match &cli.machine {
        Some(path) => machine::MachineProfile::from_file(path)?,
        None => machine::MachineProfile::default(),
    };
    tracing::info!(machine = %profile.name, "machine profile");

    let source = fs::read_to_string(&cli.input).map_err(|source| Error::Io {
        path: cli.input.clone(),
        source,
    })?;

    // Nothing is written unless the whole file translates
    let gcode = codegen::translate_source(&source, &profile).map_err(|err| {
        report(&cli.input, &source, &err);
        err
    })?;

    fs::write(&cli.output, gcode.to_string()).map_err(|source| Error::Io {
        path: cli.output.clone(),
        source,
    })?;

    tracing::info!(output = %cli.output.display(), blocks = gcode.blocks(), "wrote G-code");
    Ok(())
}

/// Character range of 1-based `line`, without its line ending
fn line_span(source: &str, line: usize) -> Range<usize> {
    let mut start = 0;
    for (index, text) in source.split_inclusive('\n').enumerate() {
        let length = text.chars().count();
        if index + 1 == line {
            let trimmed = text.trim_end_matches(|c| c == '\n' || c == '\r');
            return start..start + trimmed.chars().count();
        }
        start += length;
    }
    start..start
}

fn report(path: &Path, source: &str, err: &codegen::TranslateError) {
    let name = path.display().to_string();
    let span = line_span(source, err.line());

    let printed = Report::build(ReportKind::Error, name.as_str(), span.start)
        .with_message(err.to_string())
        .with_label(
            Label::new((name.as_str(), span))
                .with_message(format!("line {}", err.line()))
                .with_color(Color::Red),
        )
        .finish()
        .eprint((name.as_str(), Source::from(source)));

    if printed.is_err() {
        eprintln!("error: {}", err);
    }
}
