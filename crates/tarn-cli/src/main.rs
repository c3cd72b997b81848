use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "tarn", about = "The Tarn programming language")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a .tarn file and dump the AST
    Parse {
        /// Path to the .tarn source file
        file: PathBuf,
    },
    /// Type-check a .tarn file
    Check {
        /// Path to the .tarn source file
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Parse { file } => cmd_parse(&file),
        Command::Check { file } => cmd_check(&file),
    }
}

fn read_source(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(source) => Some(source),
        Err(err) => {
            eprintln!("error: cannot read {}: {}", path.display(), err);
            None
        }
    }
}

fn cmd_parse(path: &Path) -> ExitCode {
    let Some(source) = read_source(path) else {
        return ExitCode::FAILURE;
    };
    let (file, errors) = tarn_parser::parse(&source);
    for error in &errors {
        eprintln!("parse error: {}", error);
    }
    print!("{}", tarn_ast::pretty_print(&file));
    if errors.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn cmd_check(path: &Path) -> ExitCode {
    let Some(source) = read_source(path) else {
        return ExitCode::FAILURE;
    };
    let (file, parse_errors) = tarn_parser::parse(&source);
    for error in &parse_errors {
        eprintln!("parse error: {}", error);
    }
    let result = tarn_typeck::check(&file);
    for diagnostic in &result.diagnostics {
        let span = diagnostic.span();
        eprintln!("type error [{}:{}]: {}", span.start, span.end, diagnostic);
    }
    if parse_errors.is_empty() && result.success() {
        println!("OK");
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
