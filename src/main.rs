use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use treelox::error::LoxError;
use treelox::output::ConsoleOutput;
use treelox::scanner::Scanner;
use treelox::Session;

/// Exit code for errors found before execution (lexing, parsing, resolving).
const EXIT_STATIC: i32 = 65;

/// Exit code for runtime errors.
const EXIT_RUNTIME: i32 = 70;

#[derive(ClapParser, Debug)]
#[command(version, about = "Tree-walking Lox interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to treelox.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Print the tokens as a JSON array instead
        #[arg(long)]
        json: bool,
    },

    /// Runs a file as a program
    Run { filename: PathBuf },

    /// Reads programs line by line from stdin, sharing globals between lines
    Repl,
}

/// Map the file and check it is UTF-8.
fn read_source(filename: &Path) -> Result<String> {
    info!("Reading file: {:?}", filename);

    let file = File::open(filename).with_context(|| format!("Failed to open file {:?}", filename))?;

    // An empty file cannot be mapped on every platform.
    if file.metadata()?.len() == 0 {
        return Ok(String::new());
    }

    // SAFETY: the map is read once, copied into an owned String, and dropped.
    // Concurrent truncation by another process is the only hazard, as with
    // any mmap-backed read.
    let map = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to map file {:?}", filename))?;

    let text = std::str::from_utf8(&map)
        .map_err(LoxError::from)
        .with_context(|| format!("File {:?} is not valid UTF-8", filename))?;

    info!("Read {} bytes from {:?}", text.len(), filename);
    Ok(text.to_owned())
}

fn init_logger() -> Result<()> {
    let log_file = File::create("treelox.log").context("Failed to create treelox.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record.module_path().unwrap_or("<unnamed>");
            let module = module.strip_prefix("treelox::").unwrap_or(module);
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized, writing to treelox.log");
    Ok(())
}

fn tokenize(filename: &Path, json: bool) -> Result<i32> {
    let source = read_source(filename)?;
    let (tokens, errors) = Scanner::new(&source).scan_all();

    for e in &errors {
        eprintln!("{}", e);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&tokens)?);
    } else {
        for token in &tokens {
            println!("{}", token);
        }
    }

    Ok(if errors.is_empty() { 0 } else { EXIT_STATIC })
}

fn run(filename: &Path) -> Result<i32> {
    let source = read_source(filename)?;
    let mut output = ConsoleOutput;

    match Session::new().run(&source, &mut output) {
        Ok(()) => {
            info!("Program executed successfully");
            Ok(0)
        }
        Err(e) if e.is_static() => Ok(EXIT_STATIC),
        Err(LoxError::Runtime(_)) => Ok(EXIT_RUNTIME),
        Err(e) => Err(e.into()),
    }
}

fn repl() -> Result<i32> {
    let mut session = Session::new();
    let mut output = ConsoleOutput;
    let stdin = io::stdin();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        // Errors were already reported through the console output.
        if let Err(e) = session.run(&line, &mut output) {
            debug!("Line failed: {}", e);
        }
    }

    Ok(0)
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        Builder::new().filter_level(log::LevelFilter::Off).init();
    }

    info!("CLI arguments: {:?}", args);

    let code = match &args.commands {
        Commands::Tokenize { filename, json } => tokenize(filename, *json)?,
        Commands::Run { filename } => run(filename)?,
        Commands::Repl => repl()?,
    };

    if code != 0 {
        debug!("Exiting with code {}", code);
        std::process::exit(code);
    }

    Ok(())
}
