mod cli;

use crate::cli::Cli;
use anyhow::Result;
use clap::Parser;
use imgbatch::{
    BatchConfig, BatchResult, BatchRunner, CancelToken, Operation, OperationRegistry, SuperResolutionEngine,
};
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .init();

    let config = cli.batch_config();
    config.validate()?;

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || cancel.cancel())?;
    }

    let registry = OperationRegistry::new();
    let mut engine = SuperResolutionEngine::from_config(&config.model);

    println!("Image Processing Tool v{}", env!("CARGO_PKG_VERSION"));
    println!("Batch image processing with AI enhancement\n");
    print_help(&registry);

    let stdin = io::stdin();
    loop {
        let line = match prompt(&stdin, "Enter command")? {
            Some(line) => line,
            None => break,
        };

        let parts: Vec<&str> = line.split_whitespace().collect();
        let (name, args) = match parts.split_first() {
            Some(split) => split,
            None => continue,
        };

        match name.to_ascii_lowercase().as_str() {
            "exit" => {
                println!("Goodbye!");
                break;
            }
            "help" => print_help(&registry),
            _ => {
                let operation = match registry.resolve(name, args) {
                    Ok(operation) => operation,
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        eprintln!("Use 'help' to see available commands.");
                        continue;
                    }
                };

                let directory = match &cli.directory {
                    Some(directory) => directory.clone(),
                    None => match prompt(&stdin, "Enter images directory path")? {
                        Some(path) => PathBuf::from(path),
                        None => break,
                    },
                };

                cancel.reset();
                run_batch(&config, &mut engine, &cancel, &directory, operation);
            }
        }
    }

    engine.teardown();
    Ok(())
}

/// `None` on end of input.
fn prompt(stdin: &io::Stdin, label: &str) -> Result<Option<String>> {
    print!("\n{}: ", label);
    io::stdout().flush()?;

    let mut line = String::new();
    if stdin.lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn run_batch(
    config: &BatchConfig,
    engine: &mut SuperResolutionEngine,
    cancel: &CancelToken,
    directory: &Path,
    operation: Operation,
) {
    let mut runner = BatchRunner::new(config.clone(), engine, cancel.clone());
    let job = match runner.prepare(directory, operation) {
        Ok(job) => job,
        Err(e) => {
            eprintln!("Error: {}", e);
            return;
        }
    };

    let pb = create_progress_bar(job.files().len());
    let result = runner.run(job, |done, _total| pb.set_position(done as u64));
    pb.finish_and_clear();

    print_summary(operation, &result);
}

fn create_progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

fn print_summary(operation: Operation, result: &BatchResult) {
    for outcome in result.failures() {
        eprintln!(
            "Error processing {}: {}",
            outcome.path.display(),
            outcome.detail.as_deref().unwrap_or("unknown error")
        );
    }

    if result.interrupted {
        println!(
            "Operation cancelled by user after {} of {} images. Use 'exit' to quit.",
            result.processed(),
            result.scanned
        );
    }

    println!(
        "{} complete: {} succeeded, {} skipped, {} failed",
        operation.name(),
        result.succeeded,
        result.skipped,
        result.failed
    );
}

fn print_help(registry: &OperationRegistry) {
    println!("Available commands:");
    for spec in registry.specs() {
        println!("  {:<28} {}", spec.usage(), spec.description);
    }
    println!("  {:<28} {}", "help", "Show this help message");
    println!("  {:<28} {}", "exit", "Exit the program");
}
