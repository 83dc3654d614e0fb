//! Archive Sweep - exhaustive password recovery for encrypted archives
//!
//! Tries every candidate of the standard catalog against one archive and
//! prints the password that opens it.

use anyhow::Context;
use archive_sweep::{
    search::display_candidate, SweepConfig, SweepError, SweepReport, Sweeper,
};
use std::env;
use std::path::PathBuf;
use std::process;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize the library
    if let Err(e) = archive_sweep::init() {
        eprintln!("Failed to initialize: {}", e);
        process::exit(1);
    }
    archive_sweep::init_tracing();

    // Get command line arguments
    let args: Vec<String> = env::args().collect();

    // Check for help
    if args.len() > 1 && (args[1] == "--help" || args[1] == "-h") {
        print_help();
        return Ok(());
    }
    if args.len() > 1 && (args[1] == "--version" || args[1] == "-V") {
        println!("archive-sweep {}", archive_sweep::VERSION);
        return Ok(());
    }

    let (archive, resume) = match parse_args(&args[1..]) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Usage: archive-sweep <ARCHIVE> [RESUME]   (try --help)");
            process::exit(1);
        }
    };

    match run(archive, resume).await {
        Ok(SweepReport::Found { password, .. }) => {
            println!("{}", display_candidate(&password));
            // Don't wait on in-flight checks.
            process::exit(0);
        }
        Ok(SweepReport::NotFound { stats }) => {
            tracing::error!(
                checked = stats.checked,
                "Password not found: every combination was exhausted"
            );
            process::exit(1);
        }
        Err(e) => {
            let hint = e
                .downcast_ref::<SweepError>()
                .map(SweepError::user_message)
                .unwrap_or_else(|| format!("{:#}", e));
            tracing::error!(error = %format!("{:#}", e), "Sweep failed");
            eprintln!("Error: {}", hint);
            process::exit(1);
        }
    }
}

/// `<ARCHIVE> [RESUME]`
fn parse_args(args: &[String]) -> archive_sweep::Result<(PathBuf, Option<String>)> {
    match args {
        [] => Err(SweepError::cli("missing archive path")),
        [archive] => Ok((PathBuf::from(archive), None)),
        [archive, resume] => {
            if resume.is_empty() {
                return Err(SweepError::cli("resume candidate must not be empty"));
            }
            Ok((PathBuf::from(archive), Some(resume.clone())))
        }
        _ => Err(SweepError::cli(format!(
            "unexpected arguments: {}",
            args[2..].join(" ")
        ))),
    }
}

async fn run(archive: PathBuf, resume: Option<String>) -> anyhow::Result<SweepReport> {
    let config = SweepConfig::from_env().context("invalid configuration")?;
    if !archive.is_file() {
        return Err(SweepError::io("archive not found", Some(archive.display().to_string())).into());
    }

    let sweeper = Sweeper::new(config, &archive)?.with_resume(resume.map(String::into_bytes));
    let report = sweeper
        .run()
        .await
        .with_context(|| format!("sweep of {} failed", archive.display()))?;
    Ok(report)
}

fn print_help() {
    println!(
        "Archive Sweep {} - exhaustive password recovery for encrypted archives",
        archive_sweep::VERSION
    );
    println!();
    println!("USAGE:");
    println!("    archive-sweep <ARCHIVE> [RESUME]");
    println!();
    println!("ARGS:");
    println!("    <ARCHIVE>    Encrypted archive to open");
    println!("    [RESUME]     Skip every candidate before this one");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Print this help");
    println!("    -V, --version    Print the version");
    println!();
    println!("EXAMPLES:");
    println!("    archive-sweep secret.zip");
    println!("    archive-sweep secret.zip abc123      # continue from a logged candidate");
    println!();
    println!("ENVIRONMENT VARIABLES:");
    println!("    ARCHIVE_SWEEP_WORKERS         Concurrent checkers (default: 4 x CPUs, max 500)");
    println!("    ARCHIVE_SWEEP_QUEUE           Candidate queue capacity (default: workers)");
    println!("    ARCHIVE_SWEEP_BACKOFF_MS      Retry delay when out of resources (default: 100)");
    println!("    ARCHIVE_SWEEP_MAX_RETRIES     Give up after N retries (default: never)");
    println!("    ARCHIVE_SWEEP_PROGRESS_EVERY  Log progress every N candidates (default: 1000000)");
    println!("    ARCHIVE_SWEEP_METHOD          zip (in-process) or 7z (default: zip)");
    println!("    ARCHIVE_SWEEP_7Z              7z binary (default: 7z)");
    println!("    ARCHIVE_SWEEP_STATE           Checkpoint file for resume");
    println!("    ARCHIVE_SWEEP_SAVE_EVERY      Checkpoint every N candidates (default: 100000)");
    println!("    ARCHIVE_SWEEP_LOG             Log filter, overrides RUST_LOG (default: info)");
    println!();
    println!("On success the password is printed on stdout and the exit code is 0.");
}
