//! Block Miner - Main Application
//!
//! Mines a nonce for one block (or verifies a given one) and prints it.

use block_miner::{
    config::Config,
    logging,
    transactions::source_from_config,
    utils::abbreviate_hex,
    verify, Error, Miner, Result, APP_NAME, APP_VERSION,
};

use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// What the run printed on stdout
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Mined,
    Verified(bool),
    PrintedConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load and validate configuration
    let config = match Config::load().await {
        Ok(config) => config,
        Err(e) => return report(&e),
    };

    // Dropped at the end of main, after the last log line is queued
    let _log_guard = match logging::init(config.log_level, config.log_format, config.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => return report(&e),
    };

    match run(config).await {
        Ok(Outcome::Verified(false)) => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(category = e.category(), "{}", e);
            report(&e)
        }
    }
}

async fn run(config: Config) -> Result<Outcome> {
    if config.print_config {
        print_configuration(&config)?;
        return Ok(Outcome::PrintedConfig);
    }

    info!("Starting {} v{}", APP_NAME, APP_VERSION);

    let difficulty = config.difficulty()?;
    let predecessor_hash = config.prev_hash_bytes()?;
    let transactions = source_from_config(&config).await?.transactions()?;

    info!(
        "Block: predecessor {}, {} transactions, difficulty {}",
        abbreviate_hex(&predecessor_hash, 4),
        transactions.len(),
        difficulty
    );

    if let Some(nonce) = config.verify_nonce()? {
        let valid = verify(difficulty, &predecessor_hash, &transactions, &nonce.to_bytes());
        println!("{}", if valid { "valid" } else { "invalid" });
        return Ok(Outcome::Verified(valid));
    }

    let miner = Miner::from_config(&config)?;
    let cancellation = CancellationToken::new();
    spawn_interrupt_handler(cancellation.clone());

    let solution = run_blocking(move || {
        miner.mine_with_cancel(difficulty, &predecessor_hash, &transactions, &cancellation)
    })
    .await?;

    info!(
        "Mined nonce {} (digest {}, {} hashes, {})",
        solution.nonce,
        solution.digest_hex(),
        solution.hashes,
        solution.hash_rate()
    );
    println!("{}", solution.nonce);

    Ok(Outcome::Mined)
}

/// Run a search on the blocking pool
///
/// A panic in the search is re-raised on the caller rather than reported as
/// an ordinary error.
async fn run_blocking<T, F>(search: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(search).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(Error::cancelled(format!("mining task: {}", e))),
    }
}

/// Cancel the search on Ctrl-C
fn spawn_interrupt_handler(cancellation: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, stopping search");
                cancellation.cancel();
            }
            Err(e) => warn!("Unable to listen for interrupts: {}", e),
        }
    });
}

/// Print current configuration
fn print_configuration(config: &Config) -> Result<()> {
    let config_yaml = serde_yaml::to_string(config)?;
    println!("{}", config_yaml);
    Ok(())
}

/// Print the error and map it to a process exit code
fn report(error: &Error) -> ExitCode {
    eprintln!("Error: {}", error);
    ExitCode::from(u8::try_from(error.exit_code()).unwrap_or(1))
}
