//! mailsplit - move correspondence with chosen people from one Gmail
//! account to another

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use log::{error, info, warn};
use std::path::PathBuf;

use mail::{
    AccountMismatchError, GmailAuth, GmailClient, GmailCredentials, Interrupt, MigrationOptions,
    Migrator, RemoteExecutor, RunStats, Settings, clear_all_credentials,
    verify_account,
};

#[derive(Parser)]
#[command(name = "mailsplit")]
#[command(about = "Move mail exchanged with chosen correspondents between Gmail accounts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Copy matching messages to the destination and trash them at the source
    Run(RunArgs),

    /// Delete all stored account tokens
    ClearCredentials,
}

#[derive(Args)]
struct RunArgs {
    /// Addresses whose correspondence should be moved
    #[arg(long, required = true, num_args = 1..)]
    correspondents: Vec<String>,

    /// Account to move messages out of
    #[arg(long)]
    source: String,

    /// Account to move messages into
    #[arg(long)]
    destination: String,

    /// Log what would happen without changing either account
    #[arg(long)]
    dry_run: bool,

    /// Insert every message without looking for copies at the destination
    #[arg(long)]
    skip_deduplicate: bool,

    /// Stop after this many messages
    #[arg(long)]
    limit: Option<usize>,

    /// SimHash distance below which multipart messages count as duplicates
    #[arg(long)]
    duplicate_threshold: Option<u32>,

    /// Retries after a failed remote call
    #[arg(long)]
    retries: Option<u32>,

    /// Seconds to wait between retries
    #[arg(long)]
    retry_delay: Option<u64>,

    /// OAuth client credentials file (Google Cloud Console format)
    #[arg(long)]
    credentials: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let cli = Cli::parse();
    match cli.cmd {
        Command::Run(args) => run(args),
        Command::ClearCredentials => {
            if clear_all_credentials()? {
                info!("Stored credentials cleared");
            } else {
                info!("No stored credentials to clear");
            }
            Ok(())
        }
    }
}

fn run(args: RunArgs) -> Result<()> {
    if args.source.eq_ignore_ascii_case(&args.destination) {
        bail!("Source and destination must be different accounts");
    }

    let mut settings = Settings::load()?;
    if let Some(retries) = args.retries {
        settings.max_retries = retries;
    }
    if let Some(delay) = args.retry_delay {
        settings.retry_delay_secs = delay;
    }
    if let Some(threshold) = args.duplicate_threshold {
        settings.duplicate_threshold = threshold;
    }

    let credentials = GmailCredentials::load_from(args.credentials.as_deref())?;

    let interrupt = Interrupt::new();
    let handler_interrupt = interrupt.clone();
    ctrlc::set_handler(move || {
        warn!("Interrupt received, stopping after the current message");
        handler_interrupt.trigger();
    })?;

    let executor = RemoteExecutor::new(settings.retry_policy()).with_interrupt(interrupt);
    let source = connect(&credentials, &args.source, &executor)?;
    let destination = connect(&credentials, &args.destination, &executor)?;

    let mut options = MigrationOptions::with_settings(args.correspondents, &settings);
    options.dry_run = args.dry_run;
    options.skip_deduplicate = args.skip_deduplicate;
    options.limit = args.limit;

    let policy = executor.policy();
    info!(
        "Retrying failed calls up to {} time(s), {}s apart",
        policy.max_retries,
        policy.delay.as_secs()
    );
    let dry_run = options.dry_run;
    let stats = Migrator::new(&source, &destination, executor, options).run()?;
    report(&stats, dry_run);
    Ok(())
}

/// Authorize `email` and make sure the token really belongs to it
///
/// A token for the wrong account is discarded so the next run asks again.
fn connect(
    credentials: &GmailCredentials,
    email: &str,
    executor: &RemoteExecutor,
) -> Result<GmailClient> {
    let client = GmailClient::new(GmailAuth::new(credentials, email)?);
    client.authenticate()?;

    match executor.execute("Get profile", || verify_account(&client, email)) {
        Ok(_) => Ok(client),
        Err(e) => {
            if e.is::<AccountMismatchError>() {
                client.logout()?;
                error!(
                    "Signed in with the wrong account for {}; its stored token was cleared",
                    email
                );
            }
            Err(e)
        }
    }
}

fn report(stats: &RunStats, dry_run: bool) {
    if dry_run {
        println!(
            "Dry run: would insert {}, would trash {}  Duplicates: {}  Unavailable: {}",
            stats.simulated_inserted, stats.simulated_trashed, stats.duplicates, stats.unavailable
        );
    } else {
        println!(
            "Inserted: {}  Trashed: {}  Duplicates: {}  Unavailable: {}",
            stats.inserted, stats.trashed, stats.duplicates, stats.unavailable
        );
    }
}
