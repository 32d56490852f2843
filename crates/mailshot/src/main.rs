//! # mailshot
//!
//! Sends a paced email or SMS campaign to every valid row of a CSV file or
//! Excel workbook.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod input;
mod progress;
mod settings;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use mailshot_airmore::AirmoreTransport;
use mailshot_core::credentials::{delete_secret, store_secret};
use mailshot_core::{Credentials, DispatchEngine, SendReport, UniformPacing, Validated, validate};
use mailshot_smtp::SmtpTransport;
use secrecy::SecretString;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::input::SheetRef;
use crate::progress::Progress;
use crate::settings::{CampaignSettings, TransportSettings};

/// Paced bulk email and SMS sender
#[derive(Parser, Debug)]
#[command(name = "mailshot")]
#[command(about = "Send a paced email or SMS campaign to a recipient list", long_about = None)]
#[command(version)]
struct Cli {
    /// Campaign settings file (defaults to <config dir>/mailshot/campaign.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a recipient list without sending anything
    Validate {
        /// CSV file or Excel workbook with one recipient per row
        list: PathBuf,

        /// Worksheet name or 0-based index (workbooks only)
        #[arg(long)]
        sheet: Option<SheetRef>,
    },

    /// Send the campaign to every valid recipient
    Send {
        /// CSV file or Excel workbook with one recipient per row
        list: PathBuf,

        /// Worksheet name or 0-based index (workbooks only)
        #[arg(long)]
        sheet: Option<SheetRef>,

        /// Seed for the pacing delays
        #[arg(long)]
        seed: Option<u64>,

        /// Skip rows whose identifier already appeared earlier in the list
        #[arg(long)]
        dedup: bool,
    },

    /// Manage secrets stored in the OS keyring
    Credentials {
        #[command(subcommand)]
        action: CredentialAction,
    },
}

#[derive(Subcommand, Debug)]
enum CredentialAction {
    /// Store a secret read from stdin
    Store {
        /// Sender identity the secret belongs to
        identity: String,
    },
    /// Remove a stored secret
    Delete {
        /// Sender identity the secret belongs to
        identity: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mailshot=info,mailshot_core=warn,mailshot_smtp=warn,mailshot_airmore=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.config.unwrap_or_else(CampaignSettings::default_path);

    match cli.command {
        Commands::Validate { list, sheet } => {
            let settings = CampaignSettings::load(&config).await?;
            let validated = load_recipients(&settings, &list, sheet.as_ref())?;
            let mut stdout = io::stdout().lock();
            for recipient in &validated.recipients {
                writeln!(stdout, "Row {}: {recipient}", recipient.source_row())?;
            }
            writeln!(
                stdout,
                "\n{} valid recipients, {} rows skipped",
                validated.recipients.len(),
                validated.skips.len()
            )?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Send {
            list,
            sheet,
            seed,
            dedup,
        } => {
            let settings = CampaignSettings::load(&config).await?;
            let validated = load_recipients(&settings, &list, sheet.as_ref())?;
            let report = run_campaign(&settings, validated, seed, dedup).await?;
            Ok(if report.as_ref().is_some_and(SendReport::was_aborted) {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Commands::Credentials { action } => {
            match action {
                CredentialAction::Store { identity } => {
                    let secret = read_secret(&identity)?;
                    store_secret(&identity, &secret)?;
                    println!("Stored secret for {identity}");
                }
                CredentialAction::Delete { identity } => {
                    delete_secret(&identity)?;
                    println!("Deleted secret for {identity}");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Reads and validates the recipient list, printing rejected rows.
fn load_recipients(
    settings: &CampaignSettings,
    list: &Path,
    sheet: Option<&SheetRef>,
) -> anyhow::Result<Validated> {
    let rows = input::read_rows(list, sheet)?;
    let validated = validate(&rows, &settings.validation_config()?);
    Progress::new(io::stdout().lock()).skips(&validated.skips)?;
    Ok(validated)
}

/// Sends to every validated recipient, or returns `None` without touching
/// credentials or the transport when there is nobody to send to.
async fn run_campaign(
    settings: &CampaignSettings,
    validated: Validated,
    seed: Option<u64>,
    dedup: bool,
) -> anyhow::Result<Option<SendReport>> {
    if validated.is_empty() {
        println!("No valid recipients to send to.");
        return Ok(None);
    }
    send(settings, validated, seed, dedup).await.map(Some)
}

async fn send(
    settings: &CampaignSettings,
    validated: Validated,
    seed: Option<u64>,
    dedup: bool,
) -> anyhow::Result<SendReport> {
    let message = settings.message()?;
    let range = settings.delay_range();
    let mut pacing = match seed {
        Some(seed) => UniformPacing::seeded(range, seed),
        None => UniformPacing::new(range),
    };
    let mut engine = DispatchEngine::new()
        .skip_duplicates(settings.skip_duplicates || dedup)
        .with_observer(progress::stdout_observer());

    tracing::info!(
        recipients = validated.recipients.len(),
        parts = message.parts(),
        delay = %range,
        "Starting campaign"
    );

    let report = match &settings.transport {
        TransportSettings::Smtp(smtp) => {
            let credentials =
                Credentials::resolve(settings.smtp_identity()?, &settings.secret_env)?;
            let mut transport = SmtpTransport::new(smtp.clone());
            engine
                .run(validated, &message, &mut transport, &mut pacing, &credentials)
                .await
        }
        TransportSettings::Airmore(airmore) => {
            let credentials = Credentials::new(airmore.ip.clone(), String::new());
            let mut transport = AirmoreTransport::from_settings(airmore)
                .context("Invalid Airmore settings")?;
            engine
                .run(validated, &message, &mut transport, &mut pacing, &credentials)
                .await
        }
    };
    Ok(report)
}

fn read_secret(identity: &str) -> anyhow::Result<SecretString> {
    eprint!("Secret for {identity}: ");
    io::stderr().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let secret = line.trim_end_matches(['\r', '\n']);
    if secret.is_empty() {
        bail!("No secret given on stdin");
    }
    Ok(SecretString::from(secret.to_string()))
}
