use anyhow::Context;
use clap::{ArgAction, Parser};
use netaudit::config::Settings;
use netaudit::error::ValidationError;
use netaudit::executor::Executor;
use netaudit::fleet::{self, Cohort, Pipeline};
use netaudit::remediate::{ApplyMode, DesiredSettings};
use netaudit::snapshot::FsStorage;
use netaudit::transport::{openssh, russh, Credentials};
use netaudit::{logger, targets};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "netaudit", version)]
#[command(about = "Audit the devices of a management network and fix their time settings.")]
struct Cli {
    /// User to log in as on every device
    #[arg(short, long)]
    user: String,

    /// Password for that user, also used as the enable secret
    #[arg(short, long)]
    password: String,

    /// Log in with the ssh agent and keys instead of the password
    #[arg(long)]
    key_auth: bool,

    /// Management network in CIDR notation, e.g. 10.0.0.0/24
    #[arg(short, long)]
    network: String,

    /// NTP server every device should synchronize with
    #[arg(long)]
    ntp_server: String,

    /// Settings file [default: ~/.config/netaudit/netaudit.yaml]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for configuration backups
    #[arg(long)]
    backup_dir: Option<PathBuf>,

    /// How many devices to audit at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Plan changes without sending them to devices
    #[arg(long)]
    dry_run: bool,

    /// Log more; repeat for even more
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Log less; repeat for even less
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "verbose")]
    quiet: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger::init(cli.verbose, cli.quiet)?;

    // Reject bad input before any device is contacted.
    let network = targets::parse_network(&cli.network)?;
    let ntp_server = targets::parse_address(&cli.ntp_server)?;

    let mut settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    if let Some(backup_dir) = cli.backup_dir {
        settings.backup_dir = backup_dir;
    }
    if let Some(concurrency) = cli.concurrency {
        settings.concurrency = concurrency;
    }
    if settings.concurrency == 0 {
        return Err(ValidationError::Zero("concurrency").into());
    }
    if settings.connect_timeout_secs == 0 {
        return Err(ValidationError::Zero("connect_timeout_secs").into());
    }

    if targets::is_wide(network) {
        warn!(%network, "network is wider than /{}, this will take a while", targets::WIDE_PREFIX);
    }
    let hosts = targets::usable_hosts(network);
    info!(%network, hosts = hosts.len(), backup_dir = %settings.backup_dir.display(), "starting");

    let mode = match cli.dry_run {
        true => ApplyMode::DryRun,
        false => ApplyMode::Apply,
    };
    let pipeline = Pipeline::new(
        Credentials::new(cli.user, cli.password),
        DesiredSettings::with_timezone(ntp_server, settings.timezone_line),
        FsStorage::new(settings.backup_dir),
    )
    .executor(Executor::new(settings.error_markers))
    .setup_commands(settings.setup_commands)
    .mode(mode)
    .concurrency(settings.concurrency);
    let pipeline = Arc::new(pipeline);
    let timeout = Duration::from_secs(settings.connect_timeout_secs);
    let cohort = Cohort::now();

    let report = if cli.key_auth {
        warn!("key authentication selected, the password is not used");
        let manager = openssh::ConnectionManager::new(timeout);
        fleet::run_fleet(pipeline, manager, hosts, &cohort).await
    } else {
        let manager = russh::ConnectionManager::new(timeout);
        fleet::run_fleet(pipeline, manager, hosts, &cohort).await
    };

    report
        .write_summary(io::stdout().lock())
        .context("failed to print summary")?;
    if report.is_empty() {
        warn!("no device was audited successfully");
    }
    Ok(())
}
