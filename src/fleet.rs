//! Drives the audit pipeline across every host of a management network.
//!
//! Each host goes through the same strictly sequential stages:
//!
//! 1. [Stage::Connecting]: open a session and prepare it with the setup commands.
//! 2. [Stage::Identifying]: read `show version`; all identity facts must be present.
//! 3. [Stage::Snapshotting]: capture and archive the running configuration.
//! 4. [Stage::ProbingServices]: read CDP and NTP status. Never fatal.
//! 5. [Stage::Planning]: work out missing time settings and apply them.
//! 6. [Stage::Reporting]: format the host's summary line.
//!
//! A failure at any stage skips the rest of that host's pipeline, logs the host and stage, and
//! leaves every other host untouched. The session is closed whichever way the pipeline ends.

use crate::error::HostError;
use crate::executor::{CommandResult, Executor};
use crate::extract::{
    CdpStatus, DeviceFacts, NtpStatus, SHOW_CDP_NEIGHBORS, SHOW_NTP_STATUS, SHOW_VERSION,
};
use crate::remediate::{self, ApplyMode, DesiredSettings, RemediationPlan};
use crate::report::{self, FleetReport};
use crate::snapshot::{Snapshotter, Storage};
use crate::transport::{Credentials, ManageSession, Session};
use chrono::{DateTime, Local};
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Layout of the cohort timestamp embedded in backup names.
pub const COHORT_FORMAT: &str = "%Y_%m_%d_%H_%M_%S";

/// The point in time shared by every backup taken during one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cohort(String);

impl Cohort {
    /// Stamps a cohort with the current local time.
    pub fn now() -> Self {
        Self::at(Local::now())
    }

    pub fn at(time: DateTime<Local>) -> Self {
        Cohort(time.format(COHORT_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Cohort {
    fn from(value: &str) -> Self {
        Cohort(value.to_owned())
    }
}

impl fmt::Display for Cohort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The stages of a host's pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Connecting,
    Identifying,
    Snapshotting,
    ProbingServices,
    Planning,
    Reporting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Connecting => "connecting",
            Stage::Identifying => "identifying",
            Stage::Snapshotting => "snapshotting",
            Stage::ProbingServices => "probing services",
            Stage::Planning => "planning",
            Stage::Reporting => "reporting",
        };
        f.write_str(name)
    }
}

/// Everything learned about a host that made it through the pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditedHost {
    pub facts: DeviceFacts,
    pub cdp: CdpStatus,
    pub ntp: NtpStatus,
    pub plan: RemediationPlan,
    pub backup_key: String,
    pub backup_stored: bool,
    pub line: String,
}

/// How a host's pipeline ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostOutcome {
    Done(AuditedHost),
    Skipped { stage: Stage, error: HostError },
}

/// The per-host pipeline and the settings it runs with.
#[derive(Debug)]
pub struct Pipeline<St> {
    credentials: Credentials,
    executor: Executor,
    snapshotter: Snapshotter<St>,
    desired: DesiredSettings,
    setup_commands: Vec<String>,
    mode: ApplyMode,
    concurrency: usize,
}

impl<St: Storage> Pipeline<St> {
    /// Creates a pipeline with the default executor, no setup commands, and a concurrency of 1.
    pub fn new(credentials: Credentials, desired: DesiredSettings, storage: St) -> Self {
        Pipeline {
            credentials,
            executor: Executor::default(),
            snapshotter: Snapshotter::new(storage),
            desired,
            setup_commands: Vec::new(),
            mode: ApplyMode::Apply,
            concurrency: 1,
        }
    }

    pub fn executor(mut self, executor: Executor) -> Self {
        self.executor = executor;
        self
    }

    pub fn setup_commands(mut self, commands: Vec<String>) -> Self {
        self.setup_commands = commands;
        self
    }

    pub fn mode(mut self, mode: ApplyMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets how many hosts may be audited at once. Values below 1 are raised to 1.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Runs the whole pipeline for one host.
    pub async fn run_host<M, S>(
        &self,
        manager: &mut M,
        host: Ipv4Addr,
        cohort: &Cohort,
    ) -> HostOutcome
    where
        M: ManageSession<S>,
        S: Session,
    {
        info!(%host, "connecting");
        let mut session = match manager.connect(host, &self.credentials).await {
            Ok(session) => session,
            Err(error) => return skip(host, Stage::Connecting, error.into()),
        };

        let outcome = match self.audit(&mut session, host, cohort).await {
            Ok(audited) => {
                info!(%host, hostname = %audited.facts.hostname, "audit complete");
                HostOutcome::Done(audited)
            }
            Err((stage, error)) => skip(host, stage, error),
        };

        if let Err(error) = session.close().await {
            warn!(%host, %error, "failed to close session");
        }
        outcome
    }

    /// Runs every stage after [Stage::Connecting] on an open session.
    async fn audit<S: Session>(
        &self,
        session: &mut S,
        host: Ipv4Addr,
        cohort: &Cohort,
    ) -> Result<AuditedHost, (Stage, HostError)> {
        for command in &self.setup_commands {
            match self.executor.execute(session, command).await {
                CommandResult::Success(_) | CommandResult::Empty => {}
                CommandResult::CommandError { marker } => {
                    warn!(%host, %command, %marker, "setup command rejected");
                }
                CommandResult::TransportError(source) => {
                    let command = command.clone();
                    return Err((Stage::Connecting, HostError::Transport { command, source }));
                }
            }
        }

        let text = self
            .executor
            .execute(session, SHOW_VERSION)
            .await
            .into_text(SHOW_VERSION)
            .map_err(at(Stage::Identifying))?;
        let facts = DeviceFacts::from_show_version(&text).map_err(at(Stage::Identifying))?;
        let hostname = facts.hostname.as_str();
        info!(%host, hostname, model = %facts.model_number, "identified device");

        let snapshot = self
            .snapshotter
            .snapshot(&self.executor, session, hostname, cohort.as_str())
            .await
            .map_err(at(Stage::Snapshotting))?;

        let probe = self.executor.execute(session, SHOW_CDP_NEIGHBORS).await;
        let cdp = CdpStatus::from_probe(&probe);
        if cdp == CdpStatus::Unknown {
            warn!(%host, hostname, "could not read CDP status");
        }
        let probe = self.executor.execute(session, SHOW_NTP_STATUS).await;
        let ntp = NtpStatus::from_probe(&probe);
        if ntp == NtpStatus::Unknown {
            warn!(%host, hostname, "could not read NTP status");
        }

        let plan =
            remediate::plan(&self.executor, session, hostname, &snapshot.text, &self.desired)
                .await;
        remediate::apply(
            &self.executor,
            session,
            hostname,
            &plan,
            &self.desired,
            self.mode,
        )
        .await
        .map_err(at(Stage::Planning))?;

        let line = report::format_line(&facts, &cdp, &ntp);
        Ok(AuditedHost {
            facts,
            cdp,
            ntp,
            plan,
            backup_key: snapshot.key,
            backup_stored: snapshot.stored,
            line,
        })
    }
}

/// Runs the pipeline for every host and collects the report.
///
/// Hosts are audited concurrently, at most [Pipeline::concurrency] at a time. Each host task
/// receives its own clone of `manager`.
pub async fn run_fleet<M, S, St>(
    pipeline: Arc<Pipeline<St>>,
    manager: M,
    hosts: Vec<Ipv4Addr>,
    cohort: &Cohort,
) -> FleetReport
where
    M: ManageSession<S> + Clone + Send + 'static,
    S: Session + 'static,
    St: Storage,
{
    let semaphore = Arc::new(Semaphore::new(pipeline.concurrency));
    let mut tasks = JoinSet::new();

    info!(hosts = hosts.len(), cohort = %cohort, "starting fleet audit");
    for host in hosts {
        let pipeline = pipeline.clone();
        let mut manager = manager.clone();
        let semaphore = semaphore.clone();
        let cohort = cohort.clone();
        tasks.spawn(async move {
            // The semaphore is never closed, so acquiring only waits.
            let _permit = semaphore.acquire_owned().await;
            let outcome = pipeline.run_host(&mut manager, host, &cohort).await;
            (host, outcome)
        });
    }

    let mut report = FleetReport::new();
    let mut skipped = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((host, HostOutcome::Done(audited))) => report.push(host, audited.line),
            Ok((_, HostOutcome::Skipped { .. })) => skipped += 1,
            Err(error) => {
                error!(%error, "host task ended abnormally");
                skipped += 1;
            }
        }
    }

    info!(done = report.len(), skipped, "fleet audit finished");
    report
}

fn skip(host: Ipv4Addr, stage: Stage, error: HostError) -> HostOutcome {
    error!(%host, %stage, %error, "skipping host");
    HostOutcome::Skipped { stage, error }
}

fn at(stage: Stage) -> impl Fn(HostError) -> (Stage, HostError) {
    move |error| (stage, error)
}
