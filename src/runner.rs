use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use indicatif::ProgressBar;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task;
use tokio::time::Instant;

use crate::executor::{self, ClientConfig, HttpExecutor, ProbeError, RequestExecutor};
use crate::hosts::{self, Host, HostList};
use crate::prober::{self, Finding, HostProbe, ProbeRules};

pub const DEFAULT_CONCURRENCY: usize = 20;

#[derive(Clone, Debug)]
pub struct Options {
    pub hosts: Vec<String>,
    pub input_file: Option<PathBuf>,
    pub timeout_seconds: u64,
    pub concurrency: usize,
    pub proxy: Option<String>,
    pub rules: ProbeRules,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            input_file: None,
            timeout_seconds: executor::DEFAULT_TIMEOUT_SECONDS,
            concurrency: DEFAULT_CONCURRENCY,
            proxy: None,
            rules: ProbeRules::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("invalid concurrency {value}, expected positive integer")]
    InvalidConcurrency { value: usize },

    #[error("invalid timeout {value}, expected positive number of seconds")]
    InvalidTimeout { value: u64 },

    #[error("invalid probe rules: {message}")]
    InvalidRules { message: String },

    #[error("failed to open file for {kind}: {path}: {source}")]
    FileOpen {
        kind: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read lines for {kind}: {path}: {source}")]
    FileRead {
        kind: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("task join failed: {source}")]
    TaskJoin {
        #[source]
        source: tokio::task::JoinError,
    },
}

#[derive(Clone, Debug)]
pub struct ScanResult {
    pub started_at: Instant,
    pub elapsed: Duration,
    /// Distinct hosts probed.
    pub hosts: usize,
    /// Hosts whose baseline was 403.
    pub candidates: usize,
    /// Hosts that faulted and contributed nothing.
    pub failed: usize,
    pub findings: Vec<Finding>,
}

#[derive(Clone, Debug)]
pub enum RunOutcome {
    /// The input file does not exist and no inline hosts were given.
    NoInput { path: Option<PathBuf> },
    Completed(ScanResult),
}

#[derive(Clone)]
pub struct Runner {
    options: Options,
    executor: Arc<dyn RequestExecutor>,
    progress: ProgressBar,
}

impl Runner {
    pub fn new(options: Options) -> Result<Self, RunnerError> {
        validate_options(&options)?;
        let executor = HttpExecutor::new(&ClientConfig {
            timeout_seconds: options.timeout_seconds,
            proxy: options.proxy.clone(),
        })?;
        Ok(Self {
            options,
            executor: Arc::new(executor),
            progress: ProgressBar::hidden(),
        })
    }

    /// Uses `executor` for all HTTP I/O instead of a reqwest client.
    pub fn with_executor(
        options: Options,
        executor: Arc<dyn RequestExecutor>,
    ) -> Result<Self, RunnerError> {
        validate_options(&options)?;
        Ok(Self {
            options,
            executor,
            progress: ProgressBar::hidden(),
        })
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub async fn run(&self) -> Result<RunOutcome, RunnerError> {
        let started_at = Instant::now();

        let mut list = HostList::new();
        for raw in self.options.hosts.iter() {
            list.push_raw(raw);
        }
        let mut input_found = false;
        if let Some(path) = self.options.input_file.as_deref() {
            input_found = hosts::load_hosts_into(path, &mut list).await?;
        }
        if !input_found && list.is_empty() {
            self.progress.finish_and_clear();
            return Ok(RunOutcome::NoInput {
                path: self.options.input_file.clone(),
            });
        }

        tracing::info!(hosts = list.len(), input_found, "targets loaded");
        let targets = list.into_vec();
        let report = probe_hosts(
            targets,
            self.executor.clone(),
            Arc::new(self.options.rules.clone()),
            self.options.concurrency,
            self.progress.clone(),
        )
        .await?;

        Ok(RunOutcome::Completed(ScanResult {
            started_at,
            elapsed: started_at.elapsed(),
            hosts: report.hosts,
            candidates: report.candidates,
            failed: report.failed,
            findings: report.findings,
        }))
    }
}

fn validate_options(options: &Options) -> Result<(), RunnerError> {
    if options.concurrency == 0 {
        return Err(RunnerError::InvalidConcurrency {
            value: options.concurrency,
        });
    }
    if options.timeout_seconds == 0 {
        return Err(RunnerError::InvalidTimeout {
            value: options.timeout_seconds,
        });
    }
    options
        .rules
        .validate()
        .map_err(|message| RunnerError::InvalidRules { message })
}

/// Aggregate of one batch of host probes.
#[derive(Clone, Debug, Default)]
pub struct BatchReport {
    pub hosts: usize,
    pub candidates: usize,
    pub failed: usize,
    /// In completion order across hosts, generation order within a host.
    pub findings: Vec<Finding>,
}

enum HostReport {
    Probed(HostProbe),
    Faulted { host: Host, error: ProbeError },
}

/// Probes every host exactly once with at most `concurrency` hosts in flight.
///
/// A host whose probe faults or panics contributes no findings; the rest of
/// the batch carries on.
pub async fn probe_hosts(
    targets: Vec<Host>,
    executor: Arc<dyn RequestExecutor>,
    rules: Arc<ProbeRules>,
    concurrency: usize,
    pb: ProgressBar,
) -> Result<BatchReport, RunnerError> {
    let total = targets.len();
    pb.set_length(total as u64);

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let (result_tx, mut result_rx) = mpsc::channel::<HostReport>(1024);

    let collect_pb = pb.clone();
    let collect_handle = task::spawn(async move {
        let mut report = BatchReport::default();
        while let Some(result) = result_rx.recv().await {
            collect_pb.inc(1);
            match result {
                HostReport::Probed(probe) => {
                    if probe.is_candidate() {
                        report.candidates += 1;
                    }
                    for finding in probe.findings.iter() {
                        collect_pb.println(format_finding(finding));
                    }
                    report.findings.extend(probe.findings);
                }
                HostReport::Faulted { host, error } => {
                    tracing::warn!(host = %host, error = %error, "host probe faulted");
                    report.failed += 1;
                }
            }
        }
        report
    });

    let workers = FuturesUnordered::new();
    for host in targets {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let executor = executor.clone();
        let rules = rules.clone();
        let tx = result_tx.clone();
        let worker_host = host.clone();
        let handle = task::spawn(async move {
            let result = match prober::probe_host(&worker_host, executor.as_ref(), &rules).await {
                Ok(probe) => HostReport::Probed(probe),
                Err(error) => HostReport::Faulted {
                    host: worker_host,
                    error,
                },
            };
            drop(permit);
            let _ = tx.send(result).await;
        });
        workers.push(async move { (host, handle.await) });
    }
    drop(result_tx);

    let joined: Vec<_> = workers.collect().await;
    let mut panicked = 0usize;
    for (host, joined) in joined {
        if let Err(e) = joined {
            tracing::warn!(host = %host, error = %e, "host probe task aborted");
            pb.inc(1);
            panicked += 1;
        }
    }

    let mut report = collect_handle
        .await
        .map_err(|e| RunnerError::TaskJoin { source: e })?;
    report.hosts = total;
    report.failed += panicked;
    pb.finish_and_clear();
    Ok(report)
}

fn format_finding(finding: &Finding) -> String {
    format!(
        "{}{}{} {} {} {} {} {}",
        "[".bold().white(),
        "BYP".bold().green(),
        "]".bold().white(),
        finding.host.as_str().bold().white(),
        finding.test.as_str().bold().cyan(),
        finding.method.bold().purple(),
        finding.status.to_string().bold().blue(),
        format!("{} -> {}", finding.detail, finding.url).white(),
    )
}
