use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use indicatif::ProgressBar;
use reqwest::Method;

use crate::executor::{ProbeError, ProbeOutcome, ProbeRequest, RequestExecutor};
use crate::hosts::Host;
use crate::prober::{self, Finding, HeaderRule, ProbeRules, TestKind};
use crate::runner::{self, Options, RunOutcome, Runner};

type ScriptKey = (String, String, Option<String>);

/// In-memory executor answering from a script and recording every request.
#[derive(Default)]
struct ScriptedExecutor {
    default: Option<ProbeOutcome>,
    script: HashMap<ScriptKey, ProbeOutcome>,
    faulting: HashSet<String>,
    panicking: HashSet<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<ProbeRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedExecutor {
    fn answering(default: ProbeOutcome) -> Self {
        Self {
            default: Some(default),
            ..Self::default()
        }
    }

    fn on(mut self, method: Method, url: &str, header: Option<&str>, outcome: ProbeOutcome) -> Self {
        self.script.insert(
            (
                method.as_str().to_string(),
                url.to_string(),
                header.map(|h| h.to_string()),
            ),
            outcome,
        );
        self
    }

    fn baseline(self, host: &str, outcome: ProbeOutcome) -> Self {
        let base = format!("https://{host}");
        self.on(Method::GET, &base, None, outcome)
    }

    fn calls(&self) -> Vec<ProbeRequest> {
        self.calls.lock().unwrap().clone()
    }

    fn baseline_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == Method::GET && c.header.is_none() && !c.url[8..].contains('/'))
            .map(|c| c.url)
            .collect()
    }

    fn targets(set: &HashSet<String>, url: &str) -> bool {
        set.iter().any(|h| url.starts_with(&format!("https://{h}")))
    }
}

#[async_trait]
impl RequestExecutor for ScriptedExecutor {
    async fn execute(&self, request: &ProbeRequest) -> Result<ProbeOutcome, ProbeError> {
        self.calls.lock().unwrap().push(request.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if Self::targets(&self.panicking, &request.url) {
            panic!("scripted panic for {}", request.url);
        }
        if Self::targets(&self.faulting, &request.url) {
            return Err(ProbeError::InvalidUrl {
                url: request.url.clone(),
                message: "scripted fault".to_string(),
            });
        }

        let key = (
            request.method.as_str().to_string(),
            request.url.clone(),
            request.header.as_ref().map(|h| h.detail()),
        );
        Ok(self
            .script
            .get(&key)
            .copied()
            .or(self.default)
            .unwrap_or(ProbeOutcome::Unreachable))
    }
}

fn ok(status: u16, length: usize) -> ProbeOutcome {
    ProbeOutcome::Response { status, length }
}

fn host(raw: &str) -> Host {
    Host::parse(raw).unwrap()
}

fn write_input(project: &Path, lines: &str) {
    let dir = project.join("subdomains").join("status");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("403_subdomains.txt"), lines).unwrap();
}

fn project_run(project: &Path) -> crate::app::RunConfig {
    let args = crate::cli::args::CliArgs::parse_from(["bypass403", project.to_str().unwrap()]);
    crate::app::build_run_config(args, crate::config::ConfigFile::default()).unwrap()
}

#[tokio::test]
async fn non_forbidden_baseline_yields_no_findings() {
    for baseline in [ok(200, 10), ok(404, 0), ok(401, 3), ProbeOutcome::Unreachable] {
        let exec = ScriptedExecutor::answering(ok(200, 1)).baseline("example.com", baseline);
        let probe = prober::probe_host(&host("example.com"), &exec, &ProbeRules::default())
            .await
            .unwrap();
        assert!(probe.findings.is_empty());
        assert!(!probe.is_candidate());
        assert_eq!(exec.calls().len(), 1);
    }
}

#[tokio::test]
async fn forbidden_baseline_runs_every_variant_in_order() {
    let exec = ScriptedExecutor::answering(ok(403, 0));
    let rules = ProbeRules::default();
    let probe = prober::probe_host(&host("example.com"), &exec, &rules)
        .await
        .unwrap();
    assert!(probe.is_candidate());
    assert!(probe.findings.is_empty());

    let calls = exec.calls();
    assert_eq!(calls.len(), 53);
    assert_eq!(calls.len(), rules.requests_per_candidate());
    assert_eq!(calls[0], ProbeRequest::new(Method::GET, "https://example.com"));

    let xff = HeaderRule::new("X-Forwarded-For", "127.0.0.1");
    assert_eq!(
        calls[1],
        ProbeRequest::new(Method::GET, "https://example.com").with_header(xff.clone())
    );
    assert_eq!(
        calls[4],
        ProbeRequest::new(Method::POST, "https://example.com").with_header(xff)
    );
    assert_eq!(
        calls[5].header,
        Some(HeaderRule::new("X-Original-URL", "/"))
    );
    assert_eq!(
        calls[24],
        ProbeRequest::new(Method::POST, "https://example.com")
            .with_header(HeaderRule::new("X-Forwarded-Host", "localhost"))
    );
    assert_eq!(calls[25], ProbeRequest::new(Method::GET, "https://example.com/"));
    assert_eq!(
        calls[52],
        ProbeRequest::new(Method::POST, "https://example.com/%2e%2e%2f")
    );
    assert!(calls[25..].iter().all(|c| c.header.is_none()));

    let again = ScriptedExecutor::answering(ok(403, 0));
    prober::probe_host(&host("example.com"), &again, &rules)
        .await
        .unwrap();
    assert_eq!(again.calls(), calls);
}

#[tokio::test]
async fn only_non_forbidden_reachable_variants_become_findings() {
    let base = "https://example.com";
    let exec = ScriptedExecutor::answering(ProbeOutcome::Unreachable)
        .baseline("example.com", ok(403, 0))
        .on(Method::HEAD, base, Some("X-Original-URL: /"), ok(401, 7))
        .on(Method::POST, "https://example.com/?ignore", None, ok(500, 99))
        .on(Method::GET, "https://example.com/", None, ok(403, 12))
        .on(Method::OPTIONS, "https://example.com/%2e/", None, ok(204, 0));

    let probe = prober::probe_host(&host("example.com"), &exec, &ProbeRules::default())
        .await
        .unwrap();

    assert!(probe.findings.iter().all(|f| f.status != 0 && f.status != 403));
    let seen: Vec<(TestKind, &str, &str, u16)> = probe
        .findings
        .iter()
        .map(|f| (f.test, f.method.as_str(), f.detail.as_str(), f.status))
        .collect();
    assert_eq!(
        seen,
        vec![
            (TestKind::Header, "HEAD", "X-Original-URL: /", 401),
            (TestKind::Path, "OPTIONS", "/%2e/", 204),
            (TestKind::Path, "POST", "/?ignore", 500),
        ]
    );
    assert_eq!(probe.findings[2].url, "https://example.com/?ignore");
    assert_eq!(probe.findings[2].length, 99);
}

#[tokio::test]
async fn smaller_rule_sets_drive_the_prober() {
    let rules = ProbeRules {
        headers: vec![HeaderRule::new("X-Real-IP", "127.0.0.1")],
        path_tricks: vec!["/..;/".to_string()],
        methods: vec![Method::GET],
    };
    let exec = ScriptedExecutor::answering(ok(403, 0))
        .on(Method::GET, "https://example.com/..;/", None, ok(200, 5));
    let probe = prober::probe_host(&host("example.com"), &exec, &rules)
        .await
        .unwrap();

    assert_eq!(exec.calls().len(), 3);
    assert_eq!(
        probe.findings,
        vec![Finding {
            host: host("example.com"),
            test: TestKind::Path,
            method: "GET".to_string(),
            detail: "/..;/".to_string(),
            url: "https://example.com/..;/".to_string(),
            status: 200,
            length: 5,
        }]
    );
}

#[tokio::test]
async fn every_host_probed_once_whatever_the_pool_size() {
    let targets: Vec<Host> = (0..25).map(|i| host(&format!("h{i}.example.com"))).collect();
    for concurrency in [1usize, 3, 20, 64] {
        let exec = Arc::new(ScriptedExecutor {
            delay: Some(Duration::from_millis(2)),
            ..ScriptedExecutor::answering(ok(200, 0))
        });
        let report = runner::probe_hosts(
            targets.clone(),
            exec.clone(),
            Arc::new(ProbeRules::default()),
            concurrency,
            ProgressBar::hidden(),
        )
        .await
        .unwrap();

        assert_eq!(report.hosts, 25);
        assert_eq!(report.candidates, 0);
        assert_eq!(report.failed, 0);
        let mut baselines = exec.baseline_calls();
        assert_eq!(baselines.len(), 25);
        baselines.sort();
        baselines.dedup();
        assert_eq!(baselines.len(), 25);
        assert!(exec.max_in_flight.load(Ordering::SeqCst) <= concurrency);
    }
}

#[tokio::test]
async fn faulting_and_panicking_hosts_do_not_sink_the_batch() {
    let exec = Arc::new(ScriptedExecutor {
        faulting: HashSet::from(["bad.example.com".to_string()]),
        panicking: HashSet::from(["boom.example.com".to_string()]),
        ..ScriptedExecutor::answering(ok(403, 0)).on(
            Method::GET,
            "https://good.example.com",
            Some("X-Forwarded-Host: localhost"),
            ok(200, 1),
        )
    });
    let targets = vec![
        host("bad.example.com"),
        host("good.example.com"),
        host("boom.example.com"),
        host("fine.example.com"),
    ];
    let report = runner::probe_hosts(
        targets,
        exec.clone(),
        Arc::new(ProbeRules::default()),
        2,
        ProgressBar::hidden(),
    )
    .await
    .unwrap();

    assert_eq!(report.hosts, 4);
    assert_eq!(report.failed, 2);
    assert_eq!(report.candidates, 2);
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].host, host("good.example.com"));
    assert_eq!(report.findings[0].detail, "X-Forwarded-Host: localhost");
}

#[tokio::test]
async fn duplicate_hosts_are_probed_once() {
    let dir = tempfile::tempdir().unwrap();
    let once = dir.path().join("once.txt");
    let twice = dir.path().join("twice.txt");
    std::fs::write(&once, "example.com\n").unwrap();
    std::fs::write(&twice, "example.com\nhttps://Example.com/\n\nexample.com//\n").unwrap();

    let mut results = Vec::new();
    for path in [once, twice] {
        let exec = Arc::new(
            ScriptedExecutor::answering(ok(403, 0)).on(
                Method::GET,
                "https://example.com/%2e%2f",
                None,
                ok(200, 42),
            ),
        );
        let runner = Runner::with_executor(
            Options {
                input_file: Some(path),
                ..Options::default()
            },
            exec.clone(),
        )
        .unwrap();
        let scan = match runner.run().await.unwrap() {
            RunOutcome::Completed(scan) => scan,
            other => panic!("unexpected outcome {other:?}"),
        };
        assert_eq!(scan.hosts, 1);
        assert_eq!(exec.baseline_calls(), vec!["https://example.com"]);
        results.push(scan.findings);
    }
    assert_eq!(results[0], results[1]);
    assert_eq!(results[0].len(), 1);
}

#[tokio::test]
async fn inline_hosts_run_without_an_input_file() {
    let dir = tempfile::tempdir().unwrap();
    let exec = Arc::new(ScriptedExecutor::answering(ok(200, 0)));
    let runner = Runner::with_executor(
        Options {
            hosts: vec!["a.example.com".to_string(), "A.example.com/".to_string()],
            input_file: Some(dir.path().join("missing.txt")),
            ..Options::default()
        },
        exec.clone(),
    )
    .unwrap();
    match runner.run().await.unwrap() {
        RunOutcome::Completed(scan) => assert_eq!(scan.hosts, 1),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(exec.baseline_calls(), vec!["https://a.example.com"]);
}

#[tokio::test]
async fn scenario_single_header_bypass_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    write_input(dir.path(), "https://example.com/\n");
    let run = project_run(dir.path());

    let exec = Arc::new(
        ScriptedExecutor::answering(ok(403, 0)).on(
            Method::GET,
            "https://example.com",
            Some("X-Forwarded-For: 127.0.0.1"),
            ok(200, 512),
        ),
    );
    let outcome = crate::app::run_project(&run, Some(exec), ProgressBar::hidden())
        .await
        .unwrap();

    let expected = Finding {
        host: host("example.com"),
        test: TestKind::Header,
        method: "GET".to_string(),
        detail: "X-Forwarded-For: 127.0.0.1".to_string(),
        url: "https://example.com".to_string(),
        status: 200,
        length: 512,
    };
    match outcome {
        RunOutcome::Completed(scan) => assert_eq!(scan.findings, vec![expected.clone()]),
        other => panic!("unexpected outcome {other:?}"),
    }

    let reports = &run.paths.reports;
    let parsed: Vec<Finding> = serde_json::from_slice(&std::fs::read(&reports.json).unwrap()).unwrap();
    assert_eq!(parsed, vec![expected]);
    assert_eq!(
        std::fs::read_to_string(&reports.text).unwrap(),
        "example.com | header | GET | status=200 | detail=X-Forwarded-For: 127.0.0.1 | url=https://example.com\n"
    );
}

#[tokio::test]
async fn scenario_open_host_reports_no_findings() {
    let dir = tempfile::tempdir().unwrap();
    write_input(dir.path(), "example.com\n");
    let run = project_run(dir.path());

    let exec = Arc::new(ScriptedExecutor::answering(ok(200, 64)));
    crate::app::run_project(&run, Some(exec.clone()), ProgressBar::hidden())
        .await
        .unwrap();

    assert_eq!(exec.calls().len(), 1);
    let reports = &run.paths.reports;
    assert_eq!(
        std::fs::read_to_string(&reports.text).unwrap(),
        "No bypass findings.\n"
    );
    let parsed: serde_json::Value = serde_json::from_slice(&std::fs::read(&reports.json).unwrap()).unwrap();
    assert_eq!(parsed, serde_json::json!([]));
}

#[tokio::test]
async fn scenario_missing_input_is_a_clean_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let run = project_run(dir.path());

    let exec = Arc::new(ScriptedExecutor::answering(ok(403, 0)));
    let outcome = crate::app::run_project(&run, Some(exec.clone()), ProgressBar::hidden())
        .await
        .unwrap();

    assert!(matches!(outcome, RunOutcome::NoInput { .. }));
    assert!(exec.calls().is_empty());
    let reports = &run.paths.reports;
    assert!(reports.dir.is_dir());
    assert!(!reports.json.exists());
    assert!(!reports.text.exists());
    assert_eq!(std::fs::read_dir(&reports.dir).unwrap().count(), 0);
}

#[tokio::test]
async fn unwritable_output_directory_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_input(dir.path(), "example.com\n");
    std::fs::write(dir.path().join("bypass_403"), "not a directory").unwrap();
    let run = project_run(dir.path());

    let exec = Arc::new(ScriptedExecutor::answering(ok(403, 0)));
    let err = crate::app::run_project(&run, Some(exec.clone()), ProgressBar::hidden())
        .await
        .unwrap_err();
    assert!(err.contains("bypass_403"));
    assert!(exec.calls().is_empty());
}

#[test]
fn scenario_encoded_traversal_trick_resolution() {
    assert_eq!(
        prober::resolve_path_trick("https://example.com/", "/%2e%2e%2f"),
        "https://example.com/%2e%2e%2f"
    );
    assert_eq!(
        prober::resolve_path_trick("https://example.com", "/%2e%2e%2f"),
        "https://example.com/%2e%2e%2f"
    );
}
