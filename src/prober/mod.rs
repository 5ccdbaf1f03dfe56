mod resolve;
mod rules;

use std::fmt;

use itertools::iproduct;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::executor::{ProbeError, ProbeOutcome, ProbeRequest, RequestExecutor};
use crate::hosts::Host;

pub use resolve::resolve_path_trick;
pub use rules::{HeaderRule, ProbeRules, DEFAULT_HEADERS, DEFAULT_PATH_TRICKS};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    Header,
    Path,
}

impl TestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Path => "path",
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request variant that got something other than 403 (or nothing) back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub host: Host,
    pub test: TestKind,
    pub method: String,
    pub detail: String,
    pub url: String,
    pub status: u16,
    pub length: usize,
}

/// Everything the prober learned about one host.
#[derive(Clone, Debug)]
pub struct HostProbe {
    pub host: Host,
    pub baseline: ProbeOutcome,
    pub findings: Vec<Finding>,
}

impl HostProbe {
    /// True when the baseline was 403 and the variant passes ran.
    pub fn is_candidate(&self) -> bool {
        self.baseline.is_forbidden()
    }
}

/// Neither unreachable nor still forbidden.
pub fn is_interesting(outcome: &ProbeOutcome) -> bool {
    !matches!(outcome.status(), 0 | 403)
}

struct FindingSink<'a> {
    host: &'a Host,
    findings: Vec<Finding>,
}

impl<'a> FindingSink<'a> {
    fn record(
        &mut self,
        test: TestKind,
        method: &Method,
        detail: String,
        url: &str,
        outcome: ProbeOutcome,
    ) {
        if !is_interesting(&outcome) {
            return;
        }
        self.findings.push(Finding {
            host: self.host.clone(),
            test,
            method: method.as_str().to_string(),
            detail,
            url: url.to_string(),
            status: outcome.status(),
            length: outcome.length(),
        });
    }
}

/// Probes one host: a baseline GET, then the header and path passes when the
/// baseline is exactly 403. Sub-probes run sequentially in rule order, each
/// rule crossed with every method.
pub async fn probe_host(
    host: &Host,
    executor: &dyn RequestExecutor,
    rules: &ProbeRules,
) -> Result<HostProbe, ProbeError> {
    let base = host.base_url();
    let baseline = executor
        .execute(&ProbeRequest::new(Method::GET, base.clone()))
        .await?;
    if !baseline.is_forbidden() {
        tracing::debug!(host = %host, status = baseline.status(), "baseline not forbidden, skipping");
        return Ok(HostProbe {
            host: host.clone(),
            baseline,
            findings: Vec::new(),
        });
    }

    let mut sink = FindingSink {
        host,
        findings: Vec::new(),
    };

    for (rule, method) in iproduct!(rules.headers.iter(), rules.methods.iter()) {
        let req = ProbeRequest::new(method.clone(), base.clone()).with_header(rule.clone());
        let outcome = executor.execute(&req).await?;
        sink.record(TestKind::Header, method, rule.detail(), &base, outcome);
    }

    for (trick, method) in iproduct!(rules.path_tricks.iter(), rules.methods.iter()) {
        let url = resolve_path_trick(&base, trick);
        let outcome = executor
            .execute(&ProbeRequest::new(method.clone(), url.clone()))
            .await?;
        sink.record(TestKind::Path, method, trick.clone(), &url, outcome);
    }

    tracing::info!(host = %host, findings = sink.findings.len(), "host probed");
    Ok(HostProbe {
        host: host.clone(),
        baseline,
        findings: sink.findings,
    })
}
