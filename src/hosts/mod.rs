use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::runner::RunnerError;

const SCHEMES: [&str; 2] = ["http://", "https://"];

/// A bare, normalized hostname (optionally followed by a path) that is probed at most once.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Host(String);

impl Host {
    /// Normalizes `raw` and returns `None` when nothing is left.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = normalize_host(raw);
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The probe base, always HTTPS.
    pub fn base_url(&self) -> String {
        format!("https://{}", self.0)
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strips surrounding whitespace, an `http://`/`https://` prefix (any case) and
/// trailing slashes. The authority part is lower-cased, anything after it keeps
/// its case.
pub fn normalize_host(raw: &str) -> String {
    let mut host = raw.trim();
    for scheme in SCHEMES {
        let has_scheme = host
            .get(..scheme.len())
            .map(|prefix| prefix.eq_ignore_ascii_case(scheme))
            .unwrap_or(false);
        if has_scheme {
            host = &host[scheme.len()..];
            break;
        }
    }
    let host = host.trim_end_matches('/');

    let split = host
        .find(|c: char| matches!(c, '/' | '?' | '#'))
        .unwrap_or(host.len());
    let (authority, rest) = host.split_at(split);
    format!("{}{}", authority.to_ascii_lowercase(), rest)
}

/// Ordered, duplicate-free host accumulator.
#[derive(Clone, Debug, Default)]
pub struct HostList {
    hosts: Vec<Host>,
    seen: HashSet<Host>,
}

impl HostList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the line produced a host that was not seen before.
    pub fn push_raw(&mut self, raw: &str) -> bool {
        match Host::parse(raw) {
            Some(host) if self.seen.insert(host.clone()) => {
                self.hosts.push(host);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn into_vec(self) -> Vec<Host> {
        self.hosts
    }
}

pub fn parse_hosts(text: &str) -> Vec<Host> {
    let mut list = HostList::new();
    for line in text.lines() {
        list.push_raw(line);
    }
    list.into_vec()
}

/// Appends the hosts read from `path` to `list`.
///
/// Returns `Ok(false)` when the file does not exist, which callers treat as
/// "nothing to do" rather than a failure.
pub async fn load_hosts_into(path: &Path, list: &mut HostList) -> Result<bool, RunnerError> {
    let handle = match File::open(path).await {
        Ok(handle) => handle,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(RunnerError::FileOpen {
                kind: "input_file",
                path: path.display().to_string(),
                source: e,
            })
        }
    };

    let mut lines = BufReader::new(handle).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                list.push_raw(&line);
            }
            Ok(None) => break,
            Err(e) => {
                return Err(RunnerError::FileRead {
                    kind: "input_file",
                    path: path.display().to_string(),
                    source: e,
                })
            }
        }
    }
    Ok(true)
}

pub async fn load_hosts(path: &Path) -> Result<Option<Vec<Host>>, RunnerError> {
    let mut list = HostList::new();
    if load_hosts_into(path, &mut list).await? {
        Ok(Some(list.into_vec()))
    } else {
        Ok(None)
    }
}
