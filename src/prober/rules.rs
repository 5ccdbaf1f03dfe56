use std::str::FromStr;

use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Method;

pub const DEFAULT_HEADERS: [(&str, &str); 6] = [
    ("X-Forwarded-For", "127.0.0.1"),
    ("X-Original-URL", "/"),
    ("X-Rewrite-URL", "/"),
    ("X-Custom-IP-Authorization", "127.0.0.1"),
    ("X-Forwarded-Proto", "http"),
    ("X-Forwarded-Host", "localhost"),
];

pub const DEFAULT_PATH_TRICKS: [&str; 7] = [
    "/",
    "/.",
    "/./",
    "/%2e/",
    "/%2e%2f",
    "/?ignore",
    "/%2e%2e%2f",
];

/// A single extra header sent with a header-pass probe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderRule {
    pub name: String,
    pub value: String,
}

impl HeaderRule {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Parses `Name: Value`. The value may be empty, the name may not.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let (name, value) = raw
            .split_once(':')
            .ok_or_else(|| format!("expected 'Name: Value', got '{raw}'"))?;
        let rule = Self::new(name.trim(), value.trim());
        rule.validate()?;
        Ok(rule)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("header name is empty".to_string());
        }
        HeaderName::from_str(&self.name)
            .map_err(|_| format!("invalid header name '{}'", self.name))?;
        HeaderValue::from_str(&self.value)
            .map_err(|_| format!("invalid value for header '{}'", self.name))?;
        Ok(())
    }

    /// The finding detail string, `Name: Value`.
    pub fn detail(&self) -> String {
        format!("{}: {}", self.name, self.value)
    }
}

/// What the prober tries against a confirmed 403 host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeRules {
    pub headers: Vec<HeaderRule>,
    pub path_tricks: Vec<String>,
    pub methods: Vec<Method>,
}

impl Default for ProbeRules {
    fn default() -> Self {
        Self {
            headers: DEFAULT_HEADERS
                .iter()
                .map(|(name, value)| HeaderRule::new(*name, *value))
                .collect(),
            path_tricks: DEFAULT_PATH_TRICKS.iter().map(|s| s.to_string()).collect(),
            methods: vec![Method::GET, Method::HEAD, Method::OPTIONS, Method::POST],
        }
    }
}

impl ProbeRules {
    /// Requests issued against a host whose baseline came back 403.
    pub fn requests_per_candidate(&self) -> usize {
        1 + (self.headers.len() + self.path_tricks.len()) * self.methods.len()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.methods.is_empty() {
            return Err("methods list is empty".to_string());
        }
        for rule in self.headers.iter() {
            rule.validate()?;
        }
        Ok(())
    }
}
