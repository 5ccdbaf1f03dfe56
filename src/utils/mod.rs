use std::collections::HashSet;

use crate::prober::HeaderRule;

/// Parses `GET,head, OPTIONS` into methods, upper-cased and deduplicated in order.
pub fn parse_http_methods_csv(value: &str) -> Result<Vec<reqwest::Method>, String> {
    let raw = value.trim();
    if raw.is_empty() {
        return Err("methods list is empty".to_string());
    }

    let mut out: Vec<reqwest::Method> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for part in raw.split(',') {
        let item = part.trim();
        if item.is_empty() {
            continue;
        }
        let canonical = item.to_ascii_uppercase();
        let method = reqwest::Method::from_bytes(canonical.as_bytes())
            .map_err(|_| format!("invalid method '{item}'"))?;
        if seen.insert(method.as_str().to_string()) {
            out.push(method);
        }
    }

    if out.is_empty() {
        return Err("methods list is empty".to_string());
    }
    Ok(out)
}

pub fn parse_header_rules(values: &[String]) -> Result<Vec<HeaderRule>, String> {
    values.iter().map(|v| HeaderRule::parse(v)).collect()
}

/// Trims path tricks and drops blank entries. Order is kept, duplicates too.
pub fn clean_path_tricks(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
