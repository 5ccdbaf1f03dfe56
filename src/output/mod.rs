use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::prober::Finding;

pub const JSON_REPORT: &str = "results.json";
pub const TEXT_REPORT: &str = "results.txt";
pub const NO_FINDINGS_LINE: &str = "No bypass findings.";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to serialize findings: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write report {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to move report into place {path}: {source}")]
    Commit {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Where the two reports of a run land.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportPaths {
    pub dir: PathBuf,
    pub json: PathBuf,
    pub text: PathBuf,
}

impl ReportPaths {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            json: dir.join(JSON_REPORT),
            text: dir.join(TEXT_REPORT),
            dir,
        }
    }
}

pub async fn ensure_dir(path: &Path) -> Result<(), OutputError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| OutputError::CreateDir {
            path: path.display().to_string(),
            source: e,
        })
}

pub fn render_json(findings: &[Finding]) -> Result<Vec<u8>, OutputError> {
    let mut out =
        serde_json::to_vec_pretty(findings).map_err(|e| OutputError::Serialize { source: e })?;
    out.push(b'\n');
    Ok(out)
}

pub fn render_text(findings: &[Finding]) -> Vec<u8> {
    let mut out = String::new();
    if findings.is_empty() {
        out.push_str(NO_FINDINGS_LINE);
        out.push('\n');
        return out.into_bytes();
    }
    for f in findings {
        out.push_str(&format!(
            "{} | {} | {} | status={} | detail={} | url={}\n",
            f.host, f.test, f.method, f.status, f.detail, f.url
        ));
    }
    out.into_bytes()
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

async fn discard(paths: &[PathBuf]) {
    for p in paths {
        let _ = tokio::fs::remove_file(p).await;
    }
}

/// Writes both reports or neither.
///
/// Both renderings are produced before anything touches the disk. They are staged next to their destinations and renamed into place
/// once both staged writes succeeded. Any failure removes what was written.
pub async fn write_reports(paths: &ReportPaths, findings: &[Finding]) -> Result<(), OutputError> {
    let staged = [
        (paths.json.clone(), render_json(findings)?),
        (paths.text.clone(), render_text(findings)),
    ];

    let mut written: Vec<PathBuf> = Vec::new();
    for (dest, bytes) in staged.iter() {
        let tmp = staging_path(dest);
        if let Err(e) = tokio::fs::write(&tmp, bytes).await {
            discard(&written).await;
            return Err(OutputError::Write {
                path: dest.display().to_string(),
                source: e,
            });
        }
        written.push(tmp);
    }

    let mut committed: Vec<PathBuf> = Vec::new();
    for (dest, _) in staged.iter() {
        let tmp = staging_path(dest);
        if let Err(e) = tokio::fs::rename(&tmp, dest).await {
            discard(&written).await;
            discard(&committed).await;
            return Err(OutputError::Commit {
                path: dest.display().to_string(),
                source: e,
            });
        }
        committed.push(dest.clone());
    }
    Ok(())
}
