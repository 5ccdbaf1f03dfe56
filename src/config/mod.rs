use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::Serialize;

use crate::output::ReportPaths;

pub const INPUT_RELATIVE_PATH: [&str; 3] = ["subdomains", "status", "403_subdomains.txt"];
pub const OUTPUT_DIR_NAME: &str = "bypass_403";

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ConfigFile {
    pub hosts: Option<Vec<String>>,
    pub input_file: Option<String>,
    pub output_dir: Option<String>,
    pub timeout: Option<u64>,
    pub concurrency: Option<usize>,
    pub proxy: Option<String>,
    pub methods: Option<String>,
    pub headers: Option<Vec<String>>,
    pub path_tricks: Option<Vec<String>>,
    pub no_color: Option<bool>,
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
        .or_else(|| {
            let drive = env::var_os("HOMEDRIVE")?;
            let path = env::var_os("HOMEPATH")?;
            Some(PathBuf::from(drive).join(path))
        })
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn load_config(path: &Path) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_yaml::from_str::<ConfigFile>(&contents)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

/// Input and output locations derived from a project directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectPaths {
    pub input_file: PathBuf,
    pub reports: ReportPaths,
}

impl ProjectPaths {
    pub fn from_project_dir(dir: &Path) -> Self {
        let input_file = INPUT_RELATIVE_PATH
            .iter()
            .fold(dir.to_path_buf(), |acc, part| acc.join(part));
        Self {
            input_file,
            reports: ReportPaths::in_dir(dir.join(OUTPUT_DIR_NAME)),
        }
    }

    pub fn with_input_file(mut self, input_file: Option<PathBuf>) -> Self {
        if let Some(path) = input_file {
            self.input_file = path;
        }
        self
    }

    pub fn with_output_dir(mut self, output_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = output_dir {
            self.reports = ReportPaths::in_dir(dir);
        }
        self
    }
}
