use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "bypass403",
    version,
    about = "403 bypass prober",
    long_about = "bypass403 re-requests hosts that answer 403 Forbidden with spoofed headers, path normalization tricks and alternate methods, and reports every variant that gets a different answer.\n\nHosts are read from <PROJECT_DIR>/subdomains/status/403_subdomains.txt and reports are written to <PROJECT_DIR>/bypass_403/.\n\nExamples:\n  bypass403 ./acme\n  bypass403 ./acme -t 50 --timeout 10\n  bypass403 ./acme --config ~/.bypass403/config.yml"
)]
pub struct CliArgs {
    #[arg(
        value_name = "PROJECT_DIR",
        help = "Project directory the input path and output directory are derived from."
    )]
    pub project_dir: String,

    #[arg(
        short = 'v',
        long = "vb",
        visible_alias = "verbose",
        action = ArgAction::Count,
        help_heading = "Output",
        help = "Increase verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        short = 'n',
        long = "nc",
        visible_alias = "no-color",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'o',
        long = "od",
        visible_alias = "out-dir",
        value_name = "DIR",
        help_heading = "Output",
        help = "Write reports here instead of <PROJECT_DIR>/bypass_403."
    )]
    pub out_dir: Option<String>,

    #[arg(
        short = 'i',
        long = "if",
        visible_alias = "input-file",
        value_name = "FILE",
        help_heading = "Input",
        help = "Read hosts from this file instead of the project's 403 list."
    )]
    pub input_file: Option<String>,

    #[arg(
        long = "hst",
        visible_alias = "host",
        value_name = "HOST",
        action = ArgAction::Append,
        help_heading = "Input",
        help = "Extra host to probe (repeatable)."
    )]
    pub host: Vec<String>,

    #[arg(
        short = 'C',
        long = "cfg",
        visible_alias = "config",
        value_name = "FILE",
        help_heading = "Input",
        help = "Path to a YAML config file."
    )]
    pub config: Option<String>,

    #[arg(
        short = 't',
        long = "cnc",
        visible_alias = "concurrency",
        value_name = "N",
        help_heading = "Performance",
        help = "Max hosts probed at once (default 20)."
    )]
    pub concurrency: Option<usize>,

    #[arg(
        short = 'T',
        long = "to",
        visible_alias = "timeout",
        value_name = "SECONDS",
        help_heading = "HTTP",
        help = "Per-request timeout in seconds (default 6)."
    )]
    pub timeout: Option<u64>,

    #[arg(
        short = 'x',
        long = "px",
        visible_alias = "proxy",
        value_name = "URL",
        help_heading = "HTTP",
        help = "HTTP proxy URL (e.g. http://127.0.0.1:8080)."
    )]
    pub proxy: Option<String>,

    #[arg(
        short = 'm',
        long = "mth",
        visible_alias = "methods",
        value_name = "METHODS",
        help_heading = "Rules",
        help = "Methods crossed with every rule (default GET,HEAD,OPTIONS,POST)."
    )]
    pub methods: Option<String>,

    #[arg(
        short = 'H',
        long = "hr",
        visible_alias = "header-rule",
        value_name = "HEADER",
        action = ArgAction::Append,
        help_heading = "Rules",
        help = "Header rule 'Key: Value' (repeatable, replaces the built-in list)."
    )]
    pub header_rule: Vec<String>,

    #[arg(
        short = 'p',
        long = "pt",
        visible_alias = "path-trick",
        value_name = "PATH",
        action = ArgAction::Append,
        allow_hyphen_values = true,
        help_heading = "Rules",
        help = "Path trick (repeatable, replaces the built-in list)."
    )]
    pub path_trick: Vec<String>,
}
