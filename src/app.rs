use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{error::ErrorKind, CommandFactory, Parser};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::cli::args::CliArgs;
use crate::cli::validation;
use crate::config::{self, ConfigFile, ProjectPaths};
use crate::executor::{self, RequestExecutor};
use crate::output;
use crate::prober::ProbeRules;
use crate::runner::{self, Options, RunOutcome, Runner};

fn print_banner() {
    const BANNER: &str = r#"
    __                                __ __  ____  _____
   / /_  __  ______  ____ ___________/ // / / __ \|__  /
  / __ \/ / / / __ \/ __ `/ ___/ ___/ // /_/ / / / /_ <
 / /_/ / /_/ / /_/ / /_/ (__  |__  )__  __/ /_/ /___/ /
/_.___/\__, / .___/\__,_/____/____/  /_/  \____//____/
      /____/_/
       v0.1.0 - 403 bypass prober
    "#;
    print!("{}", BANNER);
    println!();
}

fn format_kv_line(label: &str, value: &str) {
    println!(":: {:<10}: {}", label, value);
}

fn info_line(message: &str) {
    println!(
        "{}{}{} {}",
        "[".bold().white(),
        "INF".bold().blue(),
        "]".bold().white(),
        message
    );
}

fn render_custom_help() -> String {
    let cmd = CliArgs::command();
    let mut out = String::new();

    if let Some(version) = cmd.get_version() {
        out.push_str(cmd.get_name());
        out.push(' ');
        out.push_str(version);
        out.push('\n');
    } else {
        out.push_str(cmd.get_name());
        out.push('\n');
    }

    if let Some(about) = cmd.get_about() {
        out.push_str(&about.to_string());
        out.push('\n');
    }

    if let Some(long_about) = cmd.get_long_about() {
        out.push('\n');
        out.push_str(&long_about.to_string());
        out.push('\n');
    }

    out.push('\n');
    out.push_str("Usage: ");
    out.push_str(cmd.get_name());
    out.push_str(" [OPTIONS] <PROJECT_DIR>\n\n");

    let mut sections: Vec<(String, Vec<&clap::Arg>)> = Vec::new();
    let mut section_idx: HashMap<String, usize> = HashMap::new();

    for arg in cmd.get_arguments() {
        if arg.is_hide_set() {
            continue;
        }

        let heading = if arg.is_positional() {
            "Arguments".to_string()
        } else {
            arg.get_help_heading().unwrap_or("Options").to_string()
        };

        let idx = match section_idx.get(&heading).copied() {
            Some(i) => i,
            None => {
                sections.push((heading.clone(), Vec::new()));
                let i = sections.len() - 1;
                section_idx.insert(heading, i);
                i
            }
        };

        sections[idx].1.push(arg);
    }

    for (heading, args) in sections {
        out.push_str(&heading);
        out.push_str(":\n");

        for arg in args {
            let value_name = arg
                .get_value_names()
                .and_then(|names| names.first())
                .map(|name| name.as_str())
                .unwrap_or("VALUE");

            let flags = if arg.is_positional() {
                format!("<{value_name}>")
            } else {
                let mut parts: Vec<String> = Vec::new();
                if let Some(short) = arg.get_short() {
                    parts.push(format!("-{short}"));
                }
                if let Some(long) = arg.get_long() {
                    parts.push(format!("--{long}"));
                }
                if let Some(aliases) = arg.get_visible_aliases() {
                    for alias in aliases {
                        let rendered = format!("--{alias}");
                        if !parts.iter().any(|p| p == &rendered) {
                            parts.push(rendered);
                        }
                    }
                }
                let mut flags = parts.join(", ");
                if arg.get_action().takes_values() {
                    flags.push_str(&format!(" <{value_name}>"));
                }
                flags
            };

            out.push_str("  ");
            out.push_str(&flags);
            out.push('\n');

            if let Some(help) = arg.get_help() {
                let help = help.to_string();
                if !help.trim().is_empty() {
                    out.push_str("          ");
                    out.push_str(help.trim());
                    out.push('\n');
                }
            }

            out.push('\n');
        }
    }

    out
}

fn init_logging(verbose: u8, no_color: bool) {
    use tracing_subscriber::EnvFilter;
    let crate_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter_str = format!(
        "bypass403={crate},reqwest=warn,hyper=warn",
        crate = crate_level
    );
    let env_filter =
        EnvFilter::try_new(&filter_str).unwrap_or_else(|_| EnvFilter::new(crate_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_target(false)
        .try_init();
}

#[derive(Clone, Debug)]
pub struct RunConfig {
    pub project_dir: PathBuf,
    pub paths: ProjectPaths,
    pub options: Options,
    pub no_color: bool,
    pub verbose: u8,
}

pub fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let no_color = args.no_color || cfg.no_color.unwrap_or(false);

    let concurrency = args
        .concurrency
        .or(cfg.concurrency)
        .unwrap_or(runner::DEFAULT_CONCURRENCY);
    if concurrency == 0 {
        return Err("invalid concurrency, expected positive integer".to_string());
    }
    let timeout_seconds = args
        .timeout
        .or(cfg.timeout)
        .unwrap_or(executor::DEFAULT_TIMEOUT_SECONDS);
    if timeout_seconds == 0 {
        return Err("invalid timeout, expected positive number of seconds".to_string());
    }

    let proxy = args
        .proxy
        .or(cfg.proxy)
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());

    let mut rules = ProbeRules::default();
    if let Some(raw) = args.methods.or(cfg.methods) {
        rules.methods = crate::utils::parse_http_methods_csv(&raw)
            .map_err(|e| format!("invalid methods '{raw}': {e}"))?;
    }
    let header_rules = if !args.header_rule.is_empty() {
        Some(args.header_rule)
    } else {
        cfg.headers
    };
    if let Some(raw) = header_rules {
        rules.headers = crate::utils::parse_header_rules(&raw)?;
    }
    let path_tricks = if !args.path_trick.is_empty() {
        Some(args.path_trick)
    } else {
        cfg.path_tricks
    };
    if let Some(raw) = path_tricks {
        rules.path_tricks = crate::utils::clean_path_tricks(&raw);
    }

    let project_dir = config::expand_tilde(args.project_dir.trim());
    let input_file = args
        .input_file
        .or(cfg.input_file)
        .map(|p| config::expand_tilde(&p));
    let output_dir = args
        .out_dir
        .or(cfg.output_dir)
        .map(|p| config::expand_tilde(&p));
    let paths = ProjectPaths::from_project_dir(&project_dir)
        .with_input_file(input_file)
        .with_output_dir(output_dir);

    let mut hosts: Vec<String> = args.host;
    if let Some(extra_hosts) = cfg.hosts {
        hosts.extend(extra_hosts);
    }

    Ok(RunConfig {
        options: Options {
            hosts,
            input_file: Some(paths.input_file.clone()),
            timeout_seconds,
            concurrency,
            proxy,
            rules,
        },
        project_dir,
        paths,
        no_color,
        verbose: args.verbose,
    })
}

fn print_run_header(run: &RunConfig) {
    let options = &run.options;
    format_kv_line("Project", &run.project_dir.display().to_string());
    format_kv_line("Input", &options_input_summary(run));
    format_kv_line("Output", &run.paths.reports.dir.display().to_string());
    format_kv_line(
        "Rules",
        &format!(
            "headers={} paths={} methods={} requests/host={}",
            options.rules.headers.len(),
            options.rules.path_tricks.len(),
            options
                .rules
                .methods
                .iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(","),
            options.rules.requests_per_candidate(),
        ),
    );
    format_kv_line(
        "HTTP",
        &format!(
            "conc={} timeout={}s redirects=false proxy={}",
            options.concurrency,
            options.timeout_seconds,
            if options.proxy.is_some() { "on" } else { "off" },
        ),
    );
    println!();
}

fn options_input_summary(run: &RunConfig) -> String {
    let mut parts = vec![run.paths.input_file.display().to_string()];
    if !run.options.hosts.is_empty() {
        parts.push(format!("inline={}", run.options.hosts.len()));
    }
    parts.join(" ")
}

/// Runs one project: creates the output directory, probes, writes both reports.
///
/// `executor` replaces the reqwest-backed executor when given.
pub async fn run_project(
    run: &RunConfig,
    executor: Option<Arc<dyn RequestExecutor>>,
    pb: ProgressBar,
) -> Result<RunOutcome, String> {
    print_run_header(run);

    output::ensure_dir(&run.paths.reports.dir)
        .await
        .map_err(|e| e.to_string())?;

    let runner = match executor {
        Some(executor) => Runner::with_executor(run.options.clone(), executor),
        None => Runner::new(run.options.clone()),
    }
    .map_err(|e| e.to_string())?
    .with_progress(pb);

    let outcome = runner.run().await.map_err(|e| e.to_string())?;
    let scan = match &outcome {
        RunOutcome::NoInput { path } => {
            let shown = path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<none>".to_string());
            info_line(&format!("no input file at {shown}, nothing to probe"));
            return Ok(outcome);
        }
        RunOutcome::Completed(scan) => scan,
    };

    output::write_reports(&run.paths.reports, &scan.findings)
        .await
        .map_err(|e| e.to_string())?;
    tracing::info!(
        json = %run.paths.reports.json.display(),
        text = %run.paths.reports.text.display(),
        "reports written"
    );

    println!();
    format_kv_line(
        "Results",
        &format!(
            "hosts={} candidates={} failed={} findings={}",
            scan.hosts,
            scan.candidates,
            scan.failed,
            scan.findings.len()
        ),
    );
    println!(
        ":: Completed :: scan took {}s :: results -> {} ::",
        scan.elapsed.as_secs(),
        run.paths.reports.dir.display()
    );

    Ok(outcome)
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }
    print_banner();

    let pb = ProgressBar::new(0);
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(200));
    pb.set_style(
        ProgressStyle::with_template(
            ":: Progress: [{pos}/{len}] :: {per_sec} :: Duration: [{elapsed_precise}] :: {msg}",
        )
        .map_err(|e| format!("failed to build progress bar style: {e}"))?
        .progress_chars(r#"#>-"#),
    );

    run_project(&run, None, pb).await?;
    Ok(())
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp => {
                print!("{}", render_custom_help());
                return Ok(());
            }
            ErrorKind::DisplayVersion => {
                let cmd = CliArgs::command();
                print!("{}", cmd.render_version());
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    let user_config_path = args.config.clone().map(|p| config::expand_tilde(&p));
    let cfg = match user_config_path.as_ref() {
        Some(path) => config::load_config(path)?,
        None => ConfigFile::default(),
    };

    let run = build_run_config(args, cfg)?;
    init_logging(run.verbose, run.no_color);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))
}
