use crate::cli::args::CliArgs;

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if args.project_dir.trim().is_empty() {
        return Err("project directory is empty".to_string());
    }
    if let Some(concurrency) = args.concurrency {
        if concurrency == 0 {
            return Err("invalid concurrency, expected positive integer".to_string());
        }
    }
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid timeout, expected positive number of seconds".to_string());
        }
    }
    if let Some(raw) = args.methods.as_deref() {
        crate::utils::parse_http_methods_csv(raw)
            .map_err(|e| format!("invalid --methods '{raw}': {e}"))?;
    }
    for raw in args.header_rule.iter() {
        crate::prober::HeaderRule::parse(raw)
            .map_err(|e| format!("invalid --header-rule '{raw}': {e}"))?;
    }
    Ok(())
}
