//! xml-verdict command-line entry point.

use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error};

use xml_verdict::cli::Cli;
use xml_verdict::config::ConfigManager;
use xml_verdict::logger::ErrorLogger;
use xml_verdict::logging::{LogConfig, init_logging};
use xml_verdict::{AuditConfig, AuditEngine, Checker, FileDiscovery, Output, settings};

const EXIT_FAILURES: u8 = 1;
const EXIT_FATAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    let log_config = LogConfig::from_flags(cli.verbose, cli.quiet).with_format(cli.log_format);
    if let Err(e) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {e}");
        return ExitCode::from(EXIT_FATAL);
    }

    match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_FAILURES),
        Err(e) => {
            error!(error = %e, "fatal");
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

/// Returns whether every file passed.
async fn run(cli: &Cli) -> Result<bool> {
    cli.validate().map_err(|msg| anyhow!(msg))?;

    let mode = cli.mode()?;
    let config_path = ConfigManager::find_config_file(cli.config.as_deref())?;
    debug!(config = %config_path.display(), %mode, "configuration located");
    let settings = settings::init(&config_path, mode)
        .with_context(|| format!("loading settings from {}", config_path.display()))?;

    let discovery = FileDiscovery::new()
        .with_extensions(cli.get_extensions())
        .with_include_patterns(cli.include_patterns.clone())?
        .with_exclude_patterns(cli.exclude_patterns.clone())?
        .with_max_depth(cli.max_depth());

    let engine = AuditEngine::new(
        Checker::new(),
        AuditConfig {
            max_concurrent_validations: cli.get_thread_count(),
        },
    );
    let report = engine.audit_paths(&cli.paths, &discovery).await?;

    ErrorLogger::new(settings.log_filename())
        .write(report.failure_records())
        .with_context(|| {
            format!(
                "writing failure log {}",
                settings.log_filename().display()
            )
        })?;

    let rendered = Output::new(cli.format, cli.verbosity()).render(&report)?;
    print!("{rendered}");
    if !rendered.ends_with('\n') {
        println!();
    }

    Ok(report.all_passing())
}
