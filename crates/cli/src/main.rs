use pipegen_cli::cli::commands::{CliArgs, Commands, InitArgs, LogFormat};
use pipegen_cli::cli::output::{write_atomically, OutputFormat, OutputFormatter};
use pipegen_cli::cli::prompt::TerminalPrompt;
use pipegen_cli::{NAME, VERSION};
use pipegen_core::{cancel_pair, InitError, Settings};
use pipegen_pipeline::{InitOutcome, PipelineOrchestrator};

use clap::Parser;
use std::env;
use std::process;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CRATE_TARGETS: &[&str] = &[
    "pipegen",
    "pipegen_cli",
    "pipegen_core",
    "pipegen_stack",
    "pipegen_pipeline",
];

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("{} v{} starting", NAME, VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match args.command {
        Commands::Init(init_args) => handle_init(init_args, args.quiet, args.log_format).await,
    };

    process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let level = if let Some(level_str) = &args.log_level {
            parse_level(level_str)
        } else if args.verbose {
            Level::DEBUG
        } else if args.quiet {
            Level::ERROR
        } else {
            parse_level(&Settings::default().log_level)
        };

        let mut filter = EnvFilter::from_default_env();

        if env::var("RUST_LOG").is_err() {
            for target in CRATE_TARGETS {
                if let Ok(directive) = format!("{}={}", target, level).parse() {
                    filter = filter.add_directive(directive);
                }
            }
        }

        let registry = tracing_subscriber::registry().with(filter);
        match args.log_format {
            LogFormat::Json => registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init(),
            LogFormat::Text => registry
                .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
                .init(),
        }
    });
}

fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

fn report_error(err: &InitError) -> i32 {
    error!("Init failed: {}", err);
    eprintln!("Error: {}", err);
    if let Some(help) = err.help_message() {
        eprintln!("\n{}", help);
    }
    err.exit_code()
}

async fn handle_init(args: InitArgs, quiet: bool, log_format: LogFormat) -> i32 {
    let config = args.into_config();
    let interactive = !config.force
        && !config.analyze
        && atty::is(atty::Stream::Stdin)
        && atty::is(atty::Stream::Stdout);
    debug!(interactive, "Prompting for ambiguous images");

    let (cancel_handle, cancel) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            cancel_handle.cancel();
        }
    });

    let mut orchestrator = PipelineOrchestrator::new(config).with_cancel(cancel);
    if interactive {
        let root = match orchestrator.project_root() {
            Ok(root) => root,
            Err(e) => return report_error(&e),
        };
        orchestrator = orchestrator.with_interaction(Box::new(TerminalPrompt::stdio(root)));
    }

    let outcome = match orchestrator.execute().await {
        Ok(outcome) => outcome,
        Err(e) => return report_error(&e),
    };

    match outcome {
        InitOutcome::Analysis(report) => match report.to_json() {
            Ok(json) => {
                println!("{}", json);
                0
            }
            Err(e) => report_error(&InitError::Serialization(e.to_string())),
        },
        InitOutcome::Generated {
            config: pipeline,
            report,
            target,
        } => {
            let yaml = match pipeline.to_yaml() {
                Ok(yaml) => yaml,
                Err(e) => return report_error(&InitError::Serialization(e.to_string())),
            };

            if target.as_os_str() == "-" {
                print!("{}", yaml);
            } else if let Err(e) = write_atomically(&target, &yaml) {
                return report_error(&e);
            } else {
                info!(target = %target.display(), "Wrote pipeline config");
            }

            if !quiet {
                let format = match log_format {
                    LogFormat::Json => OutputFormat::Json,
                    LogFormat::Text => OutputFormat::Human,
                };
                match OutputFormatter::new(format).format_report(&report, &target) {
                    Ok(summary) => eprint!("{}", summary),
                    Err(e) => warn!("Failed to format summary: {}", e),
                }
            }
            0
        }
    }
}
