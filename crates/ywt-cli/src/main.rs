//! `ywt` - multi-persona YWT analysis from the command line

mod report;
mod settings;

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use settings::{FileConfig, Overrides};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use ywt_core::{Orchestrator, WorkflowError};
use ywt_llm::{chat_capabilities, OpenAiChat};

const EXIT_FAILURE: u8 = 1;
const EXIT_CANCELLED: u8 = 130;

fn cli() -> Command {
    Command::new("ywt")
        .version(ywt_core::VERSION)
        .about("Multi-persona Y/W/T retrospective analysis")
        .subcommand_required(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines on stderr"),
        )
        .subcommand(
            Command::new("run")
                .about("Generate personas and run the Y, W and T phases for a topic")
                .arg(
                    Arg::new("topic")
                        .long("topic")
                        .required(true)
                        .help("Topic to analyze"),
                )
                .arg(
                    Arg::new("personas")
                        .long("personas")
                        .value_parser(value_parser!(usize))
                        .help("Number of personas to generate [default: 5]"),
                )
                .arg(
                    Arg::new("step-limit")
                        .long("step-limit")
                        .value_parser(value_parser!(usize))
                        .help("Maximum number of state transitions [default: 1000]"),
                )
                .arg(
                    Arg::new("timeout-secs")
                        .long("timeout-secs")
                        .value_parser(value_parser!(u64))
                        .help("Overall run timeout in seconds [default: 600]"),
                )
                .arg(
                    Arg::new("no-timeout")
                        .long("no-timeout")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("timeout-secs")
                        .help("Run without an overall deadline"),
                )
                .arg(
                    Arg::new("concurrency")
                        .long("concurrency")
                        .value_parser(value_parser!(usize))
                        .help("Maximum concurrent persona analyses per phase [default: 1]"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML file with [run] and [llm] tables"),
                )
                .arg(
                    Arg::new("model")
                        .long("model")
                        .env("YWT_MODEL")
                        .help("Chat model name [default: gpt-4]"),
                )
                .arg(
                    Arg::new("api-key")
                        .long("api-key")
                        .env("OPENAI_API_KEY")
                        .hide_env_values(true)
                        .hide(true),
                )
                .arg(
                    Arg::new("base-url")
                        .long("base-url")
                        .env("OPENAI_BASE_URL")
                        .help("OpenAI-compatible API root"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the full result as JSON"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn,ywt_core=info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn overrides(args: &ArgMatches) -> Overrides {
    Overrides {
        personas: args.get_one::<usize>("personas").copied(),
        step_limit: args.get_one::<usize>("step-limit").copied(),
        timeout_secs: args.get_one::<u64>("timeout-secs").copied(),
        no_timeout: args.get_flag("no-timeout"),
        concurrency: args.get_one::<usize>("concurrency").copied(),
        model: args.get_one::<String>("model").cloned(),
        api_key: args.get_one::<String>("api-key").cloned(),
        base_url: args.get_one::<String>("base-url").cloned(),
    }
}

async fn run(args: &ArgMatches) -> anyhow::Result<ExitCode> {
    let file = match args.get_one::<PathBuf>("config") {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let config = overrides(args).apply(file)?;
    let topic = args
        .get_one::<String>("topic")
        .context("--topic is required")?;

    let model = OpenAiChat::new(config.llm).context("cannot create chat client")?;
    let orchestrator = Orchestrator::new(chat_capabilities(Arc::new(model)), config.run);

    let token = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling run");
            token.cancel();
        }
    });

    match orchestrator.run(topic).await {
        Ok(outcome) => {
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print!("{}", report::render_text(&outcome));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => Ok(ExitCode::from(report_failure(&err))),
    }
}

/// Print the failure and pick the exit status
fn report_failure(err: &WorkflowError) -> u8 {
    match err.location() {
        Some(location) => eprintln!("error [{}] at {location}: {err}", err.kind()),
        None => eprintln!("error [{}]: {err}", err.kind()),
    }
    if err.is_retryable() {
        eprintln!("the failure looks transient; retrying may succeed");
    }
    if err.is_cancelled() {
        EXIT_CANCELLED
    } else {
        EXIT_FAILURE
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let result = match matches.subcommand() {
        Some(("run", args)) => run(args).await,
        _ => Ok(ExitCode::from(EXIT_FAILURE)),
    };

    result.unwrap_or_else(|err| {
        eprintln!("error: {err:#}");
        ExitCode::from(EXIT_FAILURE)
    })
}
