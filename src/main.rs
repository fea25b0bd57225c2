//! web-pilot: run one natural-language browser task end to end
//!
//! Streams the visible event log while the task runs, then prints the final
//! JSON result (or error body) on stdout.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use web_pilot::agent::{Mode, OpenAiChatModel, Orchestrator};
use web_pilot::browser::ChromiumLauncher;
use web_pilot::events::{EventHub, EventKind, EventSource, EventSubscriber};
use web_pilot::session::SessionRegistry;
use web_pilot::{RequestConfig, TaskRequest, load_yaml_config};

#[derive(Parser)]
#[command(name = "web-pilot")]
#[command(about = "Natural-language web task automation over a headless browser")]
#[command(version)]
struct Cli {
    /// What to do, e.g. "Go to example.com and read the page title"
    task: String,

    /// One policy with every tool instead of routed specialists
    #[arg(long)]
    unified: bool,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Model name override
    #[arg(long)]
    model: Option<String>,

    /// Navigation timeout override in milliseconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("web_pilot=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = load_yaml_config().context("Failed to load config")?;
    if cli.unified {
        config.mode = Mode::Unified;
    }

    let api_key = config
        .model
        .api_key
        .clone()
        .context("OPENAI_API_KEY is not set")?;
    let model = OpenAiChatModel::new(
        api_key,
        config.model.base_url.as_deref(),
        config.model.model.clone(),
        config.model.temperature,
        config.model.max_tokens,
        Duration::from_secs(config.model.llm_timeout_secs),
    );

    let sessions = Arc::new(SessionRegistry::new(
        Arc::new(ChromiumLauncher),
        config.image_store(),
        config.action_timeouts()?,
    ));
    let hub = Arc::new(EventHub::new(config.event_config()));
    let orchestrator = Arc::new(Orchestrator::new(
        sessions,
        hub.clone(),
        Arc::new(model),
        config.orchestrator_settings()?,
    ));

    let request = TaskRequest::new(cli.task).with_config(RequestConfig {
        model: cli.model,
        headless: cli.headed.then_some(false),
        timeout: cli.timeout,
        ..Default::default()
    });

    let task = match orchestrator.prepare(request) {
        Ok(task) => task,
        Err(failure) => {
            println!("{}", serde_json::to_string_pretty(&failure.to_response())?);
            std::process::exit(2);
        }
    };
    let session_id = task.session_id().to_string();
    info!(session_id = %session_id, plan = ?task.plan, "Running task");

    let source: Arc<dyn EventSource> = hub.clone();
    let subscriber = Arc::new(EventSubscriber::new(
        source,
        session_id.clone(),
        config.event_config().reconnect_backoff,
    ));
    let follower = {
        let subscriber = subscriber.clone();
        tokio::spawn(async move {
            let printed = subscriber
                .run(|event| match event.kind {
                    EventKind::Connected => {}
                    _ => eprintln!("[{:?}] {}", event.kind, event.message),
                })
                .await;
            if let Err(e) = printed {
                error!(error = %e, "Event stream ended");
            }
        })
    };

    let outcome = tokio::select! {
        outcome = orchestrator.execute(task) => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, closing browsers");
            orchestrator.shutdown().await;
            subscriber.stop();
            std::process::exit(130);
        }
    };

    // The hub ends the stream once the task finishes
    let _ = follower.await;

    match outcome {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(failure) => {
            println!("{}", serde_json::to_string_pretty(&failure.to_response())?);
            std::process::exit(1);
        }
    }
}
