//! Command-line entry point for the chatline client.

use anyhow::Context;
use chatline_config::{ChatlineConfig, LayeredConfigOptions};
use chatline_core::store::default_data_dir;
use chatline_core::{ChatController, ControllerSettings, HttpTransport, SessionStore, open_store};
use chatline_tui::{EventBus, PrintSink, TuiConfig, run, run_prompt};
use clap::Parser;
use log::{LevelFilter, debug, info};
use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;

const LOG_FILE: &str = "chatline.log";
const EVENT_BUFFER: usize = 1024;

/// Command-line options for chatline.
#[derive(Parser)]
#[command(name = "chatline", version)]
struct Cli {
    /// Extra chatline.json5 config layer, applied after user and cwd layers
    #[arg(long)]
    config: Vec<PathBuf>,
    /// Chat endpoint URL
    #[arg(long)]
    endpoint: Option<String>,
    /// Directory holding persisted history and the log file
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Keep history in memory only
    #[arg(long)]
    no_persist: bool,
    /// Send a single prompt, print the reply and exit
    #[arg(long)]
    prompt: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);
    info!(
        "starting chatline (config_layers={}, endpoint_set={}, one_shot={})",
        cli.config.len(),
        cli.endpoint.is_some(),
        cli.prompt.is_some()
    );

    let config = load_config(&cli)?;
    let store = open_store(&config.storage).context("failed to open storage")?;
    let session = SessionStore::new(store, &config.storage);
    let transport = Arc::new(
        HttpTransport::from_config(&config).context("failed to build chat transport")?,
    );
    let settings = ControllerSettings::from(&config);

    if let Some(prompt) = cli.prompt.as_deref() {
        let mut controller = ChatController::new(session, Arc::new(PrintSink::stdout()), settings);
        return run_prompt(&mut controller, transport, prompt).await;
    }

    let events = EventBus::new(EVENT_BUFFER);
    let controller = ChatController::new(session, Arc::new(events.clone()), settings);
    let tui_config = TuiConfig {
        endpoint: config.endpoint.clone(),
        storage: storage_label(&config),
    };
    run(controller, transport, events, tui_config).await
}

/// Load layered config and apply command-line overrides.
fn load_config(cli: &Cli) -> anyhow::Result<ChatlineConfig> {
    let cwd = std::env::current_dir().context("failed to resolve current working directory")?;
    let mut options = LayeredConfigOptions::new(&cwd);
    for path in &cli.config {
        options = options.with_runtime_path(path);
    }
    let layered = ChatlineConfig::load_layered_with_options(options)
        .context("failed to load layered config")?;
    debug!("layered config loaded (layers={})", layered.layers.len());

    let mut config = layered.config;
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(dir) = &cli.data_dir {
        config.storage.path = Some(dir.to_string_lossy().into_owned());
    }
    if cli.no_persist {
        config.storage.enabled = false;
    }
    config
        .validate()
        .context("invalid config after command-line overrides")?;
    Ok(config)
}

/// Log to stderr in one-shot mode and to a file under the data dir otherwise.
fn init_logging(cli: &Cli) {
    let mut builder = env_logger::builder();
    builder.format_timestamp_millis().parse_default_env();
    if cli.prompt.is_none() {
        match open_log_file(cli) {
            Some(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            None => {
                builder.filter_level(LevelFilter::Off);
            }
        }
    }
    let _ = builder.try_init();
}

fn open_log_file(cli: &Cli) -> Option<File> {
    let dir = cli
        .data_dir
        .clone()
        .or_else(|| default_data_dir().ok())?;
    fs::create_dir_all(&dir).ok()?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE))
        .ok()
}

fn storage_label(config: &ChatlineConfig) -> String {
    if !config.storage.enabled {
        return "memory".to_string();
    }
    match &config.storage.path {
        Some(path) => path.clone(),
        None => default_data_dir()
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|_| "unavailable".to_string()),
    }
}
