// src/lib.rs

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub mod api;
pub mod clipboard;
pub mod commands;
pub mod db;
pub mod error;
pub mod interaction;
pub mod messages;
pub mod models;
pub mod session;
pub mod settings;
pub mod state;
pub mod think;
pub mod types;

pub use api::ApiClient;
pub use commands::{CopyOutcome, RequestHandle};
pub use db::{MemoryStorage, SqliteStorage, Storage};
pub use error::{PlaygroundError, Result};
pub use interaction::{HeadlessInteraction, Interaction, Notice, NoticeLevel};
pub use state::PlaygroundState;

const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Installs the fmt subscriber filtered by `RUST_LOG` (default `info`).
/// Calling it again is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Sends one prompt to the playground and prints the reply.
#[derive(Parser, Debug)]
#[command(name = "chat-playground", version, about, long_about = None)]
struct CliArgs {
    /// Wait for the whole reply in a single response
    #[arg(long, conflicts_with = "stream")]
    no_stream: bool,

    /// Stream the reply (the default unless the saved config says otherwise)
    #[arg(long)]
    stream: bool,

    /// Attach a local image; repeat for several
    #[arg(long = "image", value_name = "PATH")]
    images: Vec<PathBuf>,

    /// Prompt text
    #[arg(required = true, trailing_var_arg = true)]
    prompt: Vec<String>,
}

impl CliArgs {
    fn stream_override(&self) -> Option<bool> {
        match (self.stream, self.no_stream) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    fn prompt_text(&self) -> String {
        self.prompt.join(" ")
    }
}

fn api_from_env() -> ApiClient {
    let base_url =
        std::env::var("PLAYGROUND_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    let mut api = ApiClient::new(base_url);
    if let Ok(user_id) = std::env::var("PLAYGROUND_USER_ID") {
        api = api.with_user_id(user_id);
    }
    if let Ok(token) = std::env::var("PLAYGROUND_ACCESS_TOKEN") {
        api = api.with_access_token(token);
    }
    api
}

async fn run_prompt(args: CliArgs) -> Result<()> {
    let db_path = settings::default_db_path()?;
    info!(path = %db_path.display(), "opening playground store");
    let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::open(&db_path)?);

    let state = PlaygroundState::new(api_from_env(), storage);

    let stream = args.stream_override();
    let mut image_urls = Vec::new();
    for path in &args.images {
        image_urls.push(messages::image_data_url(path)?);
    }
    state.update_inputs(|inputs| {
        if let Some(stream) = stream {
            inputs.stream = stream;
        }
        if !image_urls.is_empty() {
            inputs.image_enabled = true;
            inputs.image_urls = image_urls;
        }
    });

    let handle = state.send_message(&args.prompt_text())?;

    let stopper = state.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, stopping generation");
            stopper.stop_generator();
        }
    });

    handle.finished().await;
    interrupt.abort();

    if let Some(reply) = state.messages().last() {
        if let Some(reasoning) = reply.reasoning_content.as_deref().filter(|r| !r.is_empty()) {
            println!("[reasoning]\n{reasoning}\n");
        }
        println!("{}", messages::get_text_content(reply));
    }

    state.flush_messages().await;
    state.flush_config()?;
    Ok(())
}

/// Entry point of the `chat-playground` binary.
pub fn run() {
    init_tracing();

    let args = CliArgs::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run_prompt(args)) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
