mod api;
mod config;
mod models;
mod provider;
mod registry;
mod routes;
mod services;
mod state;
mod store;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use crate::provider::config::ProviderTimeouts;
use crate::provider::fal::FalClient;
use crate::registry::ModelRegistry;
use crate::services::conversation::{ConversationController, EditTurn};
use crate::services::proxy_client::{DEFAULT_PROXY_URL, ProxyClient};
use crate::store::{DEFAULT_DB_FILE, Store};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("model registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("provider error: {0}")]
    Provider(#[from] provider::ProviderError),
    #[error("proxy error: {0}")]
    Proxy(#[from] services::conversation::GenerationError),
    #[error("{0}")]
    Controller(#[from] services::conversation::ControllerError),
    #[error("storage error: {0}")]
    Store(#[from] store::StoreError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("no source image; pass --image or continue a conversation that has an edited image")]
    MissingImage,
    #[error("conversation not found: {0}")]
    NotFound(Uuid),
}

#[derive(Parser, Debug)]
#[command(name = "image-editor", about = "AI image editing proxy and local conversation client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the generation proxy (`POST /api/generate-image`).
    Serve,
    /// Edit an image as one conversation turn.
    Edit(EditCommand),
    /// Inspect or delete stored conversations.
    Conversations(ConversationsCommand),
    /// List the models the proxy accepts.
    Models(ProxyArgs),
}

#[derive(Args, Debug)]
struct StoreArgs {
    #[arg(long, env = "IMAGE_EDITOR_DB", default_value = DEFAULT_DB_FILE)]
    db: PathBuf,
}

#[derive(Args, Debug)]
struct ProxyArgs {
    #[arg(long, env = "IMAGE_EDITOR_PROXY_URL", default_value = DEFAULT_PROXY_URL)]
    proxy_url: String,
}

#[derive(Args, Debug)]
struct EditCommand {
    #[command(flatten)]
    store: StoreArgs,
    #[command(flatten)]
    proxy: ProxyArgs,
    #[arg(long, env = "FAL_KEY", hide_env_values = true)]
    fal_key: String,
    #[arg(long)]
    prompt: String,
    /// Image URL, data URI, or local file. Defaults to the conversation's latest edit.
    #[arg(long)]
    image: Option<String>,
    #[arg(long, default_value = "fast-edit")]
    model: String,
    /// Continue this conversation instead of starting a new one.
    #[arg(long)]
    conversation: Option<Uuid>,
}

#[derive(Args, Debug)]
struct ConversationsCommand {
    #[command(flatten)]
    store: StoreArgs,
    #[command(flatten)]
    proxy: ProxyArgs,
    #[command(subcommand)]
    command: ConversationsSubcommand,
}

#[derive(Subcommand, Debug)]
enum ConversationsSubcommand {
    List,
    Show { id: Uuid },
    Delete { id: Uuid },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Serve => serve().await,
        Command::Edit(cmd) => edit(cmd).await,
        Command::Conversations(cmd) => conversations(cmd).await,
        Command::Models(args) => models(args).await,
    }
}

// =============================================================================
// SERVER
// =============================================================================

async fn serve() -> Result<(), CliError> {
    let config = config::ServerConfig::from_env()?;
    let registry = ModelRegistry::load(config.registry_path.as_deref())?;
    tracing::info!(models = registry.list().count(), "model registry loaded");

    let editor = FalClient::new(&config.provider)?;
    let state = state::AppState::new(registry, Arc::new(editor)).with_body_limit(config.max_body_bytes);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;

    tracing::info!(port = config.port, max_body_bytes = config.max_body_bytes, "image-editor proxy listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// =============================================================================
// CLIENT
// =============================================================================

async fn edit(cmd: EditCommand) -> Result<(), CliError> {
    let store = Store::open(&cmd.store.db).await?;
    let client = ProxyClient::new(&cmd.proxy.proxy_url, ProviderTimeouts::default())?;
    let mut controller = ConversationController::new(store, Arc::new(client));

    match cmd.conversation {
        Some(id) => {
            controller.open(id).await?;
        }
        None => {
            controller.start_new();
        }
    }

    let image_url = match cmd.image.as_deref() {
        Some(raw) => source_image_ref(raw)?,
        None => controller
            .latest_image_url()
            .map(str::to_string)
            .ok_or(CliError::MissingImage)?,
    };

    let turn = controller
        .submit(EditTurn { prompt: cmd.prompt, image_url, model: cmd.model, credential: cmd.fal_key })
        .await;

    let title = controller.current().map_or("", |c| c.title.as_str());
    println!("conversation {} ({title})", turn.conversation_id);
    println!("> {}", turn.user_message.content);
    match &turn.image {
        Some(image) => println!("{}", image.url),
        None => println!("{}", turn.reply.content),
    }
    for err in &turn.storage_errors {
        eprintln!("warning: {err}");
    }

    controller.into_store().close().await;
    if turn.succeeded() { Ok(()) } else { Err(turn.generation_error.map_or(CliError::MissingImage, CliError::Proxy)) }
}

async fn conversations(cmd: ConversationsCommand) -> Result<(), CliError> {
    let store = Store::open(&cmd.store.db).await?;
    let client = ProxyClient::new(&cmd.proxy.proxy_url, ProviderTimeouts::default())?;
    let mut controller = ConversationController::new(store, Arc::new(client));

    let result = match cmd.command {
        ConversationsSubcommand::List => list_conversations(&controller).await,
        ConversationsSubcommand::Show { id } => show_conversation(&mut controller, id).await,
        ConversationsSubcommand::Delete { id } => match controller.delete(id).await {
            Ok(true) => {
                println!("deleted {id}");
                Ok(())
            }
            Ok(false) => Err(CliError::NotFound(id)),
            Err(e) => Err(e.into()),
        },
    };
    controller.into_store().close().await;
    result
}

async fn list_conversations(controller: &ConversationController) -> Result<(), CliError> {
    for conversation in controller.list().await? {
        println!(
            "{}\t{}\t{} messages\t{} images",
            conversation.id,
            conversation.title,
            conversation.messages.len(),
            conversation.images.len()
        );
    }
    Ok(())
}

async fn show_conversation(controller: &mut ConversationController, id: Uuid) -> Result<(), CliError> {
    let conversation = controller.open(id).await?;
    println!("{}", serde_json::to_string_pretty(conversation)?);
    Ok(())
}

async fn models(args: ProxyArgs) -> Result<(), CliError> {
    let client = ProxyClient::new(&args.proxy_url, ProviderTimeouts::default())?;
    for model in client.list_models().await? {
        println!("{}\t{}", model.name, model.endpoint);
    }
    Ok(())
}

/// URLs and data URIs pass through; anything else is read as a local file
/// and inlined as a base64 data URI.
fn source_image_ref(raw: &str) -> Result<String, CliError> {
    let trimmed = raw.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") || trimmed.starts_with("data:") {
        return Ok(trimmed.to_string());
    }
    let path = Path::new(trimmed);
    let bytes = std::fs::read(path)?;
    Ok(format!("data:{};base64,{}", mime_for_path(path), BASE64.encode(bytes)))
}

fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png",
    }
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
