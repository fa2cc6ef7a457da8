use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::info;

use iris_ask::api::ApiError;
use iris_ask::api::http::HttpBackend;
use iris_ask::chat::ChatSession;
use iris_ask::config::{
    ClientConfig, ConfigError, DEFAULT_API_URL, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_DASHBOARD_ID,
    DEFAULT_REQUEST_TIMEOUT_SECS, ServiceConfig, Timeouts,
};
use iris_ask::llm::config::LlmConfig;
use iris_ask::llm::{LlmClient, LlmError};
use iris_ask::repl;
use iris_ask::schema::{self, SchemaConfig, SchemaError};
use iris_ask::server::metabase::{MetabaseClient, MetabaseError};
use iris_ask::server::{self, ServiceState};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("LLM setup failed: {0}")]
    Llm(#[from] LlmError),
    #[error("Metabase setup failed: {0}")]
    Metabase(#[from] MetabaseError),
    #[error("API client setup failed: {0}")]
    Api(#[from] ApiError),
    #[error("schema export failed: {0}")]
    Schema(#[from] SchemaError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "iris-ask", about = "Ask questions about your data and get SQL queries instantly")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive chat against a running SQL service.
    Chat(ChatArgs),
    /// Run the SQL service (LLM text-to-SQL + Metabase).
    Serve,
    /// Export the schema context file from Postgres.
    Schema(SchemaArgs),
}

#[derive(Args, Debug)]
struct ChatArgs {
    #[arg(long, env = "IRIS_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    #[arg(long, env = "IRIS_DASHBOARD_ID", default_value_t = DEFAULT_DASHBOARD_ID)]
    dashboard_id: i64,

    #[arg(long, env = "IRIS_REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    request_timeout_secs: u64,

    #[arg(long, env = "IRIS_CONNECT_TIMEOUT_SECS", default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    connect_timeout_secs: u64,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Overrides `SCHEMA_NAME`.
    #[arg(long)]
    schema: Option<String>,

    /// Overrides `SCHEMA_CONTEXT_PATH`.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    // Missing .env is fine; real env vars still apply.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // The chat transcript owns stdout; logs go to stderr and stay quiet.
    let max_level = match cli.command {
        Command::Chat(_) => tracing::Level::WARN,
        Command::Serve | Command::Schema(_) => tracing::Level::INFO,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(max_level)
        .init();

    match cli.command {
        Command::Chat(args) => run_chat(args).await,
        Command::Serve => run_serve().await,
        Command::Schema(args) => run_schema(args).await,
    }
}

async fn run_chat(args: ChatArgs) -> Result<(), CliError> {
    let mut config = ClientConfig::new(&args.api_url);
    config.dashboard_id = args.dashboard_id;
    config.timeouts = Timeouts { request_secs: args.request_timeout_secs, connect_secs: args.connect_timeout_secs };

    let backend = HttpBackend::new(&config)?;
    let (session, mut notices) = ChatSession::new(Arc::new(backend), config.dashboard_id);

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    repl::run(&session, &mut notices, stdin, &mut stdout).await?;
    Ok(())
}

async fn run_serve() -> Result<(), CliError> {
    let config = ServiceConfig::from_env()?;
    let llm_config = LlmConfig::from_env()?;
    let max_tokens = llm_config.max_tokens;
    let llm = LlmClient::from_config(llm_config)?;
    let model = llm.model().to_string();
    let metabase = MetabaseClient::new(&config.metabase)?;

    let state = ServiceState {
        llm: Arc::new(llm),
        metabase: Arc::new(metabase),
        schema_context_path: config.schema_context_path.clone(),
        schema_name: config.schema_name.clone(),
        max_tokens,
        attach_to_dashboard: config.metabase.attach_to_dashboard,
    };
    let app = server::app(state, server::cors_layer(&config.cors_allow_origin)?);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(port = config.port, %model, schema = %config.schema_name, "iris-ask service listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_schema(args: SchemaArgs) -> Result<(), CliError> {
    let mut config = SchemaConfig::from_env()?;
    if let Some(schema) = args.schema {
        config.schema_name = schema;
    }
    if let Some(output) = args.output {
        config.output_path = output;
    }

    let path = schema::export(&config).await?;
    println!("Schema context exported to {}", path.display());
    Ok(())
}
