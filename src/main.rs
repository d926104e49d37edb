//! Command-line client for the workshop API.

use std::error::Error;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use reqwest::Method;
use tokio::io::{AsyncBufReadExt, BufReader};

use workshop_client::assistant::{ChatClient, Conversation};
use workshop_client::config::{self, watcher::ConfigWatcher, ClientConfig};
use workshop_client::http::{Endpoint, HttpExecutor, RequestError};
use workshop_client::observability::{logging, metrics};
use workshop_client::resilience::CircuitBreaker;

#[derive(Parser)]
#[command(name = "workshop-cli")]
#[command(about = "Resilient client for the workshop management API", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one request through the circuit breaker and retry executor
    Fetch {
        url: String,

        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Extra header as "name: value" (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Request body
        #[arg(short, long)]
        data: Option<String>,
    },
    /// Chat with the AI assistant, one message per line
    Chat {
        /// Reload retry and timeout settings when the config file changes
        #[arg(long)]
        watch: bool,
    },
    /// Validate the configuration and print the effective settings
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    let cli = Cli::parse();
    let config = config::load_or_default(cli.config.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::debug!(config = ?cli.config, "Configuration loaded");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    match cli.command {
        Commands::Fetch {
            url,
            method,
            headers,
            data,
        } => fetch(&config, &url, &method, &headers, data).await,
        Commands::Chat { watch } => {
            chat(&config, cli.config.as_deref(), watch).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::CheckConfig => {
            let mut shown = config.clone();
            if shown.assistant.api_key.is_some() {
                shown.assistant.api_key = Some("********".to_string());
            }
            println!("{}", toml::to_string_pretty(&shown)?);
            eprintln!("Configuration OK");
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn fetch(
    config: &ClientConfig,
    url: &str,
    method: &str,
    headers: &[String],
    data: Option<String>,
) -> Result<ExitCode, Box<dyn Error>> {
    let method = Method::from_bytes(method.to_uppercase().as_bytes())?;
    let mut endpoint = Endpoint::new(method, url)?;
    for header in headers {
        let (name, value) = parse_header(header)?;
        endpoint = endpoint.header(name, value)?;
    }
    if let Some(data) = data {
        endpoint = endpoint.body(data);
    }

    let executor = HttpExecutor::from_config(config)?;
    let breaker = CircuitBreaker::new("fetch", config.circuit_breaker.clone());

    match breaker
        .execute(|| executor.execute_text(&endpoint))
        .await
        .map_err(RequestError::from)
    {
        Ok((status, body)) => {
            eprintln!("{}", status);
            println!("{}", body);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Error [{}]: {}", e.code(), e);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn chat(config: &ClientConfig, path: Option<&Path>, watch: bool) -> Result<(), Box<dyn Error>> {
    let executor = Arc::new(HttpExecutor::from_config(config)?);
    let breaker = Arc::new(CircuitBreaker::new("assistant", config.circuit_breaker.clone()));
    let client = ChatClient::new(config.assistant.clone(), executor.clone(), breaker)?;

    // Kept alive for the whole session; dropping it stops the watch.
    let _watcher = match (watch, path) {
        (true, Some(path)) => {
            let (watcher, mut updates) = ConfigWatcher::new(path, config.clone());
            let handle = watcher.run()?;
            let executor = executor.clone();
            tokio::spawn(async move {
                while let Some(new_config) = updates.recv().await {
                    executor.reload(new_config.retries, new_config.timeouts);
                }
            });
            Some(handle)
        }
        (true, None) => {
            tracing::warn!("--watch requires --config, not watching");
            None
        }
        (false, _) => None,
    };

    eprintln!("Chatting with {} (/reset clears history, Ctrl+D quits)", client.url());
    let mut conversation = Conversation::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message == "/reset" {
            conversation.clear();
            eprintln!("(history cleared)");
            continue;
        }
        match conversation.ask(&client, message).await {
            Ok(reply) => println!("{}", reply),
            Err(e) => eprintln!("[{}] {}", e.code(), e),
        }
    }

    Ok(())
}

/// Split a `name: value` header argument.
fn parse_header(raw: &str) -> Result<(&str, &str), String> {
    raw.split_once(':')
        .map(|(name, value)| (name.trim(), value.trim()))
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| format!("invalid header '{}', expected 'name: value'", raw))
}
