use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use tracknote_core::config::{AppConfig, ConfigError, LoadOptions};
use tracknote_extractors::{default_registry, RegistryError};
use tracknote_slack::api::HttpSlackApi;
use tracknote_slack::router::EventRouter;
use tracknote_slack::socket::{NoopSocketTransport, ReconnectPolicy, SocketModeRunner};
use tracknote_slack::summarizer::ThreadSummarizer;

pub struct Application {
    pub config: AppConfig,
    pub runner: SocketModeRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}

pub async fn bootstrap(
    options: LoadOptions,
    cancel: CancellationToken,
) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config, cancel)
}

/// Wires the provider registry, Web API client, summarizer, router and
/// socket runner from an already-validated config. The socket transport is
/// wired as a no-op until a live Socket Mode transport is attached; the
/// event loop and every handler behind it are fully operational.
pub fn bootstrap_with_config(
    config: AppConfig,
    cancel: CancellationToken,
) -> Result<Application, BootstrapError> {
    info!("starting application bootstrap");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.resolver.timeout_secs))
        .user_agent(config.resolver.user_agent.clone())
        .build()
        .map_err(BootstrapError::HttpClient)?;

    let registry = Arc::new(default_registry(client.clone())?);
    info!(providers = registry.providers().count(), "provider registry validated");

    let api = Arc::new(HttpSlackApi::new(client, config.slack.bot_token.clone()));
    let summarizer = ThreadSummarizer::new(registry);
    let router = EventRouter::new(
        api,
        summarizer,
        config.summarizer.reply_limit,
        config.summarizer.command_keyword.clone(),
        cancel.clone(),
    );

    let runner = SocketModeRunner::new(
        Arc::new(NoopSocketTransport),
        router,
        ReconnectPolicy::default(),
        cancel,
    );

    Ok(Application { config, runner })
}
