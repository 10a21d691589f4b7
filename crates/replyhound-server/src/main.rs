mod api;
mod middleware;
mod scheduler;
mod state;
mod telegram;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use replyhound_core::{AppConfig, Messenger, ReplyPoster};
use replyhound_pipeline::memory::RecordingMessenger;
use replyhound_sources::{
    AlertsClient, RedditClient, RedditCredentials, RedditPoster, RedditPosterCredentials,
};
use tracing_subscriber::EnvFilter;

use crate::{
    api::build_app,
    middleware::WebhookAuth,
    scheduler::FeedSource,
    state::{build_state, Backends, Transports},
    telegram::TelegramClient,
};

const SOURCE_TIMEOUT_SECS: u64 = 20;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = replyhound_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = replyhound_db::PoolConfig::from_app_config(&config);
    let pool = replyhound_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = replyhound_db::run_migrations(&pool).await?;
    tracing::info!(applied, "database migrations complete");

    let state = build_state(&config, Backends::postgres(pool), transports(&config)?);
    let auth = WebhookAuth::from_config(&config)?;

    let _scheduler =
        scheduler::build_scheduler(state.clone(), &config, sources(&config)?).await?;

    let app = build_app(state, auth);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, env = %config.env, "replyhound-server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn transports(config: &AppConfig) -> anyhow::Result<Transports> {
    let model = Arc::new(replyhound_ai::OpenAiLeadModel::from_app_config(config)?);

    let messenger: Arc<dyn Messenger> = match TelegramClient::from_config(config)? {
        Some(client) => Arc::new(client),
        None => {
            tracing::warn!("TELEGRAM_BOT_TOKEN not set: notifications are only logged");
            Arc::new(RecordingMessenger::new())
        }
    };

    let poster: Option<Arc<dyn ReplyPoster>> = match (
        &config.reddit_client_id,
        &config.reddit_client_secret,
        &config.reddit_username,
        &config.reddit_password,
    ) {
        (Some(client_id), Some(client_secret), Some(username), Some(password)) => {
            let credentials = RedditPosterCredentials {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
                username: username.clone(),
                password: password.clone(),
            };
            Some(Arc::new(RedditPoster::new(
                &config.reddit_user_agent,
                credentials,
            )?))
        }
        _ => {
            tracing::info!("reddit posting credentials not set: direct posting disabled");
            None
        }
    };

    Ok(Transports {
        model,
        messenger,
        poster,
    })
}

fn sources(config: &AppConfig) -> anyhow::Result<Vec<Arc<dyn FeedSource>>> {
    let credentials = config
        .reddit_client_id
        .clone()
        .zip(config.reddit_client_secret.clone())
        .map(|(client_id, client_secret)| RedditCredentials {
            client_id,
            client_secret,
        });
    let reddit: Arc<dyn FeedSource> = Arc::new(RedditClient::new(
        &config.reddit_user_agent,
        credentials,
        SOURCE_TIMEOUT_SECS,
    )?);
    let alerts: Arc<dyn FeedSource> = Arc::new(AlertsClient::new(
        &config.reddit_user_agent,
        SOURCE_TIMEOUT_SECS,
    )?);
    Ok(vec![reddit, alerts])
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
