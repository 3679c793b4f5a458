use std::sync::Arc;

use lichess_digest_core::{
    chat::ChatBot,
    config::AppConfig,
    delivery::{DeliveryChannel, LogChannel},
    digest::{DigestService, ScheduleController},
    discord_bot::{self, DiscordChannel},
    format::ReportFormatter,
    http::{self, AppState},
    lichess::LichessClient,
    roster::{InMemoryRosterStore, PostgresRosterStore, RosterStore},
    stats::StatsAggregator,
};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;

    let roster = build_roster_store(&config).await?;
    let source = Arc::new(LichessClient::new(
        config.lichess_api_base_url.clone(),
        config.lichess_timeout,
    )?);
    info!(base_url = %config.lichess_api_base_url, "using Lichess API");

    let channel = build_delivery_channel(&config);
    let digest = Arc::new(DigestService::new(
        roster,
        StatsAggregator::new(source, config.timezone),
        ReportFormatter::new(config.timezone),
        channel,
    ));

    let schedule = Arc::new(ScheduleController::new(
        digest.clone(),
        config.timezone,
        config.daily_stats_time.clone(),
    ));
    let armed = schedule.apply().await?;
    info!(schedule = %armed, "daily digest scheduled");

    if let Some(discord_token) = config.discord_token.clone() {
        let bot = Arc::new(ChatBot::new(digest.clone(), schedule.clone()));
        tokio::spawn(async move {
            if let Err(error) = discord_bot::start_discord_bot(discord_token, bot).await {
                warn!(?error, "Discord bot stopped with error");
            }
        });
    } else {
        warn!("DISCORD_TOKEN is not set; Discord bot is disabled and digests only go to the log");
    }

    let app = http::router(AppState {
        digest,
        schedule: schedule.clone(),
    });
    let listener = TcpListener::bind(config.http_bind).await?;
    info!("Lichess digest HTTP API listening on {}", config.http_bind);

    axum::serve(listener, app).await?;
    schedule.shutdown().await;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .init();
}

async fn build_roster_store(config: &AppConfig) -> anyhow::Result<Arc<dyn RosterStore>> {
    if let Some(database_url) = &config.database_url {
        let store = PostgresRosterStore::connect(database_url).await?;
        info!("Connected to Postgres roster store");
        Ok(Arc::new(store))
    } else {
        warn!("DATABASE_URL not set; using in-memory roster store");
        Ok(Arc::new(InMemoryRosterStore::default()))
    }
}

fn build_delivery_channel(config: &AppConfig) -> Arc<dyn DeliveryChannel> {
    match &config.discord_token {
        Some(token) => Arc::new(DiscordChannel::from_token(token)),
        None => Arc::new(LogChannel),
    }
}
