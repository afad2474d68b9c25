use std::{sync::Arc, time::Duration};

use tracing::{debug, info, warn};
use tunelink::{
    commands::PlayerService,
    common::{
        banner::{BuildInfo, print_banner},
        logger,
    },
    configs::Config,
    lifecycle::CleanupCoordinator,
    player::TrackSinkFactory,
    process::{ProcessRegistry, SysinfoProbe},
    resolver::{ProcessResolver, QueryDeduplicator, ThumbnailValidator},
    server::{AppState, SessionStore, VoiceLink, VoiceRequest},
    transport,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (config, load_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    logger::init(&config.logging);
    if let Some(e) = load_error {
        warn!("Using built-in defaults: {}", e);
    }
    print_banner(&BuildInfo::default(), &config);

    let processes = Arc::new(ProcessRegistry::new(Arc::new(SysinfoProbe::new())));
    let resolver = Arc::new(ProcessResolver::new(
        config.resolver.clone(),
        processes.clone(),
    ));
    let queries = Arc::new(QueryDeduplicator::new(resolver));

    let (voice, voice_rx) = VoiceLink::new();
    tokio::spawn(async move {
        while let Ok(request) = voice_rx.recv_async().await {
            match request {
                VoiceRequest::Join {
                    guild_id,
                    channel_id,
                } => debug!("[{}] voice join requested for {}", guild_id, channel_id),
                VoiceRequest::Leave { guild_id } => {
                    debug!("[{}] voice leave requested", guild_id)
                }
            }
        }
    });

    let store = Arc::new(SessionStore::new(
        queries,
        processes,
        voice,
        &config.cleanup,
    ));
    let cleanup = Arc::new(CleanupCoordinator::new(store.clone()));
    let sweeper = cleanup
        .clone()
        .spawn_sweeper(Duration::from_secs(config.cleanup.sweep_interval_secs));

    let service = Arc::new(PlayerService::new(
        store.clone(),
        cleanup,
        Arc::new(TrackSinkFactory {
            volume_capable: true,
        }),
        ThumbnailValidator::new(&config.resolver),
        config.timeouts.clone(),
    ));

    let address = format!("{}:{}", config.server.host, config.server.port);
    let app = transport::router(Arc::new(AppState::new(service, config)));

    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await?;

    sweeper.abort();
    store.shutdown().await;
    Ok(())
}
