use crate::cache::{spawn_cleanup, Expiring};
use crate::config::Config;
use crate::oracles::{
    AniSkipOracle, AnimeSkipOracle, ArmMapper, Backfill, CachedOracle, CommunityLookup,
    IntroDbOracle, MappingCache, OracleCache, TimingChain, TimingOracle,
};
use crate::probe::{CachedProber, OffsetCache, OffsetPairCache, SourceCache};
use crate::segments::Moderation;
use crate::splice::{ManifestCache, SpliceOrchestrator, UrlGuard};
use anyhow::{Context, Result};
use axum::{
    http::{header, Method, StatusCode},
    middleware,
    response::IntoResponse,
    routing::get,
    Router,
};
use skipsplice_av::ByteProber;
use skipsplice_db::DbPool;
use skipsplice_media::ManifestBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod auth;
pub mod error;
pub mod routes_moderation;
pub mod routes_segments;
pub mod routes_stream;

pub use error::AppError;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub db: DbPool,
    pub moderation: Arc<Moderation>,
    pub chain: Arc<TimingChain>,
    pub orchestrator: Arc<SpliceOrchestrator>,
    /// Every TTL cache owned by the services above, swept by the cleanup task
    pub caches: Arc<Vec<Arc<dyn Expiring>>>,
}

impl AppContext {
    /// Wire the services for `config` around a raw byte prober.
    ///
    /// The prober is wrapped in the probe caches; each oracle gets its own
    /// answer cache and the Anime-mapped oracles share one id mapper.
    pub fn build(config: Config, db: DbPool, prober: Arc<dyn ByteProber>) -> Result<Self> {
        let c = &config.cache;

        let sources = Arc::new(SourceCache::with_ttl_secs(c.offset_capacity, c.offset_ttl_secs));
        let offsets = Arc::new(OffsetCache::with_ttl_secs(c.offset_capacity, c.offset_ttl_secs));
        let pairs = Arc::new(OffsetPairCache::with_ttl_secs(
            c.offset_capacity,
            c.offset_ttl_secs,
        ));
        let prober: Arc<dyn ByteProber> = Arc::new(CachedProber::new(
            prober,
            sources.clone(),
            offsets.clone(),
            pairs.clone(),
        ));

        let moderation = Arc::new(Moderation::new(db.clone(), config.moderation.clone()));

        let mapper = Arc::new(
            ArmMapper::from_config(
                &config.oracles,
                Arc::new(MappingCache::unbounded_ttl(c.oracle_capacity)),
            )
            .context("Failed to build anime id mapper")?,
        );

        let oracle_cache = || Arc::new(OracleCache::with_ttl_secs(c.oracle_capacity, c.oracle_ttl_secs));
        let introdb = Arc::new(CachedOracle::new(
            Arc::new(IntroDbOracle::from_config(&config.oracles)?),
            oracle_cache(),
        ));
        let aniskip = Arc::new(CachedOracle::new(
            Arc::new(AniSkipOracle::from_config(&config.oracles, mapper.clone())?),
            oracle_cache(),
        ));
        let animeskip = Arc::new(CachedOracle::new(
            Arc::new(AnimeSkipOracle::from_config(&config.oracles, mapper.clone())?),
            oracle_cache(),
        ));

        let chain = Arc::new(TimingChain::new(
            CommunityLookup::new(db.clone(), config.moderation.report_hide_threshold),
            vec![
                introdb.clone() as Arc<dyn TimingOracle>,
                aniskip.clone() as Arc<dyn TimingOracle>,
                animeskip.clone() as Arc<dyn TimingOracle>,
            ],
            Backfill::new(moderation.clone()),
        ));

        let manifests = Arc::new(ManifestCache::with_ttl_secs(
            c.manifest_capacity,
            c.manifest_ttl_secs,
        ));
        let orchestrator = Arc::new(SpliceOrchestrator::new(
            UrlGuard::new(config.probe.allow_private_hosts),
            prober,
            chain.clone(),
            ManifestBuilder::new(config.probe.init_segment_bytes),
            manifests.clone(),
        ));

        let caches: Vec<Arc<dyn Expiring>> = vec![
            sources,
            offsets,
            pairs,
            manifests,
            mapper.cache().clone(),
            introdb.cache().clone(),
            aniskip.cache().clone(),
            animeskip.cache().clone(),
        ];

        Ok(Self {
            config: Arc::new(config),
            db,
            moderation,
            chain,
            orchestrator,
            caches: Arc::new(caches),
        })
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([routes_stream::SKIP_STAGE_HEADER]);

    let moderation = routes_moderation::moderation_routes().layer(middleware::from_fn_with_state(
        ctx.clone(),
        auth::admin_auth_middleware,
    ));

    Router::new()
        .route("/health", get(health_check))
        .merge(routes_stream::stream_routes())
        .nest("/api", routes_segments::segment_routes().merge(moderation))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the HTTP server
pub async fn start_server(config: Config, db: DbPool, prober: Arc<dyn ByteProber>) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let cleanup_every = Duration::from_secs(config.cache.cleanup_interval_secs.max(1));
    if config.server.admin_api_key.is_none() {
        tracing::warn!("No admin_api_key configured; moderation API is open");
    }

    let ctx = AppContext::build(config, db, prober)?;
    let cleanup = spawn_cleanup(ctx.caches.as_ref().clone(), cleanup_every);

    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cleanup.abort();
    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
