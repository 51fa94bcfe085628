//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which creates an in-memory DB, a config with
//! every oracle switched off, a scripted byte prober, and the full
//! [`AppContext`]. The [`with_server`] constructor starts Axum on a random
//! port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use skipsplice::config::{Config, OraclesConfig};
use skipsplice::server::{create_router, AppContext};
use skipsplice_av::{ByteProber, Chapter, ResolvedSource};
use skipsplice_db::{get_conn, init_memory_pool, DbPool, PooledConnection};

/// Public address the URL guard accepts without a DNS lookup.
pub const MEDIA_URL: &str = "https://203.0.113.10/show/ep1.mkv";
pub const TOTAL_BYTES: u64 = 700 * 1024 * 1024;
pub const DURATION_SECS: f64 = 1420.0;

/// Scripted prober: the byte offset of `t` is `t * 1000`.
#[derive(Default)]
pub struct StubProber {
    pub fail_offsets: bool,
    pub chapters: Vec<Chapter>,
    pub probes: AtomicUsize,
}

impl StubProber {
    pub fn failing() -> Self {
        Self {
            fail_offsets: true,
            ..Self::default()
        }
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ByteProber for StubProber {
    async fn resolve(&self, url: &str) -> ResolvedSource {
        ResolvedSource {
            final_url: url.to_string(),
            content_length: Some(TOTAL_BYTES),
            duration: Some(DURATION_SECS),
        }
    }

    async fn find_offset(&self, _url: &str, t: f64) -> u64 {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.fail_offsets {
            0
        } else {
            (t * 1000.0) as u64
        }
    }

    async fn find_offsets(&self, _url: &str, t1: f64, t2: f64) -> Option<(u64, u64)> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        (!self.fail_offsets).then(|| ((t1 * 1000.0) as u64, (t2 * 1000.0) as u64))
    }

    async fn find_chapters(&self, _url: &str) -> Vec<Chapter> {
        self.chapters.clone()
    }
}

/// Config that never talks to the network.
pub fn offline_config() -> Config {
    Config {
        oracles: OraclesConfig {
            introdb_enabled: false,
            aniskip_enabled: false,
            animeskip_enabled: false,
            ..OraclesConfig::default()
        },
        ..Config::default()
    }
}

/// Test harness wrapping a fully-constructed [`AppContext`] backed by an
/// in-memory database.
pub struct TestHarness {
    pub ctx: AppContext,
    pub db: DbPool,
    pub prober: Arc<StubProber>,
}

impl TestHarness {
    /// Create a new harness with offline configuration and in-memory DB.
    pub fn new() -> Self {
        Self::with_config(offline_config())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_prober(config, StubProber::default())
    }

    pub fn with_prober(config: Config, prober: StubProber) -> Self {
        let db = init_memory_pool().expect("failed to create in-memory pool");
        let prober = Arc::new(prober);
        let ctx = AppContext::build(config, db.clone(), prober.clone())
            .expect("failed to build app context");
        Self { ctx, db, prober }
    }

    pub fn router(&self) -> axum::Router {
        create_router(self.ctx.clone())
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::with_server_config(offline_config()).await
    }

    /// Start an Axum server with custom config on a random port.
    pub async fn with_server_config(config: Config) -> (Self, SocketAddr) {
        let harness = Self::with_config(config);
        let app = harness.router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }

    /// Get a database connection from the pool.
    pub fn conn(&self) -> PooledConnection {
        get_conn(&self.db).expect("failed to get db connection")
    }
}
