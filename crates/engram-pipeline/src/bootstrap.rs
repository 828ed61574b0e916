//! Process wiring for the launcher.
//!
//! The launcher owns argument parsing and process installation; this module
//! owns everything between: tracing init, settings validation, opening the
//! store, constructing one rate limiter per call class, taking the process
//! lock, and running the poller. Fatal conditions (missing provider
//! configuration, a live lock holder) surface as errors for the launcher to
//! exit nonzero on.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use engram_core::{LanguageModel, TextEmbedder};
use engram_limiter::RateLimiter;
use engram_search::SearchEngine;
use engram_settings::EngramSettings;
use engram_store::{ConnectionConfig, Store};

use crate::errors::Result;
use crate::lock::ProcessLock;
use crate::poller::Poller;

/// Initialize the global tracing subscriber with stderr output.
///
/// Call once at startup; subsequent calls are no-ops. `RUST_LOG` overrides
/// the configured level.
pub fn init_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();
    let _ = subscriber.try_init();
}

/// A fully wired observer process.
///
/// Holds the shared storage handle, the injected model collaborators, and
/// exactly one rate limiter per call class. Both the poller and the search
/// engine are built from here so they share the same limiters.
pub struct Observer {
    settings: EngramSettings,
    store: Store,
    llm: Arc<dyn LanguageModel>,
    embedder: Arc<dyn TextEmbedder>,
    llm_limiter: Arc<RateLimiter>,
    embed_limiter: Arc<RateLimiter>,
}

impl Observer {
    /// Wire up against the configured database file.
    ///
    /// Validates required provider configuration first; a failure here is
    /// fatal before the poll loop ever starts.
    pub fn new(
        settings: EngramSettings,
        llm: Arc<dyn LanguageModel>,
        embedder: Arc<dyn TextEmbedder>,
    ) -> Result<Self> {
        settings.validate()?;
        let config = ConnectionConfig {
            pool_size: settings.storage.pool_size,
            busy_timeout_ms: settings.storage.busy_timeout_ms,
            ..ConnectionConfig::default()
        };
        let store = Store::open(&settings.storage.db_path, &config)?;
        Ok(Self::assemble(settings, store, llm, embedder))
    }

    /// Wire up against an in-memory database (tests).
    pub fn in_memory(
        settings: EngramSettings,
        llm: Arc<dyn LanguageModel>,
        embedder: Arc<dyn TextEmbedder>,
    ) -> Result<Self> {
        settings.validate()?;
        let store = Store::in_memory()?;
        Ok(Self::assemble(settings, store, llm, embedder))
    }

    fn assemble(
        settings: EngramSettings,
        store: Store,
        llm: Arc<dyn LanguageModel>,
        embedder: Arc<dyn TextEmbedder>,
    ) -> Self {
        let llm_limiter = Arc::new(RateLimiter::per_second(
            settings.limits.llm.capacity,
            settings.limits.llm.refill_per_sec,
        ));
        let embed_limiter = Arc::new(RateLimiter::per_second(
            settings.limits.embedding.capacity,
            settings.limits.embedding.refill_per_sec,
        ));
        Self { settings, store, llm, embedder, llm_limiter, embed_limiter }
    }

    /// The shared storage handle.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Build the retrieval engine over the shared store and the
    /// embedding-class limiter.
    pub fn search_engine(&self) -> SearchEngine {
        SearchEngine::new(
            self.store.clone(),
            Arc::clone(&self.embedder),
            Arc::clone(&self.embed_limiter),
        )
    }

    /// Take the process lock and run the poll loop to completion.
    ///
    /// Returns once a summarize event was handled or `shutdown` was
    /// cancelled; the lock file is removed on the way out.
    pub async fn run_poller(&self, shutdown: CancellationToken) -> Result<()> {
        let lock = ProcessLock::acquire(Path::new(&self.settings.poller.lock_path))?;
        let mut poller = Poller::new(
            self.store.clone(),
            Arc::clone(&self.llm),
            Arc::clone(&self.embedder),
            Arc::clone(&self.llm_limiter),
            Arc::clone(&self.embed_limiter),
            &self.settings,
        );
        poller.run(shutdown).await;
        drop(lock);
        info!("poller stopped, lock released");
        Ok(())
    }
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("db_path", &self.settings.storage.db_path)
            .finish_non_exhaustive()
    }
}

/// Cancel `shutdown` when the process receives SIGINT or SIGTERM.
///
/// Termination signals share the regular shutdown path: they stop the next
/// tick from starting, never the tick in flight.
pub fn spawn_signal_handler(shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("interrupt received"),
            _ = sigterm.recv() => info!("terminate received"),
        }
        shutdown.cancel();
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
