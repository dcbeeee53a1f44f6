//! `resolve(identifier)`: cache lookup, then fetch and extract on a miss.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{cache_key, ResultCache};
use crate::extract::{self, ParseError};
use crate::fetch::{FetchError, FetchFailure, RetryFetcher};
use crate::models::ExtractedDocument;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Fetch(FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("resolution cancelled")]
    Cancelled,
}

impl From<FetchFailure> for ResolveError {
    fn from(failure: FetchFailure) -> Self {
        match failure {
            FetchFailure::Failed(err) => ResolveError::Fetch(err),
            FetchFailure::Cancelled => ResolveError::Cancelled,
        }
    }
}

impl ResolveError {
    /// Text suitable for showing to the person who asked for the problem.
    pub fn user_message(&self) -> String {
        match self {
            ResolveError::Fetch(FetchError::Exhausted {
                identifier,
                attempts,
                ..
            }) => format!(
                "Could not load problem {identifier} after {attempts} attempts. Please try again later."
            ),
            ResolveError::Fetch(FetchError::NotFound(identifier)) => {
                format!("Problem {identifier} could not be found.")
            }
            ResolveError::Fetch(FetchError::InvalidIdentifier(_)) => {
                "Please enter a problem number.".to_string()
            }
            ResolveError::Parse(_) => "The problem page could not be read.".to_string(),
            ResolveError::Cancelled => "Loading the problem was cancelled.".to_string(),
            _ => "Something went wrong while loading the problem.".to_string(),
        }
    }
}

// ── In-flight coalescing ─────────────────────────────────────────────────────

type Gate = Arc<AsyncMutex<()>>;

/// One async lock per identifier currently being resolved.
#[derive(Default)]
struct InFlight {
    gates: Mutex<HashMap<String, Gate>>,
}

impl InFlight {
    fn enter(&self, key: &str) -> Slot<'_> {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        let gate = gates.entry(key.to_string()).or_default().clone();
        Slot {
            owner: self,
            key: key.to_string(),
            gate,
        }
    }
}

struct Slot<'a> {
    owner: &'a InFlight,
    key: String,
    gate: Gate,
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        let mut gates = self.owner.gates.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map and this slot still hold the gate.
        if Arc::strong_count(&self.gate) == 2 {
            gates.remove(&self.key);
        }
    }
}

// ── Resolver ─────────────────────────────────────────────────────────────────

pub struct Resolver {
    fetcher: RetryFetcher,
    cache: Arc<dyn ResultCache>,
    in_flight: InFlight,
}

impl Resolver {
    pub fn new(fetcher: RetryFetcher, cache: Arc<dyn ResultCache>) -> Self {
        Self {
            fetcher,
            cache,
            in_flight: InFlight::default(),
        }
    }

    pub fn fetcher(&self) -> &RetryFetcher {
        &self.fetcher
    }

    pub async fn resolve(&self, identifier: &str) -> Result<ExtractedDocument, ResolveError> {
        self.resolve_with_cancel(identifier, &CancellationToken::new())
            .await
    }

    /// Like [`Resolver::resolve`], but gives up with
    /// [`ResolveError::Cancelled`] as soon as `cancel` fires.
    ///
    /// Concurrent calls for the same identifier are serialized so only the
    /// first one reaches the network; the rest are served from the cache.
    pub async fn resolve_with_cancel(
        &self,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> Result<ExtractedDocument, ResolveError> {
        let identifier = identifier.trim();
        let key = cache_key(identifier);

        if let Some(document) = self.cached(&key).await {
            return Ok(document);
        }

        let slot = self.in_flight.enter(&key);
        let _turn = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
            turn = slot.gate.lock() => turn,
        };

        // Filled by whoever held the gate before us.
        if let Some(document) = self.cached(&key).await {
            return Ok(document);
        }

        let document = self.fetch_and_extract(identifier, cancel).await?;
        self.store(&key, &document).await;
        Ok(document)
    }

    async fn fetch_and_extract(
        &self,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> Result<ExtractedDocument, ResolveError> {
        let body = self.fetcher.fetch(identifier, cancel).await?;
        let html = extract::decode(body)?;
        let document = extract::extract_document(&html, self.fetcher.origin())?;
        info!(
            identifier,
            title = %document.title,
            samples = document.sample_inputs.len(),
            "extracted problem"
        );
        Ok(document)
    }

    async fn cached(&self, key: &str) -> Option<ExtractedDocument> {
        match self.cache.get(key).await {
            Ok(Some(document)) => {
                debug!(key, "cache hit");
                Some(document)
            }
            Ok(None) => {
                debug!(key, "cache miss");
                None
            }
            Err(e) => {
                warn!(key, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    async fn store(&self, key: &str, document: &ExtractedDocument) {
        if let Err(e) = self.cache.put(key, document).await {
            warn!(key, error = %e, "cache write failed");
        }
    }
}
