//! Lazily loaded, memoized engine handle.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use super::error::EngineError;
use super::traits::{EngineLoader, TranscodeEngine};
use crate::metrics;

/// Holds at most one loaded engine for the lifetime of the slot.
///
/// The slot moves from empty to loaded exactly once. Callers that arrive
/// while a load is in flight wait for that load instead of starting their
/// own. A failed load leaves the slot empty, so the next caller retries.
/// Clones share the same underlying handle.
pub struct EngineSlot<L: EngineLoader> {
    loader: Arc<L>,
    cell: Arc<OnceCell<Arc<L::Engine>>>,
}

impl<L: EngineLoader> Clone for EngineSlot<L> {
    fn clone(&self) -> Self {
        Self {
            loader: Arc::clone(&self.loader),
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<L: EngineLoader> EngineSlot<L> {
    /// Creates an empty slot around `loader`.
    pub fn new(loader: L) -> Self {
        Self {
            loader: Arc::new(loader),
            cell: Arc::new(OnceCell::new()),
        }
    }

    /// Whether an engine has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    /// Returns the loaded engine without triggering a load.
    pub fn get(&self) -> Option<Arc<L::Engine>> {
        self.cell.get().cloned()
    }

    /// Returns the loaded engine, loading it first if necessary.
    pub async fn get_or_load(&self) -> Result<Arc<L::Engine>, EngineError> {
        let engine = self
            .cell
            .get_or_try_init(|| async {
                let started = Instant::now();
                match self.loader.load().await {
                    Ok(engine) => {
                        info!(
                            "Engine '{}' loaded in {} ms",
                            engine.name(),
                            started.elapsed().as_millis()
                        );
                        metrics::ENGINE_LOADS.with_label_values(&["success"]).inc();
                        Ok(Arc::new(engine))
                    }
                    Err(e) => {
                        warn!("Engine load failed: {}", e);
                        metrics::ENGINE_LOADS.with_label_values(&["failed"]).inc();
                        Err(e)
                    }
                }
            })
            .await?;

        Ok(Arc::clone(engine))
    }
}
