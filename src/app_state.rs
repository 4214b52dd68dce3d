// =============================================================================
// Application State: explicitly constructed and injected into the router
// =============================================================================
//
// Holds only immutable handles: configuration, the connection pool behind the
// historical store, and the market-data source.  Nothing here is mutated
// after construction, so no locking is needed.
// =============================================================================

use std::sync::Arc;

use crate::config::AnalystConfig;
use crate::market_data::MarketDataSource;
use crate::store::HistoricalStore;

pub struct AppState {
    pub config: AnalystConfig,
    pub store: HistoricalStore,
    pub source: Arc<dyn MarketDataSource>,
}

impl AppState {
    pub fn new(
        config: AnalystConfig,
        store: HistoricalStore,
        source: Arc<dyn MarketDataSource>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            store,
            source,
        })
    }

    /// Whether `symbol` (case-insensitive) is the ticker this deployment serves.
    pub fn serves(&self, symbol: &str) -> bool {
        symbol.eq_ignore_ascii_case(&self.config.ticker)
    }

    /// Canonical (configured) ticker spelling.
    pub fn ticker(&self) -> &str {
        &self.config.ticker
    }
}
