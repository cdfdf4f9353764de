use std::collections::HashMap;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{PriceSource, Result};

/// Simulated price source for local runs and demos.
///
/// Each fetch returns the symbol's base price plus uniform jitter, the same
/// shape of tick a broker feed would deliver. No network calls are made.
pub struct SimulatedFeed {
    /// Base price used for symbols without an override.
    base_price: f64,
    /// Half-width of the uniform jitter applied to every tick.
    jitter: f64,
    /// Per-symbol base overrides, set via `set_base`.
    overrides: RwLock<HashMap<String, f64>>,
}

impl SimulatedFeed {
    pub fn new(base_price: f64, jitter: f64) -> Self {
        info!(base_price, jitter, "SimulatedFeed initialized");
        Self {
            base_price,
            jitter,
            overrides: RwLock::new(HashMap::new()),
        }
    }

    /// Pin a specific base price for one symbol.
    pub async fn set_base(&self, symbol: &str, base: f64) {
        self.overrides.write().await.insert(symbol.to_string(), base);
    }
}

#[async_trait]
impl PriceSource for SimulatedFeed {
    async fn fetch(&self, symbol: &str) -> Result<f64> {
        let base = self
            .overrides
            .read()
            .await
            .get(symbol)
            .copied()
            .unwrap_or(self.base_price);

        let price = if self.jitter > 0.0 {
            base + rand::thread_rng().gen_range(-self.jitter..=self.jitter)
        } else {
            base
        };

        debug!(symbol, price, "Simulated tick");
        Ok(price)
    }
}
