//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::melhor_envio::{MelhorEnvioClient, ShippingProviderError};
use crate::stripe::{StripeClient, StripeError};

/// Error building the outbound API clients.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("stripe client: {0}")]
    Stripe(#[from] StripeError),
    #[error("shipping client: {0}")]
    Shipping(#[from] ShippingProviderError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    stripe: StripeClient,
    shipping: MelhorEnvioClient,
}

impl AppState {
    /// Create a new application state with clients for the configured APIs.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let stripe = StripeClient::new(&config.stripe)?;
        let shipping = MelhorEnvioClient::new(&config.shipping)?;
        Ok(Self::with_clients(config, pool, stripe, shipping))
    }

    /// Create state around already-built clients.
    #[must_use]
    pub fn with_clients(
        config: StorefrontConfig,
        pool: PgPool,
        stripe: StripeClient,
        shipping: MelhorEnvioClient,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                stripe,
                shipping,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn stripe(&self) -> &StripeClient {
        &self.inner.stripe
    }

    #[must_use]
    pub fn shipping(&self) -> &MelhorEnvioClient {
        &self.inner.shipping
    }
}
