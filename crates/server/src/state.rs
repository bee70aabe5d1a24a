//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::services::catalog::CategoryCache;
use crate::services::payments::{PaymentError, RazorpayClient};
use crate::services::sms::{HttpSmsSender, LogSmsSender, SmsError, SmsSender};
use crate::services::uploads::UploadStore;

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payment client: {0}")]
    Payment(#[from] PaymentError),
    #[error("SMS client: {0}")]
    Sms(#[from] SmsError),
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
    config: ServerConfig,
    pool: PgPool,
    categories: CategoryCache,
    razorpay: Option<RazorpayClient>,
    sms: Arc<dyn SmsSender>,
    uploads: UploadStore,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Razorpay is enabled only when configured. Without an SMS provider,
    /// messages are written to the log.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client fails to build.
    pub fn new(config: ServerConfig, pool: PgPool) -> Result<Self, StateError> {
        let razorpay = config
            .razorpay
            .as_ref()
            .map(RazorpayClient::new)
            .transpose()?;
        let sms: Arc<dyn SmsSender> = match &config.sms {
            Some(sms) => Arc::new(HttpSmsSender::new(sms)?),
            None => {
                tracing::warn!("SMS provider not configured, messages will be logged");
                Arc::new(LogSmsSender)
            }
        };
        if razorpay.is_none() {
            tracing::warn!("Razorpay not configured, only cash on delivery is available");
        }
        Ok(Self::from_parts(config, pool, razorpay, sms))
    }

    /// Assemble state from prebuilt clients.
    #[must_use]
    pub fn from_parts(
        config: ServerConfig,
        pool: PgPool,
        razorpay: Option<RazorpayClient>,
        sms: Arc<dyn SmsSender>,
    ) -> Self {
        let uploads = UploadStore::new(&config.uploads);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                categories: CategoryCache::new(),
                razorpay,
                sms,
                uploads,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Cached category list.
    #[must_use]
    pub fn categories(&self) -> &CategoryCache {
        &self.inner.categories
    }

    /// Razorpay client, if online payments are enabled.
    #[must_use]
    pub fn razorpay(&self) -> Option<&RazorpayClient> {
        self.inner.razorpay.as_ref()
    }

    /// SMS sender.
    #[must_use]
    pub fn sms(&self) -> &dyn SmsSender {
        self.inner.sms.as_ref()
    }

    /// Upload store.
    #[must_use]
    pub fn uploads(&self) -> &UploadStore {
        &self.inner.uploads
    }
}
