//! Delivery settings source.

use std::sync::Arc;

use async_trait::async_trait;
use domain::DeliverySettings;
use tokio::sync::RwLock;

use crate::error::CheckoutError;

/// Where the store-wide delivery tariff comes from.
///
/// `None` means no tariff is configured and delivery is free.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn delivery_settings(&self) -> Result<Option<DeliverySettings>, CheckoutError>;
}

#[async_trait]
impl<T: SettingsProvider + ?Sized> SettingsProvider for Arc<T> {
    async fn delivery_settings(&self) -> Result<Option<DeliverySettings>, CheckoutError> {
        (**self).delivery_settings().await
    }
}

/// Settings held in memory, seeded from configuration.
#[derive(Debug, Clone, Default)]
pub struct InMemorySettingsProvider {
    settings: Arc<RwLock<Option<DeliverySettings>>>,
}

impl InMemorySettingsProvider {
    pub fn new(settings: Option<DeliverySettings>) -> Self {
        Self {
            settings: Arc::new(RwLock::new(settings)),
        }
    }

    pub async fn replace(&self, settings: Option<DeliverySettings>) {
        *self.settings.write().await = settings;
    }
}

#[async_trait]
impl SettingsProvider for InMemorySettingsProvider {
    async fn delivery_settings(&self) -> Result<Option<DeliverySettings>, CheckoutError> {
        Ok(self.settings.read().await.clone())
    }
}
