//! Outside collaborators of checkout, with in-memory implementations.

pub mod gateway;
pub mod notifications;
pub mod settings;

pub use gateway::{GatewayOrder, InMemoryPaymentGateway, PaymentGateway};
pub use notifications::{
    LoggingDispatcher, Notification, NotificationDispatcher, NotificationOutbox,
    RecordingDispatcher,
};
pub use settings::{InMemorySettingsProvider, SettingsProvider};
