//! Outbound ports used by the application services
//!
//! Implementations live in `infrastructure`.

use async_trait::async_trait;

use crate::shared::DomainResult;

/// Renders a payload into a scannable code image.
pub trait QrEncoder: Send + Sync {
    /// Returns the image as base64 text.
    fn encode(&self, payload: &str) -> DomainResult<String>;
}

/// Delivers account notifications to users.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send_temporary_password(&self, email: &str, password: &str) -> DomainResult<()>;
}
