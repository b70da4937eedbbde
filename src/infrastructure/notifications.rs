//! Notification delivery
//!
//! Mail transport is not wired in; the sender records the delivery in the
//! log so staff can hand the password over manually.

use async_trait::async_trait;
use tracing::info;

use crate::application::ports::NotificationSender;
use crate::shared::DomainResult;

#[derive(Debug, Default, Clone)]
pub struct LogNotificationSender;

#[async_trait]
impl NotificationSender for LogNotificationSender {
    async fn send_temporary_password(&self, email: &str, _password: &str) -> DomainResult<()> {
        info!(recipient = %email, "📧 Temporary password issued");
        Ok(())
    }
}
