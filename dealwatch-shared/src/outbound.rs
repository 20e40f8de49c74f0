/// Outbound messenger collaborator contract
///
/// Delivery mechanics for a concrete channel (WhatsApp, Telegram, ...) live
/// behind this trait. The `message_id` is the idempotency key: a retried
/// delivery with the same id must not produce a duplicate message, so the
/// dispatcher can retry failed alerts safely.
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Outbound delivery failure; retryable up to the dispatcher's cap
#[derive(Debug, Error)]
#[error("delivery to {recipient} failed: {reason}")]
pub struct DeliveryError {
    /// Channel identity the send was addressed to
    pub recipient: String,

    /// Transport-specific failure description
    pub reason: String,
}

/// Outbound messenger contract
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Sends a text message to a channel identity
    ///
    /// Implementations must be idempotent per `message_id`.
    async fn send(
        &self,
        recipient: &str,
        message_id: Uuid,
        text: &str,
    ) -> Result<(), DeliveryError>;
}

/// Messenger that writes deliveries to the log
///
/// Used by local runs where no real channel credentials are configured.
pub struct LogMessenger;

#[async_trait]
impl Messenger for LogMessenger {
    async fn send(
        &self,
        recipient: &str,
        message_id: Uuid,
        text: &str,
    ) -> Result<(), DeliveryError> {
        tracing::info!(
            recipient = %recipient,
            message_id = %message_id,
            "Outbound message:\n{text}"
        );
        Ok(())
    }
}
