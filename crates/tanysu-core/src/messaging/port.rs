use async_trait::async_trait;

use crate::{
    domain::MessageRef,
    messaging::types::{Destination, InlineKeyboard, OutgoingMessage},
    Result,
};

/// Cross-messenger port.
///
/// Telegram is the only implementation; the core never talks to teloxide
/// directly, which keeps the relay and pairing flows testable with a fake.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    /// Deliver one message of any payload kind.
    async fn send(&self, to: &Destination, msg: OutgoingMessage) -> Result<MessageRef>;

    /// Replace the inline keyboard of an already sent message.
    async fn set_keyboard(&self, msg: MessageRef, keyboard: InlineKeyboard) -> Result<()>;

    async fn delete_message(&self, msg: MessageRef) -> Result<()>;

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()>;
}
