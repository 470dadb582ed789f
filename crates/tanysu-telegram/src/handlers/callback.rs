use std::sync::Arc;

use teloxide::prelude::*;
use tracing::warn;

use tanysu_core::domain::ChatId;

use crate::handlers::participant;
use crate::router::AppState;

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    // Buttons are only ever shown in the private chat, whose id is the user's.
    let chat = q
        .message
        .as_ref()
        .map(|m| ChatId(m.chat.id.0))
        .unwrap_or(ChatId(q.from.id.0 as i64));
    let who = participant(&q.from, chat);
    let data = q.data.clone().unwrap_or_default();

    let _guard = state.participant_locks.lock(who.user).await;
    if let Err(e) = state.service.on_callback(&who, &q.id, &data).await {
        warn!(user = %who.user, %data, "callback failed: {e}");
    }
    Ok(())
}
