//! Telegram update handlers.
//!
//! Each handler converts a teloxide update into core types, takes the
//! participant's ordering lock and calls into `ChatService`. Core errors are
//! logged here; the dispatcher never sees them.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message, User},
};

use tanysu_core::{
    domain::{ChatId, UserId},
    service::Participant,
};

use crate::router::AppState;

mod callback;
mod commands;
mod message;

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    callback::handle_callback(q, state).await
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    // Channel posts and service messages have no sender.
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let participant = participant(user, ChatId(msg.chat.id.0));
    let _guard = state.participant_locks.lock(participant.user).await;

    if let Some(text) = msg.text() {
        if let Some(cmd) = commands::parse_command(text) {
            return commands::handle_command(&cmd, &participant, &state).await;
        }
    }
    message::handle_message(&msg, &participant, &state).await
}

pub(crate) fn participant(user: &User, chat: ChatId) -> Participant {
    Participant::new(UserId(user.id.0 as i64), chat, user.first_name.clone())
        .with_username(user.username.clone())
        .with_last_name(user.last_name.clone())
}
