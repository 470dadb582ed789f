//! Inline-button callback data: routing by prefix plus keyboard builders.

use crate::{
    deletion::{token, DeleteToken},
    domain::UserId,
    errors::Error,
    messaging::types::{InlineButton, InlineKeyboard},
    Result,
};

pub const CHAT: &str = "chat";
pub const SELECT_PREFIX: &str = "select_";
pub const EXIT: &str = "exit";

pub const CHAT_LABEL: &str = "💬 Chat";
pub const EXIT_LABEL: &str = "🔕 Leave chat";
pub const DELETE_LABEL: &str = "⛔️ Delete message";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    /// Join the waiting queue and list candidates.
    Chat,
    Select(UserId),
    Exit,
    Delete(DeleteToken),
}

impl CallbackAction {
    /// Route callback data by prefix.
    ///
    /// `Ok(None)` for data this bot never produces; `Err` when a known prefix
    /// carries an unparsable argument.
    pub fn parse(data: &str) -> Result<Option<Self>> {
        if data.starts_with(token::PREFIX) {
            return DeleteToken::decode(data).map(|t| Some(CallbackAction::Delete(t)));
        }
        if let Some(id) = data.strip_prefix(SELECT_PREFIX) {
            let id = id
                .parse::<i64>()
                .map_err(|_| Error::InvalidPairing(format!("bad candidate id {id:?}")))?;
            return Ok(Some(CallbackAction::Select(UserId(id))));
        }
        if data.starts_with(EXIT) {
            return Ok(Some(CallbackAction::Exit));
        }
        if data.starts_with(CHAT) {
            return Ok(Some(CallbackAction::Chat));
        }
        Ok(None)
    }

    pub fn encode(&self) -> String {
        match self {
            CallbackAction::Chat => CHAT.to_string(),
            CallbackAction::Select(id) => format!("{SELECT_PREFIX}{id}"),
            CallbackAction::Exit => EXIT.to_string(),
            CallbackAction::Delete(t) => t.encode(),
        }
    }
}

pub fn chat_keyboard() -> InlineKeyboard {
    InlineKeyboard::single(CHAT_LABEL, CHAT)
}

pub fn exit_keyboard() -> InlineKeyboard {
    InlineKeyboard::single(EXIT_LABEL, EXIT)
}

pub fn delete_keyboard(token: &DeleteToken) -> InlineKeyboard {
    InlineKeyboard::single(DELETE_LABEL, token.encode())
}

/// One `select_{id}` button per candidate, in the given order.
pub fn candidates_keyboard(candidates: &[(UserId, String)]) -> InlineKeyboard {
    InlineKeyboard::new(
        candidates
            .iter()
            .map(|(id, label)| InlineButton {
                label: label.clone(),
                callback_data: CallbackAction::Select(*id).encode(),
            })
            .collect(),
    )
}
