//! Telegram adapter (teloxide).
//!
//! Implements the `tanysu-core` MessagingPort over the Telegram Bot API and
//! feeds updates into the core `ChatService`.

use std::time::Duration;

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, Recipient},
};

use tokio::time::{sleep, timeout};

pub mod handlers;
pub mod router;

use tanysu_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{Destination, InlineKeyboard, OutgoingMessage, Payload},
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
    request_timeout: Duration,
}

impl TelegramMessenger {
    pub fn new(bot: Bot, request_timeout: Duration) -> Self {
        Self {
            bot,
            request_timeout,
        }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn recipient(to: &Destination) -> Recipient {
        match to {
            Destination::Chat(c) => Recipient::Id(Self::tg_chat(*c)),
            Destination::Channel(name) => Recipient::ChannelUsername(name.clone()),
        }
    }

    fn markup(keyboard: &InlineKeyboard) -> InlineKeyboardMarkup {
        let rows: Vec<Vec<InlineKeyboardButton>> = keyboard
            .buttons
            .iter()
            .map(|b| {
                vec![InlineKeyboardButton::callback(
                    b.label.clone(),
                    b.callback_data.clone(),
                )]
            })
            .collect();
        InlineKeyboardMarkup::new(rows)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    /// Run one Bot API call under the request timeout, retrying once on 429.
    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            let res = timeout(self.request_timeout, op())
                .await
                .map_err(|_| {
                    Error::External(format!(
                        "telegram request timed out after {}ms",
                        self.request_timeout.as_millis()
                    ))
                })?;
            match res {
                Ok(v) => return Ok(v),
                Err(teloxide::RequestError::RetryAfter(d)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    tracing::warn!(wait_secs = d.as_secs(), "telegram rate limit; retrying");
                    sleep(d).await;
                }
                Err(other) => return Err(Self::map_err(other)),
            }
        }
    }
}

/// File payloads share one request shape: file id, optional caption, keyboard,
/// content protection.
macro_rules! send_file {
    ($self:ident, $method:ident, $chat:ident, $file:expr, $msg:ident, $markup:ident) => {
        $self
            .with_retry(|| {
                let mut req = $self
                    .bot
                    .$method($chat.clone(), InputFile::file_id($file.0.clone()))
                    .protect_content($msg.protect_content);
                if let Some(c) = &$msg.caption {
                    req = req.caption(c.clone());
                }
                if let Some(m) = &$markup {
                    req = req.reply_markup(m.clone());
                }
                req
            })
            .await?
    };
    ($self:ident, $method:ident, $chat:ident, $file:expr, $msg:ident, $markup:ident, no_caption) => {
        $self
            .with_retry(|| {
                let mut req = $self
                    .bot
                    .$method($chat.clone(), InputFile::file_id($file.0.clone()))
                    .protect_content($msg.protect_content);
                if let Some(m) = &$markup {
                    req = req.reply_markup(m.clone());
                }
                req
            })
            .await?
    };
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send(&self, to: &Destination, msg: OutgoingMessage) -> Result<MessageRef> {
        let chat = Self::recipient(to);
        let markup = msg.keyboard.as_ref().map(Self::markup);

        let sent = match &msg.payload {
            Payload::Text(text) => {
                self.with_retry(|| {
                    let mut req = self
                        .bot
                        .send_message(chat.clone(), text.clone())
                        .protect_content(msg.protect_content);
                    if let Some(m) = &markup {
                        req = req.reply_markup(m.clone());
                    }
                    req
                })
                .await?
            }
            Payload::Photo(f) => send_file!(self, send_photo, chat, f, msg, markup),
            Payload::Video(f) => send_file!(self, send_video, chat, f, msg, markup),
            Payload::Voice(f) => send_file!(self, send_voice, chat, f, msg, markup),
            Payload::Document(f) => send_file!(self, send_document, chat, f, msg, markup),
            Payload::Audio(f) => send_file!(self, send_audio, chat, f, msg, markup),
            Payload::VideoNote(f) => {
                send_file!(self, send_video_note, chat, f, msg, markup, no_caption)
            }
            Payload::Sticker(f) => send_file!(self, send_sticker, chat, f, msg, markup, no_caption),
            Payload::Location {
                latitude,
                longitude,
            } => {
                self.with_retry(|| {
                    let mut req = self
                        .bot
                        .send_location(chat.clone(), *latitude, *longitude)
                        .protect_content(msg.protect_content);
                    if let Some(m) = &markup {
                        req = req.reply_markup(m.clone());
                    }
                    req
                })
                .await?
            }
            Payload::Contact {
                phone_number,
                first_name,
                last_name,
            } => {
                self.with_retry(|| {
                    let mut req = self
                        .bot
                        .send_contact(chat.clone(), phone_number.clone(), first_name.clone())
                        .protect_content(msg.protect_content);
                    if let Some(l) = last_name {
                        req = req.last_name(l.clone());
                    }
                    if let Some(m) = &markup {
                        req = req.reply_markup(m.clone());
                    }
                    req
                })
                .await?
            }
            Payload::Poll { question, options } => {
                self.with_retry(|| {
                    let mut req = self
                        .bot
                        .send_poll(chat.clone(), question.clone(), options.clone())
                        .protect_content(msg.protect_content);
                    if let Some(m) = &markup {
                        req = req.reply_markup(m.clone());
                    }
                    req
                })
                .await?
            }
            Payload::Unknown => {
                return Err(Error::External(
                    "unknown payloads cannot be sent".to_string(),
                ))
            }
        };

        Ok(MessageRef::new(ChatId(sent.chat.id.0), MessageId(sent.id.0)))
    }

    async fn set_keyboard(&self, msg: MessageRef, keyboard: InlineKeyboard) -> Result<()> {
        let markup = Self::markup(&keyboard);
        self.with_retry(|| {
            self.bot
                .edit_message_reply_markup(
                    Self::tg_chat(msg.chat_id),
                    Self::tg_msg_id(msg.message_id),
                )
                .reply_markup(markup.clone())
        })
        .await?;
        Ok(())
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .delete_message(Self::tg_chat(msg.chat_id), Self::tg_msg_id(msg.message_id))
        })
        .await?;
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.with_retry(|| {
            let mut req = self.bot.answer_callback_query(callback_id.to_string());
            if let Some(t) = text {
                req = req.text(t.to_string());
            }
            req
        })
        .await?;
        Ok(())
    }
}
