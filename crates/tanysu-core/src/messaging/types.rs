use std::fmt;

use crate::domain::ChatId;

/// Where an outgoing message goes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Destination {
    Chat(ChatId),
    /// Public channel addressed by `@username`.
    Channel(String),
}

impl From<ChatId> for Destination {
    fn from(c: ChatId) -> Self {
        Destination::Chat(c)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Chat(c) => write!(f, "{}", c.0),
            Destination::Channel(name) => f.write_str(name),
        }
    }
}

/// Opaque transport handle for already-uploaded content (Telegram `file_id`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileHandle(pub String);

/// Content of one message, independent of who sends it where.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Text(String),
    Photo(FileHandle),
    Video(FileHandle),
    Voice(FileHandle),
    VideoNote(FileHandle),
    Document(FileHandle),
    Audio(FileHandle),
    Location {
        latitude: f64,
        longitude: f64,
    },
    Sticker(FileHandle),
    Contact {
        phone_number: String,
        first_name: String,
        last_name: Option<String>,
    },
    Poll {
        question: String,
        options: Vec<String>,
    },
    Unknown,
}

/// Inline keyboard, one button per row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub buttons: Vec<InlineButton>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineKeyboard {
    pub fn new(buttons: Vec<InlineButton>) -> Self {
        Self { buttons }
    }

    pub fn single(label: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            buttons: vec![InlineButton {
                label: label.into(),
                callback_data: callback_data.into(),
            }],
        }
    }
}

/// Everything a transport needs to deliver one message.
#[derive(Clone, Debug, PartialEq)]
pub struct OutgoingMessage {
    pub payload: Payload,
    /// Ignored for payloads that cannot carry a caption (text, sticker, ...).
    pub caption: Option<String>,
    pub keyboard: Option<InlineKeyboard>,
    /// Disable forwarding and saving on the receiving side.
    pub protect_content: bool,
}

impl OutgoingMessage {
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            caption: None,
            keyboard: None,
            protect_content: false,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Payload::Text(text.into()))
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn with_keyboard(mut self, keyboard: InlineKeyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    pub fn protected(mut self, protect: bool) -> Self {
        self.protect_content = protect;
        self
    }
}
