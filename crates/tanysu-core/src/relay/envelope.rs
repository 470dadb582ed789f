use crate::{domain::ChatId, messaging::types::Payload};

/// Payload discriminant, used as the key into the relay table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Text,
    Photo,
    Video,
    Voice,
    VideoNote,
    Document,
    Audio,
    Location,
    Sticker,
    Contact,
    Poll,
    Unknown,
}

impl PayloadKind {
    pub const ALL: [PayloadKind; 12] = [
        PayloadKind::Text,
        PayloadKind::Photo,
        PayloadKind::Video,
        PayloadKind::Voice,
        PayloadKind::VideoNote,
        PayloadKind::Document,
        PayloadKind::Audio,
        PayloadKind::Location,
        PayloadKind::Sticker,
        PayloadKind::Contact,
        PayloadKind::Poll,
        PayloadKind::Unknown,
    ];

    /// Stable lowercase name for logs and the audit file.
    pub fn as_str(self) -> &'static str {
        match self {
            PayloadKind::Text => "text",
            PayloadKind::Photo => "photo",
            PayloadKind::Video => "video",
            PayloadKind::Voice => "voice",
            PayloadKind::VideoNote => "video_note",
            PayloadKind::Document => "document",
            PayloadKind::Audio => "audio",
            PayloadKind::Location => "location",
            PayloadKind::Sticker => "sticker",
            PayloadKind::Contact => "contact",
            PayloadKind::Poll => "poll",
            PayloadKind::Unknown => "unknown",
        }
    }
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Text(_) => PayloadKind::Text,
            Payload::Photo(_) => PayloadKind::Photo,
            Payload::Video(_) => PayloadKind::Video,
            Payload::Voice(_) => PayloadKind::Voice,
            Payload::VideoNote(_) => PayloadKind::VideoNote,
            Payload::Document(_) => PayloadKind::Document,
            Payload::Audio(_) => PayloadKind::Audio,
            Payload::Location { .. } => PayloadKind::Location,
            Payload::Sticker(_) => PayloadKind::Sticker,
            Payload::Contact { .. } => PayloadKind::Contact,
            Payload::Poll { .. } => PayloadKind::Poll,
            Payload::Unknown => PayloadKind::Unknown,
        }
    }

    /// One-line description of payloads whose content is not a file or text.
    pub fn detail(&self) -> Option<String> {
        match self {
            Payload::Location {
                latitude,
                longitude,
            } => Some(format!("{latitude:.5}, {longitude:.5}")),
            Payload::Contact {
                phone_number,
                first_name,
                last_name,
            } => {
                let name = match last_name {
                    Some(last) if !last.is_empty() => format!("{first_name} {last}"),
                    _ => first_name.clone(),
                };
                Some(format!("{phone_number} {name}"))
            }
            Payload::Poll { question, .. } => Some(question.clone()),
            _ => None,
        }
    }
}

/// One inbound message, normalized for forwarding.
///
/// Built once per inbound message and consumed by a single relay call.
#[derive(Clone, Debug, PartialEq)]
pub struct RelayEnvelope {
    sender: String,
    sender_chat: ChatId,
    payload: Payload,
    caption: Option<String>,
}

impl RelayEnvelope {
    /// `sender` is the display identifier shown to the partner (no leading `@`).
    /// Blank captions are dropped.
    pub fn new(
        sender: impl Into<String>,
        sender_chat: ChatId,
        payload: Payload,
        caption: Option<String>,
    ) -> Self {
        let sender: String = sender.into();
        Self {
            sender: sender.trim_start_matches('@').to_string(),
            sender_chat,
            payload,
            caption: caption.filter(|c| !c.trim().is_empty()),
        }
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn sender_chat(&self) -> ChatId {
        self.sender_chat
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn caption(&self) -> Option<&str> {
        self.caption.as_deref()
    }

    pub fn kind(&self) -> PayloadKind {
        self.payload.kind()
    }
}
