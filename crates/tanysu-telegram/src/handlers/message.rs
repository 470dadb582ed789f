use std::sync::Arc;

use teloxide::{prelude::*, types::PhotoSize};
use tracing::warn;

use tanysu_core::{
    messaging::types::{FileHandle, Payload},
    relay::RelayEnvelope,
    service::Participant,
};

use crate::router::AppState;

pub(crate) async fn handle_message(
    msg: &Message,
    participant: &Participant,
    state: &Arc<AppState>,
) -> ResponseResult<()> {
    let sender = match state.service.ensure_profile(participant).await {
        Ok(profile) => profile.display_name(),
        Err(e) => {
            warn!(user = %participant.user, "profile lookup failed: {e}");
            participant.user.to_string()
        }
    };

    let env = RelayEnvelope::new(
        sender,
        participant.chat,
        payload_of(msg),
        msg.caption().map(str::to_string),
    );

    if let Err(e) = state.service.on_message(participant, &env).await {
        warn!(
            user = %participant.user,
            kind = env.kind().as_str(),
            "message handling failed: {e}"
        );
    }
    Ok(())
}

fn file(id: &str) -> FileHandle {
    FileHandle(id.to_string())
}

/// Highest resolution variant; Telegram lists several sizes per photo.
fn largest(photos: &[PhotoSize]) -> Option<&PhotoSize> {
    photos.iter().max_by_key(|p| p.width * p.height)
}

pub(crate) fn payload_of(msg: &Message) -> Payload {
    if let Some(text) = msg.text() {
        return Payload::Text(text.to_string());
    }
    if let Some(p) = msg.photo().and_then(largest) {
        return Payload::Photo(file(&p.file.id));
    }
    if let Some(v) = msg.video() {
        return Payload::Video(file(&v.file.id));
    }
    if let Some(v) = msg.voice() {
        return Payload::Voice(file(&v.file.id));
    }
    if let Some(v) = msg.video_note() {
        return Payload::VideoNote(file(&v.file.id));
    }
    if let Some(d) = msg.document() {
        return Payload::Document(file(&d.file.id));
    }
    if let Some(a) = msg.audio() {
        return Payload::Audio(file(&a.file.id));
    }
    if let Some(l) = msg.location() {
        return Payload::Location {
            latitude: l.latitude,
            longitude: l.longitude,
        };
    }
    if let Some(s) = msg.sticker() {
        return Payload::Sticker(file(&s.file.id));
    }
    if let Some(c) = msg.contact() {
        return Payload::Contact {
            phone_number: c.phone_number.clone(),
            first_name: c.first_name.clone(),
            last_name: c.last_name.clone(),
        };
    }
    if let Some(p) = msg.poll() {
        return Payload::Poll {
            question: p.question.clone(),
            options: p.options.iter().map(|o| o.text.clone()).collect(),
        };
    }
    Payload::Unknown
}
