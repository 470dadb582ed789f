use crate::relay::envelope::PayloadKind;

/// How one payload kind is relayed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KindRule {
    pub kind: PayloadKind,
    /// Used in `@{sender} sent a {label}`.
    pub label: &'static str,
    /// The transport accepts a caption alongside this payload.
    pub captionable: bool,
    /// The partner's copy carries the exit button.
    pub exit_button: bool,
    /// The sender gets a control message with a delete button.
    pub deletable: bool,
}

const fn row(
    kind: PayloadKind,
    label: &'static str,
    captionable: bool,
    exit_button: bool,
    deletable: bool,
) -> KindRule {
    KindRule {
        kind,
        label,
        captionable,
        exit_button,
        deletable,
    }
}

/// Indexed by `PayloadKind as usize`.
static TABLE: [KindRule; 12] = [
    row(PayloadKind::Text, "message", false, true, true),
    row(PayloadKind::Photo, "photo", true, true, true),
    row(PayloadKind::Video, "video", true, true, true),
    row(PayloadKind::Voice, "voice message", true, true, true),
    row(PayloadKind::VideoNote, "video note", false, true, true),
    row(PayloadKind::Document, "document", true, true, true),
    row(PayloadKind::Audio, "audio", true, true, true),
    row(PayloadKind::Location, "location", false, true, false),
    row(PayloadKind::Sticker, "sticker", false, true, false),
    row(PayloadKind::Contact, "contact", false, true, false),
    row(PayloadKind::Poll, "poll", false, false, false),
    row(PayloadKind::Unknown, "message", false, false, false),
];

pub fn rule(kind: PayloadKind) -> &'static KindRule {
    &TABLE[kind as usize]
}
