use crate::domain::UserId;

/// Core error type.
///
/// Adapter crates map their transport errors into `External` so the core can
/// decide between a user-facing notice and a forced release.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),

    /// One of the participants already has a partner. No state was changed.
    #[error("participant {0} is already paired")]
    AlreadyPaired(UserId),

    /// Self-pairing, or the target is not waiting for a partner.
    #[error("invalid pairing: {0}")]
    InvalidPairing(String),

    /// Sending to the partner's chat failed (blocked bot, deleted account, ...).
    #[error("partner {partner} is unreachable: {reason}")]
    PartnerUnreachable { partner: UserId, reason: String },

    /// The backing store rejected a read or commit. Nothing was mutated.
    #[error("state store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("malformed delete token: {0:?}")]
    MalformedToken(String),

    /// Exactly one of the two deletes went through.
    #[error("partial delete failure (sender deleted: {sender_deleted}, partner deleted: {partner_deleted})")]
    PartialDeleteFailure {
        sender_deleted: bool,
        partner_deleted: bool,
    },

    #[error("neither message could be deleted")]
    DeleteFailed,
}

pub type Result<T> = std::result::Result<T, Error>;
