//! Forwarding of one inbound message to the partner, the sender's delete
//! control, and the oversight mirror.
//!
//! Per-kind behaviour lives in [`kinds`]; everything here is generic over the
//! payload.

pub mod envelope;
pub mod kinds;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    callbacks,
    deletion::DeletionCorrelator,
    domain::{ChatId, MessageRef, UserId},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{Destination, OutgoingMessage, Payload},
    },
    utils::fit_utf16,
    Result,
};

pub use envelope::{PayloadKind, RelayEnvelope};
pub use kinds::{rule, KindRule};

/// Telegram's limits, in UTF-16 code units, after the sender prefix is added.
pub const MAX_TEXT_LEN: usize = 4096;
pub const MAX_CAPTION_LEN: usize = 1024;

pub const CONTROL_NOTICE: &str =
    "Message delivered. To delete it for both of you, press the button below.";

/// What a successful relay left behind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayReceipt {
    pub partner_message: MessageRef,
    /// Sender-side control message, for deletable kinds.
    pub control: Option<MessageRef>,
    /// Oversight-channel copies that were actually posted.
    pub mirrors: Vec<MessageRef>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayOutcome {
    Relayed(RelayReceipt),
    /// Nothing reached the partner; `notice` was sent back to the sender.
    Unsupported { notice: String },
}

pub struct RelayDispatcher {
    messenger: Arc<dyn MessagingPort>,
    correlator: Arc<DeletionCorrelator>,
    oversight: Option<Destination>,
    protect_content: bool,
}

impl RelayDispatcher {
    pub fn new(
        messenger: Arc<dyn MessagingPort>,
        correlator: Arc<DeletionCorrelator>,
        oversight: Option<Destination>,
        protect_content: bool,
    ) -> Self {
        Self {
            messenger,
            correlator,
            oversight,
            protect_content,
        }
    }

    /// Forward `env` from `sender` to `partner`.
    ///
    /// Only the send to the partner must succeed; its failure is
    /// `PartnerUnreachable` and the caller is expected to release the pair.
    /// Control message and mirror failures are logged.
    pub async fn relay(
        &self,
        env: &RelayEnvelope,
        sender: UserId,
        partner: UserId,
    ) -> Result<RelayOutcome> {
        let kind = env.kind();
        if kind == PayloadKind::Unknown {
            let notice = unsupported_notice();
            self.messenger
                .send(
                    &env.sender_chat().into(),
                    OutgoingMessage::text(notice.clone()),
                )
                .await?;
            debug!(user = %sender, "unsupported payload; notice sent");
            return Ok(RelayOutcome::Unsupported { notice });
        }

        let rule = rule(kind);
        let partner_message = self
            .messenger
            .send(
                &ChatId::from(partner).into(),
                partner_copy(env, rule, self.protect_content),
            )
            .await
            .map_err(|e| Error::PartnerUnreachable {
                partner,
                reason: e.to_string(),
            })?;

        let control = if rule.deletable {
            match self
                .correlator
                .attach(
                    env.sender_chat(),
                    partner_message,
                    CONTROL_NOTICE,
                    self.protect_content,
                )
                .await
            {
                Ok(control) => Some(control),
                Err(e) => {
                    warn!(user = %sender, "failed to send delete control: {e}");
                    None
                }
            }
        } else {
            None
        };

        let mirrors = match &self.oversight {
            Some(channel) => self.mirror(channel, env, rule, partner).await,
            None => Vec::new(),
        };

        debug!(
            user = %sender,
            partner = %partner,
            kind = kind.as_str(),
            mirrors = mirrors.len(),
            "relayed"
        );
        Ok(RelayOutcome::Relayed(RelayReceipt {
            partner_message,
            control,
            mirrors,
        }))
    }

    async fn mirror(
        &self,
        channel: &Destination,
        env: &RelayEnvelope,
        rule: &KindRule,
        partner: UserId,
    ) -> Vec<MessageRef> {
        let header = mirror_header(env, rule, partner);
        let sends = match env.payload() {
            Payload::Text(_) => vec![OutgoingMessage::text(fit_utf16(&header, MAX_TEXT_LEN))],
            payload if rule.captionable => vec![OutgoingMessage::new(payload.clone())
                .with_caption(fit_utf16(&header, MAX_CAPTION_LEN))],
            payload => vec![
                OutgoingMessage::new(payload.clone()),
                OutgoingMessage::text(fit_utf16(&header, MAX_TEXT_LEN)),
            ],
        };

        let mut posted = Vec::with_capacity(sends.len());
        for msg in sends {
            match self.messenger.send(channel, msg).await {
                Ok(at) => posted.push(at),
                Err(e) => warn!(%channel, "oversight mirror failed: {e}"),
            }
        }
        posted
    }
}

/// The message the partner receives.
pub fn partner_copy(env: &RelayEnvelope, rule: &KindRule, protect: bool) -> OutgoingMessage {
    let sender = env.sender();
    let mut msg = match env.payload() {
        Payload::Text(text) => {
            OutgoingMessage::text(fit_utf16(&format!("@{sender}: {text}"), MAX_TEXT_LEN))
        }
        payload if rule.captionable => {
            let caption = match env.caption() {
                Some(c) => format!("@{sender}: {c}"),
                None => format!("@{sender} sent a {}", rule.label),
            };
            OutgoingMessage::new(payload.clone())
                .with_caption(fit_utf16(&caption, MAX_CAPTION_LEN))
        }
        payload => OutgoingMessage::new(payload.clone()),
    };
    if rule.exit_button {
        msg = msg.with_keyboard(callbacks::exit_keyboard());
    }
    msg.protected(protect)
}

/// `@{sender} → {partner}: {body}` plus a detail line where the payload has one.
pub fn mirror_header(env: &RelayEnvelope, rule: &KindRule, partner: UserId) -> String {
    let body = match env.payload() {
        Payload::Text(text) => text.as_str(),
        _ => env.caption().unwrap_or(rule.label),
    };
    let mut header = format!("@{} → {partner}: {body}", env.sender());
    if let Some(detail) = env.payload().detail() {
        header.push('\n');
        header.push_str(&detail);
    }
    header
}

pub fn unsupported_notice() -> String {
    let labels: Vec<&str> = PayloadKind::ALL
        .into_iter()
        .filter(|k| *k != PayloadKind::Unknown && *k != PayloadKind::Text)
        .map(|k| rule(k).label)
        .collect();
    format!(
        "This type of message can't be relayed. You can send text, {}.",
        labels.join(", ")
    )
}
