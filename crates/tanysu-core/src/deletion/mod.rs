//! Joint deletion of a relayed message and its partner-side copy.

pub mod token;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    callbacks,
    domain::{ChatId, MessageRef},
    errors::Error,
    messaging::{port::MessagingPort, types::OutgoingMessage},
    Result,
};

pub use token::DeleteToken;

/// Control messages remembered for token checks; the oldest is forgotten first.
const ISSUED_CAPACITY: usize = 10_000;

/// Control message to partner copy, for every button this process attached.
#[derive(Default)]
struct Issued {
    partners: HashMap<MessageRef, MessageRef>,
    order: VecDeque<MessageRef>,
}

impl Issued {
    fn insert(&mut self, control: MessageRef, partner: MessageRef) {
        if self.partners.insert(control, partner).is_none() {
            self.order.push_back(control);
        }
        while self.order.len() > ISSUED_CAPACITY {
            if let Some(old) = self.order.pop_front() {
                self.partners.remove(&old);
            }
        }
    }
}

pub struct DeletionCorrelator {
    messenger: Arc<dyn MessagingPort>,
    issued: Mutex<Issued>,
}

impl DeletionCorrelator {
    pub fn new(messenger: Arc<dyn MessagingPort>) -> Self {
        Self {
            messenger,
            issued: Mutex::new(Issued::default()),
        }
    }

    /// Whether `token` matches a button attached by this process.
    ///
    /// `None` when its control message is unknown, e.g. issued before a
    /// restart or already evicted.
    pub async fn issued(&self, token: &DeleteToken) -> Option<bool> {
        let issued = self.issued.lock().await;
        issued
            .partners
            .get(&token.sender)
            .map(|partner| *partner == token.partner)
    }

    /// Send the sender-side control message for `partner_msg` and give it a
    /// delete button whose token names both messages.
    ///
    /// The button is attached in a second call because the token needs the
    /// control message's own id. If that call fails the control message stays
    /// without a button.
    pub async fn attach(
        &self,
        sender_chat: ChatId,
        partner_msg: MessageRef,
        notice: &str,
        protect_content: bool,
    ) -> Result<MessageRef> {
        let control = self
            .messenger
            .send(
                &sender_chat.into(),
                OutgoingMessage::text(notice).protected(protect_content),
            )
            .await?;

        let token = DeleteToken::new(control, partner_msg);
        self.issued.lock().await.insert(control, partner_msg);
        if let Err(e) = self
            .messenger
            .set_keyboard(control, callbacks::delete_keyboard(&token))
            .await
        {
            warn!(
                chat = control.chat_id.0,
                message = control.message_id.0,
                "failed to attach delete button: {e}"
            );
        }
        Ok(control)
    }

    /// Delete both messages named by `token`, concurrently.
    pub async fn delete_both(&self, token: &DeleteToken) -> Result<()> {
        let (sender, partner) = tokio::join!(
            self.messenger.delete_message(token.sender),
            self.messenger.delete_message(token.partner),
        );

        if let Err(e) = &sender {
            warn!(chat = token.sender.chat_id.0, "sender-side delete failed: {e}");
        }
        if let Err(e) = &partner {
            warn!(chat = token.partner.chat_id.0, "partner-side delete failed: {e}");
        }

        match (sender.is_ok(), partner.is_ok()) {
            (true, true) => {
                info!(token = %token, "deleted both copies");
                Ok(())
            }
            (false, false) => Err(Error::DeleteFailed),
            (sender_deleted, partner_deleted) => Err(Error::PartialDeleteFailure {
                sender_deleted,
                partner_deleted,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::MessageId, messaging::fake::FakeMessenger};

    fn setup() -> (Arc<FakeMessenger>, DeletionCorrelator) {
        let fake = Arc::new(FakeMessenger::default());
        (fake.clone(), DeletionCorrelator::new(fake))
    }

    #[tokio::test]
    async fn attach_names_control_and_partner_copy() {
        let (fake, correlator) = setup();
        let partner = MessageRef::new(ChatId(200), MessageId(77));

        let control = correlator
            .attach(ChatId(100), partner, "Message sent", true)
            .await
            .unwrap();

        let sent = fake.sent_to(ChatId(100));
        assert_eq!(sent.len(), 1);
        assert!(sent[0].msg.protect_content);

        let edits = fake.keyboard_edits();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].0, control);
        let data = &edits[0].1.buttons[0].callback_data;
        assert_eq!(
            DeleteToken::decode(data).unwrap(),
            DeleteToken::new(control, partner)
        );
    }

    #[tokio::test]
    async fn attached_tokens_are_remembered() {
        let (_fake, correlator) = setup();
        let partner = MessageRef::new(ChatId(200), MessageId(77));
        let control = correlator
            .attach(ChatId(100), partner, "Message sent", false)
            .await
            .unwrap();

        let genuine = DeleteToken::new(control, partner);
        assert_eq!(correlator.issued(&genuine).await, Some(true));

        let redirected =
            DeleteToken::new(control, MessageRef::new(ChatId(300), MessageId(9)));
        assert_eq!(correlator.issued(&redirected).await, Some(false));

        let unknown = DeleteToken::decode("delete_100_5_200_6").unwrap();
        assert_eq!(correlator.issued(&unknown).await, None);
    }

    #[test]
    fn issued_registry_is_bounded() {
        let mut issued = Issued::default();
        let partner = MessageRef::new(ChatId(200), MessageId(1));
        for id in 0..(ISSUED_CAPACITY as i32 + 5) {
            issued.insert(MessageRef::new(ChatId(100), MessageId(id)), partner);
        }
        assert_eq!(issued.partners.len(), ISSUED_CAPACITY);
        assert!(!issued
            .partners
            .contains_key(&MessageRef::new(ChatId(100), MessageId(0))));
    }

    #[tokio::test]
    async fn delete_both_removes_both() {
        let (fake, correlator) = setup();
        let token = DeleteToken::decode("delete_100_5_200_6").unwrap();
        correlator.delete_both(&token).await.unwrap();

        let mut deleted = fake.deleted();
        deleted.sort_by_key(|m| m.chat_id.0);
        assert_eq!(deleted, vec![token.sender, token.partner]);
    }

    #[tokio::test]
    async fn one_side_failing_is_partial() {
        let (fake, correlator) = setup();
        let token = DeleteToken::decode("delete_100_5_200_6").unwrap();
        fake.make_undeletable(token.partner);

        assert!(matches!(
            correlator.delete_both(&token).await,
            Err(Error::PartialDeleteFailure {
                sender_deleted: true,
                partner_deleted: false
            })
        ));
        assert_eq!(fake.deleted(), vec![token.sender]);
    }

    #[tokio::test]
    async fn both_sides_failing_is_delete_failed() {
        let (fake, correlator) = setup();
        let token = DeleteToken::decode("delete_100_5_200_6").unwrap();
        fake.make_undeletable(token.sender);
        fake.make_undeletable(token.partner);

        assert!(matches!(
            correlator.delete_both(&token).await,
            Err(Error::DeleteFailed)
        ));
    }
}
