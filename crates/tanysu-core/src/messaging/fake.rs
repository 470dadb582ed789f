use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{Destination, InlineKeyboard, OutgoingMessage},
    },
    Result,
};

/// Chat id reported for messages posted to a `@channel` destination.
pub(crate) const CHANNEL_CHAT: ChatId = ChatId(-1000);

#[derive(Clone, Debug)]
pub(crate) struct SentMessage {
    pub to: Destination,
    pub msg: OutgoingMessage,
    pub at: MessageRef,
}

/// Recording messenger with failure injection.
#[derive(Default)]
pub(crate) struct FakeMessenger {
    next_id: Mutex<i32>,
    sends: Mutex<Vec<SentMessage>>,
    keyboards: Mutex<Vec<(MessageRef, InlineKeyboard)>>,
    deletes: Mutex<Vec<MessageRef>>,
    answers: Mutex<Vec<(String, Option<String>)>>,
    unreachable: Mutex<HashSet<Destination>>,
    undeletable: Mutex<HashSet<MessageRef>>,
}

impl FakeMessenger {
    fn alloc(&self, chat_id: ChatId) -> MessageRef {
        let mut guard = self.next_id.lock().unwrap();
        if *guard == 0 {
            *guard = 1;
        }
        let id = *guard;
        *guard += 1;
        MessageRef::new(chat_id, MessageId(id))
    }

    /// Every send to `to` fails from now on.
    pub fn make_unreachable(&self, to: impl Into<Destination>) {
        self.unreachable.lock().unwrap().insert(to.into());
    }

    /// Deleting `msg` fails from now on.
    pub fn make_undeletable(&self, msg: MessageRef) {
        self.undeletable.lock().unwrap().insert(msg);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sends.lock().unwrap().clone()
    }

    pub fn sent_to(&self, to: impl Into<Destination>) -> Vec<SentMessage> {
        let to = to.into();
        self.sent().into_iter().filter(|s| s.to == to).collect()
    }

    /// Text bodies sent to `to`, in order.
    pub fn texts_to(&self, to: impl Into<Destination>) -> Vec<String> {
        self.sent_to(to)
            .into_iter()
            .filter_map(|s| match s.msg.payload {
                crate::messaging::types::Payload::Text(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn keyboard_edits(&self) -> Vec<(MessageRef, InlineKeyboard)> {
        self.keyboards.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<MessageRef> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn answered(&self) -> Vec<(String, Option<String>)> {
        self.answers.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    async fn send(&self, to: &Destination, msg: OutgoingMessage) -> Result<MessageRef> {
        if self.unreachable.lock().unwrap().contains(to) {
            return Err(Error::External(format!(
                "telegram error: Forbidden: bot was blocked by the user ({to})"
            )));
        }
        let chat_id = match to {
            Destination::Chat(c) => *c,
            Destination::Channel(_) => CHANNEL_CHAT,
        };
        let at = self.alloc(chat_id);
        self.sends.lock().unwrap().push(SentMessage {
            to: to.clone(),
            msg,
            at,
        });
        Ok(at)
    }

    async fn set_keyboard(&self, msg: MessageRef, keyboard: InlineKeyboard) -> Result<()> {
        self.keyboards.lock().unwrap().push((msg, keyboard));
        Ok(())
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        if self.undeletable.lock().unwrap().contains(&msg) {
            return Err(Error::External(
                "telegram error: message can't be deleted".to_string(),
            ));
        }
        self.deletes.lock().unwrap().push(msg);
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.answers
            .lock()
            .unwrap()
            .push((callback_id.to_string(), text.map(|t| t.to_string())));
        Ok(())
    }
}
