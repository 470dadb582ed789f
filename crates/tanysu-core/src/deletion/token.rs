use std::{fmt, str::FromStr};

use crate::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
};

pub const PREFIX: &str = "delete_";

/// Names both copies of one relayed message.
///
/// Encoded as `delete_{sender_chat}_{sender_msg}_{partner_chat}_{partner_msg}`
/// into the callback data of the sender's delete button.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeleteToken {
    pub sender: MessageRef,
    pub partner: MessageRef,
}

impl DeleteToken {
    pub fn new(sender: MessageRef, partner: MessageRef) -> Self {
        Self { sender, partner }
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }

    pub fn decode(raw: &str) -> Result<Self, Error> {
        raw.parse()
    }
}

impl fmt::Display for DeleteToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PREFIX}{}_{}_{}_{}",
            self.sender.chat_id.0,
            self.sender.message_id.0,
            self.partner.chat_id.0,
            self.partner.message_id.0
        )
    }
}

impl FromStr for DeleteToken {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let malformed = || Error::MalformedToken(raw.to_string());

        let body = raw.strip_prefix(PREFIX).ok_or_else(malformed)?;
        let parts: Vec<&str> = body.split('_').collect();
        let [sc, sm, pc, pm] = parts.as_slice() else {
            return Err(malformed());
        };

        let chat = |s: &str| s.parse::<i64>().map(ChatId).map_err(|_| malformed());
        let msg = |s: &str| s.parse::<i32>().map(MessageId).map_err(|_| malformed());

        Ok(Self {
            sender: MessageRef::new(chat(sc)?, msg(sm)?),
            partner: MessageRef::new(chat(pc)?, msg(pm)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(sc: i64, sm: i32, pc: i64, pm: i32) -> DeleteToken {
        DeleteToken::new(
            MessageRef::new(ChatId(sc), MessageId(sm)),
            MessageRef::new(ChatId(pc), MessageId(pm)),
        )
    }

    #[test]
    fn encodes_in_field_order() {
        assert_eq!(token(1, 2, 3, 4).encode(), "delete_1_2_3_4");
        assert_eq!(DeleteToken::decode("delete_1_2_3_4").unwrap(), token(1, 2, 3, 4));
    }

    #[test]
    fn negative_chat_ids_survive() {
        let t = token(-1001234567890, 15, 987654321, 16);
        assert_eq!(DeleteToken::decode(&t.encode()).unwrap(), t);
    }

    #[test]
    fn rejects_wrong_arity_and_garbage() {
        for raw in [
            "delete_1_2_3",
            "delete_1_2_3_4_5",
            "delete_a_2_3_4",
            "delete_1_2_3_",
            "remove_1_2_3_4",
            "delete_",
            "",
        ] {
            assert!(
                matches!(DeleteToken::decode(raw), Err(Error::MalformedToken(_))),
                "{raw:?} should be malformed"
            );
        }
    }

    #[test]
    fn fits_in_callback_data() {
        let t = token(-1001234567890, i32::MAX, 9_999_999_999, i32::MAX);
        assert!(t.encode().len() <= 64);
    }
}
