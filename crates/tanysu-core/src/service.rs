//! User-facing flows: greeting, queueing, selection, relay, exit, deletion and
//! onboarding. Transport adapters translate updates into these calls.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    callbacks::{self, CallbackAction},
    config::Config,
    deletion::{DeleteToken, DeletionCorrelator},
    domain::{ChatId, UserId},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{Destination, InlineKeyboard, OutgoingMessage, Payload},
    },
    pairing::{EnqueueOutcome, PairingEngine},
    profile::{Profile, ProfileStore},
    registration,
    relay::{RelayDispatcher, RelayEnvelope, RelayOutcome},
    utils::{AuditEvent, AuditLogger},
    Result,
};

const NOBODY_WAITING: &str = "Nobody is available yet. You are in the queue, please wait...";
const CHOOSE_PARTNER: &str = "Choose who you want to talk to:";
const ALREADY_IN_CHAT: &str = "You are already in a chat. Press '🔕 Leave chat' to end it first.";
const TARGET_BUSY: &str = "This participant is already talking to someone. Please choose another.";
const TARGET_GONE: &str = "This participant is no longer waiting. Press '💬 Chat' to refresh the list.";
const TARGET_UNREACHABLE: &str =
    "This participant can't be reached right now. Press '💬 Chat' to try again.";
const PARTNER_LEFT: &str = "Your partner left the chat.";
const YOU_LEFT: &str = "You left the chat.";
const PARTNER_UNREACHABLE: &str =
    "Your partner can't be reached anymore, so the chat has ended. Press '💬 Chat' to find someone new.";
const NOT_CONNECTED: &str =
    "You are not connected to anyone yet. Press '💬 Chat' to find a partner.";
const DELETED: &str = "The message was deleted for both of you.";
const DELETE_MALFORMED: &str = "Could not delete this message.";
const DELETE_FAILED: &str = "The message could not be deleted.";
const DELETED_ONLY_PARTNER: &str =
    "The message was deleted for your partner, but your own copy could not be removed.";
const DELETED_ONLY_SENDER: &str =
    "Your copy was deleted, but the message could not be removed for your partner.";
const LOCATION_SAVED: &str = "Location saved. You can now press '💬 Chat' to find a partner.";
const LOCATION_SAVED_NEED_PHOTO: &str = "Location saved.";
const REGISTERED_NEED_LOCATION: &str =
    "Almost done! Now share your location (attachment → Location).";
const REGISTERED: &str = "Registration complete! Press '💬 Chat' to find a partner.";

/// The participant an update came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Participant {
    pub user: UserId,
    pub chat: ChatId,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
}

impl Participant {
    pub fn new(user: UserId, chat: ChatId, first_name: impl Into<String>) -> Self {
        Self {
            user,
            chat,
            username: None,
            first_name: first_name.into(),
            last_name: None,
        }
    }

    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username.filter(|u| !u.is_empty());
        self
    }

    pub fn with_last_name(mut self, last_name: Option<String>) -> Self {
        self.last_name = last_name.filter(|l| !l.is_empty());
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct ServiceSettings {
    pub oversight: Option<Destination>,
    pub require_complete_profile: bool,
    pub protect_content: bool,
    pub audit: Option<AuditLogger>,
}

impl ServiceSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            oversight: cfg.oversight_channel.clone(),
            require_complete_profile: cfg.require_complete_profile,
            protect_content: cfg.protect_content,
            audit: Some(AuditLogger::new(
                cfg.audit_log_path.clone(),
                cfg.audit_log_json,
            )),
        }
    }
}

pub struct ChatService {
    engine: Arc<PairingEngine>,
    relay: RelayDispatcher,
    correlator: Arc<DeletionCorrelator>,
    profiles: Arc<dyn ProfileStore>,
    messenger: Arc<dyn MessagingPort>,
    require_complete_profile: bool,
    audit: Option<AuditLogger>,
}

impl ChatService {
    pub fn new(
        engine: Arc<PairingEngine>,
        profiles: Arc<dyn ProfileStore>,
        messenger: Arc<dyn MessagingPort>,
        settings: ServiceSettings,
    ) -> Self {
        let correlator = Arc::new(DeletionCorrelator::new(messenger.clone()));
        let relay = RelayDispatcher::new(
            messenger.clone(),
            correlator.clone(),
            settings.oversight,
            settings.protect_content,
        );
        Self {
            engine,
            relay,
            correlator,
            profiles,
            messenger,
            require_complete_profile: settings.require_complete_profile,
            audit: settings.audit,
        }
    }

    pub fn engine(&self) -> &PairingEngine {
        &self.engine
    }

    fn audit(&self, event: AuditEvent) {
        if let Some(log) = &self.audit {
            log.record(event);
        }
    }

    async fn reply(
        &self,
        to: ChatId,
        text: impl Into<String>,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<()> {
        let mut msg = OutgoingMessage::text(text);
        if let Some(kb) = keyboard {
            msg = msg.with_keyboard(kb);
        }
        self.messenger.send(&to.into(), msg).await?;
        Ok(())
    }

    /// Like `reply`, for chats other than the one the update came from.
    async fn notify(&self, to: UserId, text: &str, keyboard: Option<InlineKeyboard>) {
        if let Err(e) = self.reply(ChatId::from(to), text, keyboard).await {
            warn!(user = %to, "notification failed: {e}");
        }
    }

    /// Profile of `p`, inserting a bare one on first contact.
    pub async fn ensure_profile(&self, p: &Participant) -> Result<Profile> {
        if let Some(profile) = self.profiles.get_profile(p.user).await? {
            return Ok(profile);
        }
        let profile = Profile::new(
            p.user,
            p.username.clone(),
            p.first_name.clone(),
            p.last_name.clone(),
        );
        self.profiles.upsert_profile(profile.clone()).await?;
        info!(user = %p.user, "new participant");
        Ok(profile)
    }

    async fn display_name(&self, id: UserId) -> String {
        match self.profiles.get_profile(id).await {
            Ok(Some(p)) => p.display_name(),
            _ => id.to_string(),
        }
    }

    /// `/start` and `/hello`.
    pub async fn on_start(&self, p: &Participant) -> Result<()> {
        self.ensure_profile(p).await?;
        let greeting = format!(
            "Hello, {}! Press '💬 Chat' to find someone to talk to.",
            p.first_name
        );
        self.reply(p.chat, greeting, Some(callbacks::chat_keyboard()))
            .await
    }

    /// Route one button press and acknowledge it.
    pub async fn on_callback(&self, p: &Participant, callback_id: &str, data: &str) -> Result<()> {
        let result = match CallbackAction::parse(data) {
            Ok(Some(CallbackAction::Chat)) => self.on_chat(p).await,
            Ok(Some(CallbackAction::Select(target))) => self.on_select(p, target).await,
            Ok(Some(CallbackAction::Exit)) => self.on_exit(p).await,
            Ok(Some(CallbackAction::Delete(token))) => self.on_delete(p, &token).await,
            Ok(None) => {
                info!(user = %p.user, data, "ignoring unknown callback");
                Ok(())
            }
            Err(Error::MalformedToken(raw)) => {
                warn!(user = %p.user, %raw, "malformed delete token");
                self.audit(AuditEvent::delete(p.user, Some("malformed token")));
                self.reply(p.chat, DELETE_MALFORMED, None).await
            }
            Err(e) => {
                warn!(user = %p.user, data, "bad callback data: {e}");
                self.reply(p.chat, TARGET_GONE, Some(callbacks::chat_keyboard()))
                    .await
            }
        };

        if let Err(e) = self.messenger.answer_callback_query(callback_id, None).await {
            warn!(user = %p.user, "failed to answer callback: {e}");
        }
        result
    }

    /// Join the queue and list who else is waiting.
    pub async fn on_chat(&self, p: &Participant) -> Result<()> {
        let profile = self.ensure_profile(p).await?;
        if self.require_complete_profile && !profile.is_complete() {
            return self.reply(p.chat, registration::INSTRUCTIONS, None).await;
        }

        if let EnqueueOutcome::AlreadyPaired(_) = self.engine.enqueue(p.user).await? {
            return self
                .reply(p.chat, ALREADY_IN_CHAT, Some(callbacks::exit_keyboard()))
                .await;
        }

        let candidates = self.engine.list_candidates(p.user).await;
        if candidates.is_empty() {
            return self.reply(p.chat, NOBODY_WAITING, None).await;
        }

        let mut buttons = Vec::with_capacity(candidates.len());
        for id in candidates {
            let label = match self.profiles.get_profile(id).await? {
                Some(profile) => profile.candidate_label(),
                None => format!("User {id}"),
            };
            buttons.push((id, label));
        }
        self.reply(
            p.chat,
            CHOOSE_PARTNER,
            Some(callbacks::candidates_keyboard(&buttons)),
        )
        .await
    }

    /// Pair `p` with the waiting `target` and introduce them.
    pub async fn on_select(&self, p: &Participant, target: UserId) -> Result<()> {
        match self.engine.try_pair(p.user, target).await {
            Ok(()) => {}
            Err(Error::AlreadyPaired(busy)) => {
                let (text, kb) = if busy == p.user {
                    (ALREADY_IN_CHAT, callbacks::exit_keyboard())
                } else {
                    (TARGET_BUSY, callbacks::chat_keyboard())
                };
                return self.reply(p.chat, text, Some(kb)).await;
            }
            Err(Error::InvalidPairing(reason)) => {
                info!(user = %p.user, target = %target, %reason, "selection rejected");
                return self
                    .reply(p.chat, TARGET_GONE, Some(callbacks::chat_keyboard()))
                    .await;
            }
            Err(e) => return Err(e),
        }
        self.audit(AuditEvent::pair(p.user, target));

        let me = self.display_name(p.user).await;
        let them = self.display_name(target).await;

        let intro = format!("You are connected with @{me}. Say hello!");
        if let Err(e) = self
            .reply(
                ChatId::from(target),
                intro,
                Some(callbacks::exit_keyboard()),
            )
            .await
        {
            warn!(user = %p.user, target = %target, "selected participant unreachable: {e}");
            self.engine.release(p.user).await?;
            self.audit(AuditEvent::release(p.user, Some(target), "partner unreachable"));
            return self
                .reply(p.chat, TARGET_UNREACHABLE, Some(callbacks::chat_keyboard()))
                .await;
        }

        self.reply(
            p.chat,
            format!("You are connected with @{them}. Say hello!"),
            Some(callbacks::exit_keyboard()),
        )
        .await
    }

    pub async fn on_exit(&self, p: &Participant) -> Result<()> {
        let partner = self.engine.release(p.user).await?;
        self.audit(AuditEvent::release(p.user, partner, "exit"));
        if let Some(partner) = partner {
            self.notify(partner, PARTNER_LEFT, Some(callbacks::chat_keyboard()))
                .await;
        }
        self.reply(p.chat, YOU_LEFT, Some(callbacks::chat_keyboard()))
            .await
    }

    /// Any non-command message.
    pub async fn on_message(&self, p: &Participant, env: &RelayEnvelope) -> Result<()> {
        let profile = self.ensure_profile(p).await?;

        let Some(partner) = self.engine.get_partner(p.user).await else {
            if !profile.is_complete() {
                return self.register(p, profile, env).await;
            }
            return self
                .reply(p.chat, NOT_CONNECTED, Some(callbacks::chat_keyboard()))
                .await;
        };

        match self.relay.relay(env, p.user, partner).await {
            Ok(RelayOutcome::Relayed(_)) => {
                let content = match env.payload() {
                    Payload::Text(t) => Some(t.as_str()),
                    _ => env.caption(),
                };
                self.audit(AuditEvent::relay(
                    p.user,
                    partner,
                    env.kind().as_str(),
                    content,
                ));
                Ok(())
            }
            Ok(RelayOutcome::Unsupported { .. }) => Ok(()),
            Err(Error::PartnerUnreachable { partner, reason }) => {
                warn!(user = %p.user, partner = %partner, %reason, "partner unreachable; releasing");
                self.engine.release(p.user).await?;
                self.audit(AuditEvent::release(
                    p.user,
                    Some(partner),
                    "partner unreachable",
                ));
                self.reply(p.chat, PARTNER_UNREACHABLE, Some(callbacks::chat_keyboard()))
                    .await
            }
            Err(e) => {
                self.audit(AuditEvent::error(p.user, &e.to_string(), "relay"));
                Err(e)
            }
        }
    }

    /// Onboarding for participants whose profile is incomplete.
    async fn register(&self, p: &Participant, mut profile: Profile, env: &RelayEnvelope) -> Result<()> {
        match env.payload() {
            Payload::Photo(file) => {
                let Some(caption) = env.caption() else {
                    return self.reply(p.chat, registration::INSTRUCTIONS, None).await;
                };
                let form = match registration::parse_caption(caption) {
                    Ok(form) => form,
                    Err(e) => return self.reply(p.chat, e.notice(), None).await,
                };

                profile.avatar_file_id = Some(file.0.clone());
                profile.nickname = Some(form.nickname.clone());
                profile.gender = Some(form.gender);
                profile.age = form.age;
                let complete = profile.is_complete();
                self.profiles.upsert_profile(profile).await?;
                info!(user = %p.user, nickname = %form.nickname, "profile registered");

                self.reply(p.chat, registration::summary(&form), None).await?;
                if complete {
                    self.reply(p.chat, REGISTERED, Some(callbacks::chat_keyboard()))
                        .await
                } else {
                    self.reply(p.chat, REGISTERED_NEED_LOCATION, None).await
                }
            }
            Payload::Location {
                latitude,
                longitude,
            } => {
                profile.geo = Some(registration::format_geo(*latitude, *longitude));
                let complete = profile.is_complete();
                self.profiles.upsert_profile(profile).await?;
                info!(user = %p.user, "location saved");

                if complete {
                    self.reply(p.chat, LOCATION_SAVED, Some(callbacks::chat_keyboard()))
                        .await
                } else {
                    self.reply(
                        p.chat,
                        format!("{LOCATION_SAVED_NEED_PHOTO}\n\n{}", registration::INSTRUCTIONS),
                        None,
                    )
                    .await
                }
            }
            _ => self.reply(p.chat, registration::INSTRUCTIONS, None).await,
        }
    }

    /// Delete both copies named by `token`. Only the original sender may, and
    /// only for a copy the bot relayed to them or to their current partner.
    pub async fn on_delete(&self, p: &Participant, token: &DeleteToken) -> Result<()> {
        if token.sender.chat_id != p.chat {
            warn!(user = %p.user, token = %token, "delete token from another chat");
            self.audit(AuditEvent::delete(p.user, Some("foreign token")));
            return self.reply(p.chat, DELETE_MALFORMED, None).await;
        }
        let vouched = match self.correlator.issued(token).await {
            Some(matches) => matches,
            None => {
                self.engine.get_partner(p.user).await.map(ChatId::from)
                    == Some(token.partner.chat_id)
            }
        };
        if !vouched {
            warn!(
                user = %p.user,
                token = %token,
                "delete token names a copy the bot never relayed"
            );
            self.audit(AuditEvent::delete(p.user, Some("unrecognized partner copy")));
            return self.reply(p.chat, DELETE_MALFORMED, None).await;
        }

        let (notice, error) = match self.correlator.delete_both(token).await {
            Ok(()) => (DELETED, None),
            Err(Error::PartialDeleteFailure {
                partner_deleted, ..
            }) => {
                let notice = if partner_deleted {
                    DELETED_ONLY_PARTNER
                } else {
                    DELETED_ONLY_SENDER
                };
                (notice, Some("partial delete failure"))
            }
            Err(Error::DeleteFailed) => (DELETE_FAILED, Some("delete failed")),
            Err(e) => return Err(e),
        };
        self.audit(AuditEvent::delete(p.user, error));
        self.reply(p.chat, notice, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{MessageId, MessageRef},
        messaging::{fake::FakeMessenger, types::FileHandle},
        pairing::{MemoryStateStore, ParticipantStatus, PairingStats},
        profile::{Gender, MemoryProfileStore},
    };

    const A: UserId = UserId(100);
    const B: UserId = UserId(200);
    const C: UserId = UserId(300);

    struct Harness {
        fake: Arc<FakeMessenger>,
        profiles: Arc<MemoryProfileStore>,
        service: ChatService,
    }

    fn channel() -> Destination {
        Destination::Channel("@tanysu_watch".to_string())
    }

    fn participant(id: UserId) -> Participant {
        Participant::new(id, ChatId::from(id), format!("user{}", id.0))
    }

    fn complete_profile(id: UserId) -> Profile {
        Profile {
            nickname: Some(format!("nick{}", id.0)),
            gender: Some(Gender::Male),
            age: 30,
            geo: Some("43.23800,76.94500".to_string()),
            avatar_file_id: Some(format!("photo{}", id.0)),
            ..Profile::new(id, None, format!("user{}", id.0), None)
        }
    }

    async fn harness(registered: &[UserId]) -> Harness {
        let fake = Arc::new(FakeMessenger::default());
        let profiles = Arc::new(MemoryProfileStore::new());
        for id in registered {
            profiles.upsert_profile(complete_profile(*id)).await.unwrap();
        }
        let engine = Arc::new(
            PairingEngine::open(Arc::new(MemoryStateStore::new()))
                .await
                .unwrap(),
        );
        let service = ChatService::new(
            engine,
            profiles.clone(),
            fake.clone(),
            ServiceSettings {
                oversight: Some(channel()),
                require_complete_profile: true,
                protect_content: true,
                audit: None,
            },
        );
        Harness {
            fake,
            profiles,
            service,
        }
    }

    fn text(from: UserId, body: &str) -> RelayEnvelope {
        RelayEnvelope::new(
            format!("nick{}", from.0),
            ChatId::from(from),
            Payload::Text(body.to_string()),
            None,
        )
    }

    async fn pair(h: &Harness, a: UserId, b: UserId) {
        h.service.on_chat(&participant(a)).await.unwrap();
        h.service.on_chat(&participant(b)).await.unwrap();
        h.service.on_select(&participant(b), a).await.unwrap();
        assert_eq!(h.service.engine().get_partner(a).await, Some(b));
    }

    #[tokio::test]
    async fn queue_select_relay_and_unreachable_release() {
        let h = harness(&[A, B]).await;

        h.service.on_chat(&participant(A)).await.unwrap();
        assert_eq!(h.fake.texts_to(ChatId(100)), vec![NOBODY_WAITING.to_string()]);

        h.service.on_chat(&participant(B)).await.unwrap();
        let list = h.fake.sent_to(ChatId(200));
        let kb = list[0].msg.keyboard.clone().unwrap();
        assert_eq!(kb.buttons[0].callback_data, "select_100");
        assert_eq!(kb.buttons[0].label, "nick100 · Male · 30");

        h.service.on_select(&participant(B), A).await.unwrap();
        assert_eq!(h.service.engine().get_partner(A).await, Some(B));
        assert_eq!(h.service.engine().get_partner(B).await, Some(A));
        assert_eq!(
            h.service.engine().stats().await,
            PairingStats { waiting: 0, pairs: 1 }
        );
        assert!(h
            .fake
            .texts_to(ChatId(100))
            .contains(&"You are connected with @nick200. Say hello!".to_string()));

        h.service.on_message(&participant(A), &text(A, "hi")).await.unwrap();
        assert_eq!(
            h.fake.texts_to(ChatId(200)).last().map(String::as_str),
            Some("@nick100: hi")
        );
        assert_eq!(h.fake.keyboard_edits().len(), 1);
        assert_eq!(h.fake.texts_to(channel()), vec!["@nick100 → 200: hi".to_string()]);

        h.fake.make_unreachable(ChatId(200));
        h.service.on_message(&participant(A), &text(A, "still there?")).await.unwrap();
        assert_eq!(h.service.engine().status(A).await, ParticipantStatus::Idle);
        assert_eq!(h.service.engine().status(B).await, ParticipantStatus::Idle);
        assert_eq!(
            h.fake.texts_to(ChatId(100)).last().map(String::as_str),
            Some(PARTNER_UNREACHABLE)
        );
    }

    #[tokio::test]
    async fn incomplete_profile_cannot_queue() {
        let h = harness(&[]).await;
        h.service.on_chat(&participant(A)).await.unwrap();

        assert_eq!(h.service.engine().status(A).await, ParticipantStatus::Idle);
        assert_eq!(
            h.fake.texts_to(ChatId(100)),
            vec![registration::INSTRUCTIONS.to_string()]
        );
        assert!(h.profiles.user_exists(A).await.unwrap());
    }

    #[tokio::test]
    async fn registration_by_photo_then_location() {
        let h = harness(&[]).await;
        let me = participant(A);

        let photo = RelayEnvelope::new(
            "user100",
            me.chat,
            Payload::Photo(FileHandle("AgADbig".to_string())),
            Some("@aruzhan\nӘйел\n23".to_string()),
        );
        h.service.on_message(&me, &photo).await.unwrap();
        let profile = h.profiles.get_profile(A).await.unwrap().unwrap();
        assert_eq!(profile.nickname.as_deref(), Some("aruzhan"));
        assert_eq!(profile.avatar_file_id.as_deref(), Some("AgADbig"));
        assert!(!profile.is_complete());

        let location = RelayEnvelope::new(
            "user100",
            me.chat,
            Payload::Location {
                latitude: 43.238949,
                longitude: 76.889709,
            },
            None,
        );
        h.service.on_message(&me, &location).await.unwrap();
        let profile = h.profiles.get_profile(A).await.unwrap().unwrap();
        assert_eq!(profile.geo.as_deref(), Some("43.23895,76.88971"));
        assert!(profile.is_complete());
        assert_eq!(
            h.fake.texts_to(ChatId(100)).last().map(String::as_str),
            Some(LOCATION_SAVED)
        );
    }

    #[tokio::test]
    async fn bad_registration_caption_explains_format() {
        let h = harness(&[]).await;
        let me = participant(A);
        let photo = RelayEnvelope::new(
            "user100",
            me.chat,
            Payload::Photo(FileHandle("AgAD".to_string())),
            Some("@aruzhan\nrobot\n23".to_string()),
        );
        h.service.on_message(&me, &photo).await.unwrap();

        let reply = h.fake.texts_to(ChatId(100)).pop().unwrap();
        assert!(reply.contains("Male or Female"));
        assert_eq!(h.profiles.get_profile(A).await.unwrap().unwrap().nickname, None);
    }

    #[tokio::test]
    async fn registered_but_unpaired_is_told_to_press_chat() {
        let h = harness(&[A]).await;
        h.service.on_message(&participant(A), &text(A, "hello?")).await.unwrap();
        assert_eq!(h.fake.texts_to(ChatId(100)), vec![NOT_CONNECTED.to_string()]);
        assert!(h.fake.sent_to(channel()).is_empty());
    }

    #[tokio::test]
    async fn exit_notifies_former_partner() {
        let h = harness(&[A, B]).await;
        pair(&h, A, B).await;

        h.service.on_exit(&participant(A)).await.unwrap();
        assert_eq!(h.service.engine().get_partner(B).await, None);
        assert_eq!(
            h.fake.texts_to(ChatId(200)).last().map(String::as_str),
            Some(PARTNER_LEFT)
        );
        assert_eq!(
            h.fake.texts_to(ChatId(100)).last().map(String::as_str),
            Some(YOU_LEFT)
        );

        // Nothing left to release.
        h.service.on_exit(&participant(A)).await.unwrap();
    }

    #[tokio::test]
    async fn selecting_a_busy_participant_changes_nothing() {
        let h = harness(&[A, B, C]).await;
        pair(&h, A, B).await;

        h.service.on_chat(&participant(C)).await.unwrap();
        h.service.on_select(&participant(C), A).await.unwrap();

        assert_eq!(h.service.engine().get_partner(A).await, Some(B));
        assert_eq!(h.service.engine().status(C).await, ParticipantStatus::Queued);
        assert_eq!(
            h.fake.texts_to(ChatId(300)).last().map(String::as_str),
            Some(TARGET_BUSY)
        );
    }

    #[tokio::test]
    async fn unreachable_selection_releases_both() {
        let h = harness(&[A, B]).await;
        h.service.on_chat(&participant(A)).await.unwrap();
        h.service.on_chat(&participant(B)).await.unwrap();
        h.fake.make_unreachable(ChatId(100));

        h.service.on_select(&participant(B), A).await.unwrap();

        assert_eq!(h.service.engine().status(A).await, ParticipantStatus::Idle);
        assert_eq!(h.service.engine().status(B).await, ParticipantStatus::Idle);
        assert_eq!(
            h.fake.texts_to(ChatId(200)).last().map(String::as_str),
            Some(TARGET_UNREACHABLE)
        );
    }

    #[tokio::test]
    async fn delete_button_removes_both_copies() {
        let h = harness(&[A, B]).await;
        pair(&h, A, B).await;
        h.service.on_message(&participant(A), &text(A, "oops")).await.unwrap();

        let (_, kb) = h.fake.keyboard_edits().pop().unwrap();
        let data = kb.buttons[0].callback_data.clone();
        h.service
            .on_callback(&participant(A), "cb-1", &data)
            .await
            .unwrap();

        let token = DeleteToken::decode(&data).unwrap();
        let deleted = h.fake.deleted();
        assert!(deleted.contains(&token.sender));
        assert!(deleted.contains(&token.partner));
        assert_eq!(
            h.fake.texts_to(ChatId(100)).last().map(String::as_str),
            Some(DELETED)
        );
        assert_eq!(h.fake.answered(), vec![("cb-1".to_string(), None)]);
    }

    #[tokio::test]
    async fn foreign_delete_token_is_refused() {
        let h = harness(&[A, C]).await;
        let token = DeleteToken::new(
            MessageRef::new(ChatId(100), MessageId(5)),
            MessageRef::new(ChatId(200), MessageId(6)),
        );

        h.service.on_delete(&participant(C), &token).await.unwrap();

        assert!(h.fake.deleted().is_empty());
        assert_eq!(h.fake.texts_to(ChatId(300)), vec![DELETE_MALFORMED.to_string()]);
    }

    #[tokio::test]
    async fn token_redirected_to_another_chat_is_refused() {
        let h = harness(&[A, B]).await;
        pair(&h, A, B).await;
        h.service.on_message(&participant(A), &text(A, "hi")).await.unwrap();
        let (control, _) = h.fake.keyboard_edits().pop().unwrap();

        // A's own control message, but pointing at a message in C's chat.
        let forged = DeleteToken::new(control, MessageRef::new(ChatId(300), MessageId(1)));
        h.service.on_delete(&participant(A), &forged).await.unwrap();

        // Unknown control message, partner chat is not A's partner.
        let unknown = DeleteToken::new(
            MessageRef::new(ChatId(100), MessageId(900)),
            MessageRef::new(ChatId(300), MessageId(1)),
        );
        h.service.on_delete(&participant(A), &unknown).await.unwrap();

        assert!(h.fake.deleted().is_empty());
        let replies = h.fake.texts_to(ChatId(100));
        assert_eq!(
            &replies[replies.len() - 2..],
            &[DELETE_MALFORMED.to_string(), DELETE_MALFORMED.to_string()]
        );
    }

    #[tokio::test]
    async fn issued_token_still_deletes_after_chat_ends() {
        let h = harness(&[A, B]).await;
        pair(&h, A, B).await;
        h.service.on_message(&participant(A), &text(A, "oops")).await.unwrap();
        let (_, kb) = h.fake.keyboard_edits().pop().unwrap();
        h.service.on_exit(&participant(A)).await.unwrap();

        let token = DeleteToken::decode(&kb.buttons[0].callback_data).unwrap();
        h.service.on_delete(&participant(A), &token).await.unwrap();

        assert!(h.fake.deleted().contains(&token.partner));
        assert_eq!(
            h.fake.texts_to(ChatId(100)).last().map(String::as_str),
            Some(DELETED)
        );
    }

    #[tokio::test]
    async fn partial_delete_is_reported_distinctly() {
        let h = harness(&[A, B]).await;
        pair(&h, A, B).await;
        let token = DeleteToken::new(
            MessageRef::new(ChatId(100), MessageId(5)),
            MessageRef::new(ChatId(200), MessageId(6)),
        );
        h.fake.make_undeletable(token.partner);

        h.service.on_delete(&participant(A), &token).await.unwrap();
        assert_eq!(
            h.fake.texts_to(ChatId(100)).last().map(String::as_str),
            Some(DELETED_ONLY_SENDER)
        );
    }

    #[tokio::test]
    async fn every_callback_is_answered() {
        let h = harness(&[A]).await;
        let me = participant(A);

        h.service.on_callback(&me, "1", "send_geo").await.unwrap();
        h.service.on_callback(&me, "2", "delete_1_2").await.unwrap();
        h.service.on_callback(&me, "3", "exit").await.unwrap();

        let ids: Vec<String> = h.fake.answered().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert!(h
            .fake
            .texts_to(ChatId(100))
            .contains(&DELETE_MALFORMED.to_string()));
    }

    #[tokio::test]
    async fn start_greets_with_chat_button() {
        let h = harness(&[]).await;
        h.service.on_start(&participant(A)).await.unwrap();
        let sent = h.fake.sent_to(ChatId(100));
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].msg.keyboard, Some(callbacks::chat_keyboard()));
    }
}
