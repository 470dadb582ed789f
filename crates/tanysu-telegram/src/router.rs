use std::{collections::HashMap, sync::Arc};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;

use tanysu_core::{
    config::Config,
    domain::UserId,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    pairing::PairingEngine,
    profile::ProfileStore,
    service::{ChatService, ServiceSettings},
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ChatService>,
    pub participant_locks: Arc<ParticipantLocks>,
}

/// Map size at which idle entries are dropped.
const PRUNE_AT: usize = 1024;

/// One async mutex per participant, so each participant's updates are handled
/// in the order Telegram delivered them while different participants proceed
/// concurrently.
#[derive(Default)]
pub struct ParticipantLocks {
    inner: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl ParticipantLocks {
    pub async fn lock(&self, user: UserId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            if map.len() >= PRUNE_AT {
                // Clones are only taken under this lock, so a count of one
                // means nobody holds or awaits the entry.
                map.retain(|_, l| Arc::strong_count(l) > 1);
            }
            map.entry(user)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

pub async fn run_polling(
    cfg: Arc<Config>,
    engine: Arc<PairingEngine>,
    profiles: Arc<dyn ProfileStore>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => info!(bot = %me.username(), "tanysu started"),
        Err(e) => anyhow::bail!("telegram getMe failed: {e}"),
    }
    match &cfg.oversight_channel {
        Some(channel) => info!(%channel, "mirroring relayed messages"),
        None => info!("no oversight channel configured; mirroring disabled"),
    }

    // Spacing outbound calls keeps busy pairs and the mirror under Telegram's
    // flood limits; 429s that still happen are retried in the adapter.
    let raw_messenger: Arc<dyn MessagingPort> =
        Arc::new(TelegramMessenger::new(bot.clone(), cfg.request_timeout));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let service = Arc::new(ChatService::new(
        engine,
        profiles,
        messenger,
        ServiceSettings::from_config(&cfg),
    ));

    let state = Arc::new(AppState {
        service,
        participant_locks: Arc::new(ParticipantLocks::default()),
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    info!("dispatcher stopped");
    Ok(())
}
