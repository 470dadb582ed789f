use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::ChatId, errors::Error, messaging::types::Destination, Result};

/// Typed configuration, read from the environment (and `.env` if present).
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,
    /// Where every relayed message is mirrored. `None` disables mirroring.
    pub oversight_channel: Option<Destination>,

    // Storage
    pub state_file: Option<PathBuf>,
    pub profile_file: Option<PathBuf>,

    // Behavior flags
    pub require_complete_profile: bool,
    pub protect_content: bool,
    pub request_timeout: Duration,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let oversight_channel = match env_str("OVERSIGHT_CHANNEL").and_then(non_empty) {
            Some(raw) => Some(parse_destination(&raw)?),
            None => None,
        };

        let state_file = env_path("STATE_FILE");
        let profile_file = env_path("PROFILE_FILE");

        let require_complete_profile = env_bool("REQUIRE_COMPLETE_PROFILE").unwrap_or(true);
        let protect_content = env_bool("PROTECT_CONTENT").unwrap_or(true);
        let request_timeout =
            Duration::from_millis(env_u64("REQUEST_TIMEOUT_MS").unwrap_or(15_000));

        let audit_log_path = PathBuf::from(
            env_str("AUDIT_LOG_PATH").unwrap_or("/tmp/tanysu-audit.log".to_string()),
        );
        let audit_log_json = env_bool("AUDIT_LOG_JSON").unwrap_or(false);

        Ok(Self {
            telegram_bot_token,
            oversight_channel,
            state_file,
            profile_file,
            require_complete_profile,
            protect_content,
            request_timeout,
            audit_log_path,
            audit_log_json,
        })
    }
}

/// `@name` is a public channel username, anything else must be a numeric chat id.
pub fn parse_destination(raw: &str) -> Result<Destination> {
    let raw = raw.trim();
    if let Some(name) = raw.strip_prefix('@') {
        if name.is_empty() {
            return Err(Error::Config("empty channel username".to_string()));
        }
        return Ok(Destination::Channel(raw.to_string()));
    }
    raw.parse::<i64>()
        .map(|id| Destination::Chat(ChatId(id)))
        .map_err(|_| Error::Config(format!("invalid OVERSIGHT_CHANNEL: {raw}")))
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        &val[1..val.len() - 1]
    } else {
        val
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_str(key).and_then(non_empty).map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_accepts_ids_and_usernames() {
        assert_eq!(
            parse_destination("-1002403228914").unwrap(),
            Destination::Chat(ChatId(-1002403228914))
        );
        assert_eq!(
            parse_destination(" @jaiAngmeAitamyz ").unwrap(),
            Destination::Channel("@jaiAngmeAitamyz".to_string())
        );
        assert!(matches!(parse_destination("@"), Err(Error::Config(_))));
        assert!(matches!(
            parse_destination("channel"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn quotes_are_stripped_from_dotenv_values() {
        assert_eq!(strip_quotes("\"abc\""), "abc");
        assert_eq!(strip_quotes("'abc'"), "abc");
        assert_eq!(strip_quotes("\"abc"), "\"abc");
        assert_eq!(strip_quotes("x"), "x");
    }

    #[test]
    fn bool_parsing_is_lenient() {
        for s in ["1", "true", "YES", " on "] {
            assert!(parse_bool(s), "{s}");
        }
        for s in ["0", "false", "no", ""] {
            assert!(!parse_bool(s), "{s}");
        }
    }
}
