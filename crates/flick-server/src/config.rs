use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use thiserror::Error;

use flick_crypto::CryptoError;
use flick_crypto::keys::{KEY_LEN, key_from_base64};

const MIN_JWT_SECRET_LEN: usize = 32;
const DEFAULT_ISSUER: &str = "api.getflick.chat";
/// Ten years.
const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365 * 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("FLICK_MESSAGE_ENCRYPTION_KEY: {0}")]
    MessageKey(#[from] CryptoError),
}

pub struct Config {
    pub jwt_secret: Vec<u8>,
    pub message_key: [u8; KEY_LEN],
    pub db_path: PathBuf,
    pub db_readers: usize,
    pub db_timeout: Duration,
    pub bind_addr: SocketAddr,
    pub token_issuer: String,
    pub token_audience: String,
    pub token_ttl: chrono::Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("jwt_secret", &"[REDACTED]")
            .field("message_key", &"[REDACTED]")
            .field("db_path", &self.db_path)
            .field("db_readers", &self.db_readers)
            .field("db_timeout", &self.db_timeout)
            .field("bind_addr", &self.bind_addr)
            .field("token_issuer", &self.token_issuer)
            .field("token_audience", &self.token_audience)
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the config from an arbitrary variable source. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let jwt_secret = {
            let raw = get("FLICK_JWT_SECRET").ok_or(ConfigError::Missing("FLICK_JWT_SECRET"))?;
            let secret = BASE64.decode(raw.trim()).map_err(|e| ConfigError::Invalid {
                var: "FLICK_JWT_SECRET",
                reason: e.to_string(),
            })?;
            if secret.len() < MIN_JWT_SECRET_LEN {
                return Err(ConfigError::Invalid {
                    var: "FLICK_JWT_SECRET",
                    reason: format!("decoded to {} bytes, need at least {MIN_JWT_SECRET_LEN}", secret.len()),
                });
            }
            secret
        };

        let message_key = key_from_base64(
            &get("FLICK_MESSAGE_ENCRYPTION_KEY").ok_or(ConfigError::Missing("FLICK_MESSAGE_ENCRYPTION_KEY"))?,
        )?;

        let db_path = PathBuf::from(get("FLICK_DB_PATH").unwrap_or_else(|| "flick.db".into()));
        let db_readers: usize = parse_or(&get, "FLICK_DB_READERS", 4)?;
        let db_timeout = Duration::from_millis(parse_or(&get, "FLICK_DB_TIMEOUT_MS", 3000)?);
        if db_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "FLICK_DB_TIMEOUT_MS",
                reason: "must be greater than zero".into(),
            });
        }

        let host: IpAddr = parse_or(&get, "FLICK_HOST", IpAddr::from([0, 0, 0, 0]))?;
        let port: u16 = parse_or(&get, "FLICK_PORT", 8080)?;

        let token_issuer = get("FLICK_TOKEN_ISSUER").unwrap_or_else(|| DEFAULT_ISSUER.into());
        let token_audience = get("FLICK_TOKEN_AUDIENCE").unwrap_or_else(|| token_issuer.clone());
        let ttl_hours: i64 = parse_or(&get, "FLICK_TOKEN_TTL_HOURS", 720)?;
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&ttl_hours) {
            return Err(ConfigError::Invalid {
                var: "FLICK_TOKEN_TTL_HOURS",
                reason: format!("must be between 1 and {MAX_TOKEN_TTL_HOURS}"),
            });
        }
        let token_ttl = chrono::Duration::try_hours(ttl_hours).ok_or(ConfigError::Invalid {
            var: "FLICK_TOKEN_TTL_HOURS",
            reason: "out of range".into(),
        })?;

        Ok(Self {
            jwt_secret,
            message_key,
            db_path,
            db_readers,
            db_timeout,
            bind_addr: SocketAddr::new(host, port),
            token_issuer,
            token_audience,
            token_ttl,
        })
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        let mut vars: HashMap<String, String> = [
            ("FLICK_JWT_SECRET", BASE64.encode([1u8; 48])),
            ("FLICK_MESSAGE_ENCRYPTION_KEY", BASE64.encode([2u8; 32])),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        for (k, v) in pairs {
            vars.insert(k.to_string(), v.to_string());
        }
        vars
    }

    fn load(vars: &HashMap<String, String>) -> Result<Config, ConfigError> {
        Config::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&env(&[])).unwrap();
        assert_eq!(config.db_path, PathBuf::from("flick.db"));
        assert_eq!(config.db_readers, 4);
        assert_eq!(config.db_timeout, Duration::from_millis(3000));
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.token_issuer, "api.getflick.chat");
        assert_eq!(config.token_audience, "api.getflick.chat");
        assert_eq!(config.token_ttl, chrono::Duration::hours(720));
        assert_eq!(config.message_key, [2u8; 32]);
    }

    #[test]
    fn audience_follows_issuer() {
        let config = load(&env(&[("FLICK_TOKEN_ISSUER", "issuer.test")])).unwrap();
        assert_eq!(config.token_audience, "issuer.test");

        let config = load(&env(&[
            ("FLICK_TOKEN_ISSUER", "issuer.test"),
            ("FLICK_TOKEN_AUDIENCE", "aud.test"),
        ]))
        .unwrap();
        assert_eq!(config.token_audience, "aud.test");
    }

    #[test]
    fn missing_secrets_abort() {
        let mut vars = env(&[]);
        vars.remove("FLICK_JWT_SECRET");
        assert!(matches!(load(&vars), Err(ConfigError::Missing("FLICK_JWT_SECRET"))));

        let vars = env(&[("FLICK_MESSAGE_ENCRYPTION_KEY", "")]);
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Missing("FLICK_MESSAGE_ENCRYPTION_KEY"))
        ));
    }

    #[test]
    fn weak_or_malformed_keys_abort() {
        let short = BASE64.encode([1u8; 16]);
        assert!(matches!(
            load(&env(&[("FLICK_JWT_SECRET", short.as_str())])),
            Err(ConfigError::Invalid { var: "FLICK_JWT_SECRET", .. })
        ));

        let wrong_len = BASE64.encode([2u8; 16]);
        assert!(matches!(
            load(&env(&[("FLICK_MESSAGE_ENCRYPTION_KEY", wrong_len.as_str())])),
            Err(ConfigError::MessageKey(CryptoError::InvalidKeyLength { .. }))
        ));

        assert!(matches!(
            load(&env(&[("FLICK_MESSAGE_ENCRYPTION_KEY", "***")])),
            Err(ConfigError::MessageKey(CryptoError::KeyEncoding(_)))
        ));
    }

    #[test]
    fn bad_numbers_abort() {
        for (var, value) in [
            ("FLICK_PORT", "http"),
            ("FLICK_DB_READERS", "-1"),
            ("FLICK_DB_TIMEOUT_MS", "0"),
            ("FLICK_TOKEN_TTL_HOURS", "0"),
            ("FLICK_TOKEN_TTL_HOURS", "87601"),
            ("FLICK_TOKEN_TTL_HOURS", "9000000000000000"),
            ("FLICK_HOST", "not-an-ip"),
        ] {
            assert!(
                matches!(load(&env(&[(var, value)])), Err(ConfigError::Invalid { .. })),
                "{var}={value} accepted"
            );
        }
    }

    #[test]
    fn token_ttl_accepts_the_ten_year_cap() {
        let config = load(&env(&[("FLICK_TOKEN_TTL_HOURS", "87600")])).unwrap();
        assert_eq!(config.token_ttl, chrono::Duration::hours(87_600));
    }

    #[test]
    fn debug_redacts_key_material() {
        let config = load(&env(&[])).unwrap();
        let rendered = format!("{config:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains(&BASE64.encode([1u8; 48])));
    }
}
