use crate::api::DEFAULT_SESSION_TTL_SECONDS;
use clap::{builder::BoolishValueParser, Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SESSION_KEY: &str = "session-key";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SECURE_COOKIES: &str = "secure-cookies";

#[derive(Debug)]
pub struct Options {
    pub key: Option<SecretString>,
    pub ttl_seconds: i64,
    pub secure_cookies: bool,
}

impl Options {
    /// Parse session arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the TTL is missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let ttl_seconds = matches
            .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_SESSION_TTL_SECONDS}"))?;

        let key = matches
            .get_one::<String>(ARG_SESSION_KEY)
            .filter(|v| !v.trim().is_empty())
            .map(|v| SecretString::from(v.trim().to_string()));

        Ok(Self {
            key,
            ttl_seconds,
            secure_cookies: matches.get_flag(ARG_SECURE_COOKIES),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_KEY)
                .long(ARG_SESSION_KEY)
                .help("Base64 encoded 32 byte Ed25519 seed used to sign session tokens")
                .long_help(
                    "Base64 encoded 32 byte Ed25519 seed used to sign session tokens. When absent a random key is generated at startup and every restart logs all users out.",
                )
                .env("HUDDLE_SESSION_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie TTL in seconds (at most one day)")
                .env("HUDDLE_SESSION_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64).range(1..=DEFAULT_SESSION_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_SECURE_COOKIES)
                .long(ARG_SECURE_COOKIES)
                .help("Mark session cookies as Secure (HTTPS only)")
                .env("HUDDLE_SECURE_COOKIES")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn command() -> Command {
        with_args(Command::new("huddle"))
    }

    fn cleared<F: FnOnce() -> R, R>(f: F) -> R {
        temp_env::with_vars(
            [
                ("HUDDLE_SESSION_KEY", None::<&str>),
                ("HUDDLE_SESSION_TTL_SECONDS", None::<&str>),
                ("HUDDLE_SECURE_COOKIES", None::<&str>),
            ],
            f,
        )
    }

    #[test]
    fn defaults() -> anyhow::Result<()> {
        cleared(|| {
            let matches = command().try_get_matches_from(["huddle"])?;
            let options = Options::parse(&matches)?;
            assert!(options.key.is_none());
            assert_eq!(options.ttl_seconds, DEFAULT_SESSION_TTL_SECONDS);
            assert!(!options.secure_cookies);
            Ok(())
        })
    }

    #[test]
    fn from_env() -> anyhow::Result<()> {
        temp_env::with_vars(
            [
                ("HUDDLE_SESSION_KEY", Some("c2VjcmV0")),
                ("HUDDLE_SESSION_TTL_SECONDS", Some("3600")),
                ("HUDDLE_SECURE_COOKIES", Some("true")),
            ],
            || {
                let matches = command().try_get_matches_from(["huddle"])?;
                let options = Options::parse(&matches)?;
                assert_eq!(
                    options.key.as_ref().map(|key| key.expose_secret().to_string()),
                    Some("c2VjcmV0".to_string())
                );
                assert_eq!(options.ttl_seconds, 3600);
                assert!(options.secure_cookies);
                Ok(())
            },
        )
    }

    #[test]
    fn ttl_is_capped_at_one_day() {
        cleared(|| {
            for ttl in ["0", "86401", "-5"] {
                let result = command().try_get_matches_from([
                    "huddle",
                    "--session-ttl-seconds",
                    ttl,
                ]);
                assert!(result.is_err(), "{ttl} should be rejected");
            }
        });
    }

    #[test]
    fn blank_key_is_ignored() -> anyhow::Result<()> {
        cleared(|| {
            let matches = command().try_get_matches_from(["huddle", "--session-key", "  "])?;
            assert!(Options::parse(&matches)?.key.is_none());
            Ok(())
        })
    }
}
