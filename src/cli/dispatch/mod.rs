//! Map parsed CLI arguments to the action the binary runs.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{media, session, ARG_CORS_ORIGIN, ARG_DSN, ARG_PORT};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if an option group cannot be parsed.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);

    // clap passes empty env values through; treat them as unset.
    let get_non_empty = |id: &str| {
        matches
            .get_one::<String>(id)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let session_opts = session::Options::parse(matches)?;
    let media_opts = media::Options::parse(matches);

    Ok(Action::Server(Args {
        port,
        dsn: get_non_empty(ARG_DSN),
        cors_origin: get_non_empty(ARG_CORS_ORIGIN),
        session_key: session_opts.key,
        session_ttl_seconds: session_opts.ttl_seconds,
        secure_cookies: session_opts.secure_cookies,
        cloudinary_url: media_opts.cloudinary_url,
    }))
}
