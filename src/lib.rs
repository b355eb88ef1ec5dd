//! # Huddle (profiles and the follow graph)
//!
//! `huddle` is the backend of a small social network: people register, log in
//! with a cookie session, edit a profile with an optional picture, browse
//! other users and follow or unfollow them.
//!
//! ## Storage
//!
//! Users live behind the [`store::UserStore`] trait. Production runs on
//! Postgres ([`store::PgUserStore`]); without a DSN the server falls back to
//! [`store::MemoryUserStore`], which is also what the handler tests use.
//!
//! Follow relationships are stored once, as directed edges. A user's
//! `followers` and `following` lists are both derived from that single edge
//! set, so they cannot disagree.
//!
//! ## Sessions
//!
//! Login issues a PASETO `v4.public` token signed with an Ed25519 key and
//! stores it in an `HttpOnly; SameSite=Strict` cookie named `token`. Nothing
//! about the session is kept server side; logout only clears the cookie.
//!
//! ## Profile pictures
//!
//! Uploaded images are encoded as a base64 data URI and handed to a
//! [`media::MediaUploader`]. With `CLOUDINARY_URL` configured the image is
//! posted to Cloudinary and the hosted URL is stored; otherwise the data URI
//! itself is stored.

pub mod api;
pub mod cli;
pub mod graph;
pub mod media;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
