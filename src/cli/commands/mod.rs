pub mod logging;
pub mod media;
pub mod session;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_PORT: &str = "port";
pub const ARG_DSN: &str = "dsn";
pub const ARG_CORS_ORIGIN: &str = "cors-origin";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("huddle")
        .about("Social graph and profile backend")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("HUDDLE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long("dsn")
                .help("Postgres connection string")
                .long_help(
                    "Postgres connection string. Without it users are kept in memory and lost on restart.",
                )
                .env("HUDDLE_DSN")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_CORS_ORIGIN)
                .long(ARG_CORS_ORIGIN)
                .help("Browser origin allowed to call the API with credentials")
                .env("HUDDLE_CORS_ORIGIN"),
        );

    let command = session::with_args(command);
    let command = media::with_args(command);
    logging::with_args(command)
}
