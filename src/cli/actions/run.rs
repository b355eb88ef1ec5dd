use crate::cli::{
    actions::{server, Action},
    telemetry,
};
use anyhow::Result;

/// Execute the provided action, then flush telemetry whatever the outcome.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    let result = match action {
        Action::Server(args) => server::execute(args).await,
    };

    telemetry::shutdown_tracer();

    result
}
