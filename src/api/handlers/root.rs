use crate::APP_USER_AGENT;

// Plain-text banner for `/`; not part of the documented API.
pub async fn root() -> &'static str {
    APP_USER_AGENT
}
