use super::{
    auth::{normalize_email, password::hash_password, valid_email},
    MessageResponse, Store,
};
use crate::{api::error::ApiError, store::NewUser};
use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::ToSchema;

pub const MISSING_FIELDS: &str = "Something is missing, please check!";

#[derive(ToSchema, Serialize, Deserialize, Default)]
pub struct UserRegister {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

// Keep the password out of logs.
impl std::fmt::Debug for UserRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRegister")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Trimmed, non-empty value or `None`.
pub(crate) fn required(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

#[utoipa::path(
    post,
    path= "/register",
    request_body = UserRegister,
    responses (
        (status = 201, description = "Registration successful", body = MessageResponse, content_type = "application/json"),
        (status = 400, description = "Missing or invalid fields", body = MessageResponse),
        (status = 409, description = "Email or username already taken", body = MessageResponse),
    ),
    tag= "auth"
)]
#[instrument(skip(store, payload))]
pub async fn register(
    store: Extension<Store>,
    payload: Result<Json<UserRegister>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let user = payload.map(|Json(user)| user).unwrap_or_default();
    debug!("user: {:?}", user);

    let (Some(username), Some(email), Some(password)) = (
        required(user.username.as_ref()),
        required(user.email.as_ref()),
        required(user.password.as_ref()),
    ) else {
        return Err(ApiError::Validation(MISSING_FIELDS.to_string()));
    };

    let email = normalize_email(email);
    if !valid_email(&email) {
        return Err(ApiError::Validation("Invalid email".to_string()));
    }

    if store.find_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict("Try different email.".to_string()));
    }

    let password = password.to_string();
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::internal)?;

    // A concurrent signup can still win the race; the unique constraint maps to 409.
    let created = store
        .create(NewUser {
            username: username.to_string(),
            email,
            password_hash,
        })
        .await?;
    debug!("registered user {}", created.id);

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::ok("Account created successfully.")),
    ))
}

#[cfg(test)]
mod tests {
    use crate::api::handlers::test_support::{json_body, json_request, TestApp};
    use anyhow::{Context, Result};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn register_creates_account() -> Result<()> {
        let app = TestApp::new();
        let response = app
            .send(json_request(
                "POST",
                "/register",
                &json!({"username": "alice", "email": " Alice@Example.com ", "password": "hunter22"}),
            )?)
            .await?;

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await?;
        assert_eq!(body["message"], "Account created successfully.");
        assert_eq!(body["success"], true);
        assert!(body.get("password").is_none());

        let stored = app
            .store
            .find_by_email("alice@example.com")
            .await?
            .context("user should be stored with a normalized email")?;
        assert_ne!(stored.password_hash, "hunter22");
        assert!(stored.password_hash.starts_with("$argon2id$"));
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() -> Result<()> {
        let app = TestApp::new();
        let payload = json!({"username": "alice", "email": "alice@example.com", "password": "pw"});
        let first = app.send(json_request("POST", "/register", &payload)?).await?;
        assert_eq!(first.status(), StatusCode::CREATED);

        let again = json!({"username": "alice2", "email": "ALICE@example.com", "password": "pw"});
        let second = app.send(json_request("POST", "/register", &again)?).await?;
        assert_eq!(second.status(), StatusCode::CONFLICT);
        let body = json_body(second).await?;
        assert_eq!(body["message"], "Try different email.");
        assert_eq!(body["success"], false);
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() -> Result<()> {
        let app = TestApp::new();
        app.seed_user("alice").await?;
        let payload = json!({"username": "alice", "email": "new@example.com", "password": "pw"});
        let response = app.send(json_request("POST", "/register", &payload)?).await?;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(response).await?["message"], "Try different username.");
        Ok(())
    }

    #[tokio::test]
    async fn missing_or_blank_fields_are_rejected() -> Result<()> {
        let app = TestApp::new();
        for payload in [
            json!({"email": "a@example.com", "password": "pw"}),
            json!({"username": "  ", "email": "a@example.com", "password": "pw"}),
            json!({"username": "a", "email": "a@example.com"}),
            json!("not an object"),
        ] {
            let response = app.send(json_request("POST", "/register", &payload)?).await?;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{payload}");
            let body = json_body(response).await?;
            assert_eq!(body["message"], "Something is missing, please check!");
        }
        Ok(())
    }

    #[tokio::test]
    async fn invalid_email_is_rejected() -> Result<()> {
        let app = TestApp::new();
        let payload = json!({"username": "a", "email": "nope", "password": "pw"});
        let response = app.send(json_request("POST", "/register", &payload)?).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await?["message"], "Invalid email");
        Ok(())
    }
}
