//! API authentication via bearer tokens.
//!
//! Maps `Authorization: Bearer <token>` headers to a [`SessionUser`] and
//! attaches it to the request for downstream handlers.

use std::collections::HashMap;
use std::path::Path;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use rand::Rng;

use parley_core::config::AuthConfig;
use parley_core::types::SessionUser;

use crate::error::ApiError;
use crate::state::AppState;

/// File name of the persisted local token inside the data directory.
pub const TOKEN_FILE: &str = "api_token";

/// Generate a random 32-character hex token.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    hex::encode(bytes)
}

/// Load token from file, or generate and save a new one.
pub fn load_or_generate_token(token_path: &Path) -> String {
    if let Ok(contents) = std::fs::read_to_string(token_path) {
        let token = contents.trim().to_string();
        if !token.is_empty() {
            tracing::info!("API token loaded from {}", token_path.display());
            return token;
        }
    }

    let token = generate_token();

    if let Some(parent) = token_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = std::fs::write(token_path, &token) {
        tracing::warn!(error = %e, "Failed to save API token to {}", token_path.display());
    } else {
        // Owner-only access.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(token_path, std::fs::Permissions::from_mode(0o600));
        }
        tracing::info!("API token saved to {}", token_path.display());
    }

    token
}

/// Identity of the single user created when no users are configured.
pub fn local_user() -> SessionUser {
    SessionUser {
        id: "local".to_string(),
        name: "Local User".to_string(),
        email: "local@localhost".to_string(),
    }
}

/// Bearer token lookup table.
#[derive(Debug, Clone, Default)]
pub struct SessionTable {
    users: HashMap<String, SessionUser>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a token. Blank tokens are ignored.
    pub fn insert(&mut self, token: impl Into<String>, user: SessionUser) {
        let token = token.into();
        let token = token.trim();
        if token.is_empty() {
            return;
        }
        self.users.insert(token.to_string(), user);
    }

    /// Build the table from the configured users.
    ///
    /// With no usable users configured, a local user is registered under a
    /// token loaded from (or written to) `data_dir/api_token`.
    pub fn from_config(auth: &AuthConfig, data_dir: &Path) -> Self {
        let mut table = Self::new();
        for user in &auth.users {
            table.insert(
                user.token.clone(),
                SessionUser {
                    id: user.id.clone(),
                    name: user.name.clone(),
                    email: user.email.clone(),
                },
            );
        }

        if table.is_empty() {
            let token = load_or_generate_token(&data_dir.join(TOKEN_FILE));
            table.insert(token, local_user());
        }

        tracing::info!(users = table.len(), "Session table ready");
        table
    }

    pub fn resolve(&self, token: &str) -> Option<&SessionUser> {
        self.users.get(token)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Middleware that validates Bearer token authentication.
///
/// On success the caller's [`SessionUser`] is inserted as a request
/// extension. Returns 401 if the header is missing or the token unknown.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let user = match req.headers().get("authorization") {
        Some(value) => {
            let Ok(value_str) = value.to_str() else {
                return unauthorized("Invalid Authorization header encoding");
            };
            match value_str
                .strip_prefix("Bearer ")
                .and_then(|token| state.sessions.resolve(token.trim()))
            {
                Some(user) => user.clone(),
                None => return unauthorized("Unauthorized"),
            }
        }
        None => return unauthorized("Unauthorized"),
    };

    req.extensions_mut().insert(user);
    next.run(req).await
}

fn unauthorized(message: &str) -> Response {
    ApiError::Unauthorized(message.to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::config::ApiUser;
    use tempfile::TempDir;

    #[test]
    fn test_generate_token_is_hex() {
        let token = generate_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_token_persists_across_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(TOKEN_FILE);

        let first = load_or_generate_token(&path);
        let second = load_or_generate_token(&path);
        assert_eq!(first, second);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), first);
    }

    #[cfg(unix)]
    #[test]
    fn test_token_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join(TOKEN_FILE);
        load_or_generate_token(&path);

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_configured_users_skip_local_token() {
        let dir = TempDir::new().unwrap();
        let auth = AuthConfig {
            users: vec![ApiUser {
                token: "secret-a".into(),
                id: "u1".into(),
                name: "Asha".into(),
                email: "asha@example.com".into(),
            }],
        };

        let table = SessionTable::from_config(&auth, dir.path());
        assert_eq!(table.len(), 1);
        assert_eq!(table.resolve("secret-a").unwrap().id, "u1");
        assert!(table.resolve("other").is_none());
        assert!(!dir.path().join(TOKEN_FILE).exists());
    }

    #[test]
    fn test_no_users_creates_local_user() {
        let dir = TempDir::new().unwrap();
        let table = SessionTable::from_config(&AuthConfig::default(), dir.path());

        let token = std::fs::read_to_string(dir.path().join(TOKEN_FILE)).unwrap();
        assert_eq!(table.resolve(&token), Some(&local_user()));
    }

    #[test]
    fn test_blank_tokens_ignored() {
        let mut table = SessionTable::new();
        table.insert("   ", local_user());
        assert!(table.is_empty());
    }
}
