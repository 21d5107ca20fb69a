//! Authentication endpoints.

use bc_core::error::{BcError, BcResult};
use tracing::info;

use crate::client::ApiClient;
use crate::response::TokenResponse;

impl ApiClient {
    /// Exchange a username and password for an API token.
    ///
    /// On success the token is also installed on this client.
    pub async fn obtain_token(&self, username: &str, password: &str) -> BcResult<String> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(BcError::AuthFailed("username and password are required".into()));
        }
        let body = serde_json::json!({
            "username": username,
            "password": password,
        });
        let resp = match self.post_anonymous("/auth/token/", &body).await {
            Ok(resp) => resp,
            // Bad credentials come back as 400 with a field error.
            Err(BcError::ServerError { status: 400, message }) => {
                return Err(BcError::AuthFailed(message))
            }
            Err(e) => return Err(e),
        };
        let TokenResponse { token } = Self::parse_response(resp).await?;
        if token.trim().is_empty() {
            return Err(BcError::AuthFailed("server returned an empty token".into()));
        }
        self.set_token(Some(token.clone())).await;
        info!("obtained api token for {username}");
        Ok(token)
    }
}
