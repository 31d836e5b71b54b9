use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use crate::error::AppError;

use super::Principal;

/// Resolves a bearer token to the user it was issued for.
#[rocket::async_trait]
pub trait AuthProvider: Send + Sync {
    /// `Ok(None)` means the provider answered but does not recognise the token.
    async fn get_user(&self, token: &str) -> Result<Option<Principal>, AppError>;
}

/// GoTrue `GET /auth/v1/user`, authorised with the service role key.
pub struct SupabaseAuth {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseAuth {
    pub fn new(client: Client, supabase_url: &str, service_key: &str) -> Self {
        Self {
            client,
            base_url: supabase_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        }
    }

    fn user_endpoint(&self) -> String {
        format!("{}/auth/v1/user", self.base_url)
    }
}

#[rocket::async_trait]
impl AuthProvider for SupabaseAuth {
    #[instrument(skip_all)]
    async fn get_user(&self, token: &str) -> Result<Option<Principal>, AppError> {
        let response = self
            .client
            .get(self.user_endpoint())
            .header("apikey", &self.service_key)
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                debug!(status = status.as_u16(), "Auth provider rejected token");
                Ok(None)
            }
            s if s.is_success() => {
                let user: Option<Principal> = response.json().await?;
                Ok(user)
            }
            s => Err(AppError::ExternalService(format!(
                "Auth provider returned {}",
                s
            ))),
        }
    }
}
