use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use tracing::Instrument;

use crate::error::AppError;
use crate::state::AppState;
use crate::validation::ValidationResponse;

use super::{AuthenticatedUser, Credential};

/// Reason the gate refused a request, kept in the request-local cache so the
/// 401 catcher can report it.
struct AuthFailure(String);

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn parse_bearer(header: Option<&str>) -> Result<&str, AppError> {
    let header = header
        .ok_or_else(|| AppError::Authentication("No authorization header found".to_string()))?;

    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().map(str::trim).unwrap_or_default();

    let malformed = token.is_empty() || token.contains(char::is_whitespace);
    if !scheme.eq_ignore_ascii_case("bearer") || malformed {
        return Err(AppError::Authentication("Invalid token format".to_string()));
    }

    Ok(token)
}

async fn authenticate(request: &Request<'_>) -> Result<AuthenticatedUser, AppError> {
    let token = parse_bearer(request.headers().get_one("Authorization"))?;

    let state = request
        .rocket()
        .state::<AppState>()
        .ok_or_else(|| AppError::Internal("Application state not found".to_string()))?;

    match state.auth.get_user(token).await {
        Ok(Some(principal)) => {
            tracing::info!(principal_id = %principal.id, "User authenticated via bearer token");
            Ok(AuthenticatedUser {
                principal,
                credential: Credential::new(token),
            })
        }
        Ok(None) => Err(AppError::Authentication("Invalid token".to_string())),
        Err(err) => {
            tracing::warn!(error = %err, "Auth provider call failed");
            Err(AppError::Authentication("Invalid token".to_string()))
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = AppError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let auth_span = tracing::info_span!("user_auth_guard");

        match authenticate(request).instrument(auth_span).await {
            Ok(user) => Outcome::Success(user),
            Err(err) => {
                let status = err.to_status_with_log("Auth gate");
                if let AppError::Authentication(reason) = &err {
                    request.local_cache(|| AuthFailure(reason.clone()));
                }
                Outcome::Error((status, err))
            }
        }
    }
}

#[catch(401)]
pub fn unauthorized_api(req: &Request) -> Custom<Json<ValidationResponse>> {
    let reason = &req.local_cache(|| AuthFailure(String::new())).0;

    let message = if reason.is_empty() {
        "Authentication required"
    } else {
        reason.as_str()
    };

    Custom(
        Status::Unauthorized,
        Json(ValidationResponse::with_error("authentication", message)),
    )
}
