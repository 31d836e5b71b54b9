use opentelemetry_semantic_conventions::{attribute::OTEL_STATUS_CODE, trace::ERROR_TYPE};
use rocket::http::Status;
use thiserror::Error;
use tracing::{Span, error, warn};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Value recorded as `error.type` on the current span.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Authentication(_) => "authentication_error",
            AppError::NotFound(_) => "not_found_error",
            AppError::Validation(_) => "validation_error",
            AppError::Persistence(_) => "persistence_error",
            AppError::ExternalService(_) => "external_service_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Errors the caller could not have avoided. These log at error level
    /// and mark the span as failed.
    pub fn is_server_fault(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::Persistence(_)
                | AppError::ExternalService(_)
                | AppError::Internal(_)
        )
    }

    pub fn log_and_record(&self, ctx: &str) {
        let message = self.to_string();
        let kind = self.kind();

        if self.is_server_fault() {
            error!(error = %message, context = %ctx, error_kind = kind, "Request failed");
        } else {
            warn!(error = %message, context = %ctx, error_kind = kind, "Request rejected");
        }

        let span = Span::current();
        if span.is_none() {
            return;
        }

        span.record("error", tracing::field::display(true));
        span.record(ERROR_TYPE, tracing::field::display(kind));
        span.record("error.message", tracing::field::display(&message));
        if self.is_server_fault() {
            span.record(OTEL_STATUS_CODE, tracing::field::display("ERROR"));
        }
    }

    pub fn status_code(&self) -> Status {
        match self {
            AppError::Database(_) => Status::InternalServerError,
            AppError::Authentication(_) => Status::Unauthorized,
            AppError::NotFound(_) => Status::NotFound,
            AppError::Validation(_) => Status::UnprocessableEntity,
            AppError::Persistence(_) => Status::InternalServerError,
            AppError::ExternalService(_) => Status::ServiceUnavailable,
            AppError::Internal(_) => Status::InternalServerError,
        }
    }

    pub fn to_status_with_log(&self, context: &str) -> Status {
        self.log_and_record(context);
        self.status_code()
    }

    /// Wraps a store failure with the generation step it happened in.
    pub fn persistence(step: &str, source: AppError) -> Self {
        AppError::Persistence(format!("{}: {}", step, source))
    }
}

impl<'r> rocket::response::Responder<'r, 'static> for AppError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'static> {
        self.to_status_with_log(&format!("Request to {} {}", req.method(), req.uri()))
            .respond_to(req)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::ExternalService(format!("HTTP error: {}", error))
    }
}

impl From<AppError> for Status {
    fn from(err: AppError) -> Self {
        err.to_status_with_log("Error conversion into Status")
    }
}
