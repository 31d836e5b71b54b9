use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthenticatedUser;
use crate::courses::{generate_course, get_by_id, list_for_principal, list_published};
use crate::error::AppError;
use crate::models::{Course, CourseCreated, CourseDetail};
use crate::state::AppState;
use crate::validation::{AppErrorExt, JsonValidateExt, ToValidationResponse, ValidationResponse};

#[derive(Deserialize, Serialize, Validate, Clone)]
pub struct GenerateCourseRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "subject should not be empty"))]
    pub subject: String,
}

#[get("/courses")]
pub async fn api_list_courses(
    user: AuthenticatedUser,
    state: &State<AppState>,
) -> Result<Json<Vec<Course>>, Custom<Json<ValidationResponse>>> {
    let courses = list_for_principal(state.store.as_ref(), &user)
        .await
        .validate_custom()?;

    Ok(Json(courses))
}

#[get("/courses/published")]
pub async fn api_list_published_courses(
    state: &State<AppState>,
) -> Result<Json<Vec<Course>>, Custom<Json<ValidationResponse>>> {
    let courses = list_published(state.store.as_ref())
        .await
        .validate_custom()?;

    Ok(Json(courses))
}

/// A malformed id reads as an unknown course, not a validation failure.
#[get("/courses/<id>")]
pub async fn api_get_course(
    id: &str,
    user: AuthenticatedUser,
    state: &State<AppState>,
) -> Result<Json<CourseDetail>, Custom<Json<ValidationResponse>>> {
    let id = Uuid::parse_str(id)
        .map_err(|_| AppError::NotFound("Course not found".to_string()))
        .validate_custom()?;

    let course = get_by_id(state.store.as_ref(), id, &user.credential)
        .await
        .validate_custom()?;

    Ok(Json(course))
}

#[post("/courses/generate", data = "<request>")]
pub async fn api_generate_course(
    request: Json<GenerateCourseRequest>,
    user: AuthenticatedUser,
    state: &State<AppState>,
) -> Result<Custom<Json<CourseCreated>>, Custom<Json<ValidationResponse>>> {
    let validated = request.validate_custom()?;

    let subject = validated.subject.trim();
    if subject.is_empty() {
        return Err(AppError::Validation("subject should not be empty".to_string())
            .to_validation_response());
    }

    let created = generate_course(
        state.store.as_ref(),
        &state.synthesizer,
        state.policy,
        subject,
        &user,
    )
    .await
    .validate_custom()?;

    Ok(Custom(Status::Created, Json(created)))
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

#[catch(400)]
pub fn bad_request() -> Custom<Json<ValidationResponse>> {
    Status::BadRequest.to_validation_response()
}

#[catch(404)]
pub fn not_found() -> Custom<Json<ValidationResponse>> {
    Status::NotFound.to_validation_response()
}

#[catch(422)]
pub fn unprocessable_entity() -> Custom<Json<ValidationResponse>> {
    Status::UnprocessableEntity.to_validation_response()
}

#[catch(500)]
pub fn internal_error() -> Custom<Json<ValidationResponse>> {
    Status::InternalServerError.to_validation_response()
}
