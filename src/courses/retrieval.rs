use tracing::{instrument, warn};
use uuid::Uuid;

use crate::auth::{AuthenticatedUser, Credential};
use crate::error::AppError;
use crate::models::{Course, CourseDetail};
use crate::store::{CourseFilter, CourseStore};

/// Courses created by the caller, newest first.
#[instrument(skip_all, fields(principal_id = %user.principal.id))]
pub async fn list_for_principal(
    store: &dyn CourseStore,
    user: &AuthenticatedUser,
) -> Result<Vec<Course>, AppError> {
    store
        .list_courses(
            Some(&user.credential),
            CourseFilter::CreatedBy(user.principal.id),
        )
        .await
}

/// Every published course, newest first.
#[instrument(skip_all)]
pub async fn list_published(store: &dyn CourseStore) -> Result<Vec<Course>, AppError> {
    store.list_courses(None, CourseFilter::Published).await
}

/// The course with its pages and quiz. Only the course lookup is fatal;
/// a failed page or question fetch leaves that array empty (`None`).
#[instrument(skip(store, credential))]
pub async fn get_by_id(
    store: &dyn CourseStore,
    id: Uuid,
    credential: &Credential,
) -> Result<CourseDetail, AppError> {
    let course = store
        .find_course(credential, id)
        .await
        .map_err(|e| {
            warn!(error = %e, "Course lookup failed");
            AppError::NotFound("Course not found".to_string())
        })?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

    let pages = match store.list_pages(credential, id).await {
        Ok(pages) => Some(pages),
        Err(err) => {
            warn!(error = %err, "Failed to fetch course pages");
            None
        }
    };

    let questions = match store.list_questions(credential, id).await {
        Ok(questions) => Some(questions),
        Err(err) => {
            warn!(error = %err, "Failed to fetch course questions");
            None
        }
    };

    Ok(CourseDetail {
        course,
        pages,
        questions,
    })
}
