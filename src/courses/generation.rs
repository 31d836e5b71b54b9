use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::ai::{ContentSource, CourseSynthesizer, GeneratedCourse};
use crate::auth::{AuthenticatedUser, Credential};
use crate::error::AppError;
use crate::models::{CourseCreated, NewCourse, NewCoursePage, NewQuestion, NewQuestionOption};
use crate::store::CourseStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationPolicy {
    /// Delete the course row when a later step fails. Off by default, in
    /// which case a failed generation can leave a course with missing children.
    pub rollback_on_failure: bool,
}

/// Synthesizes a course for `subject` and persists it for `user`.
///
/// Writes happen in a fixed order: the course row, then every page in one
/// batch, then each question followed by its options. The first failed write
/// stops the sequence and is returned as `AppError::Persistence`.
#[instrument(skip(store, synthesizer, user), fields(principal_id = %user.principal.id))]
pub async fn generate_course(
    store: &dyn CourseStore,
    synthesizer: &CourseSynthesizer,
    policy: GenerationPolicy,
    subject: &str,
    user: &AuthenticatedUser,
) -> Result<CourseCreated, AppError> {
    let (content, source) = synthesizer.synthesize(subject).await;
    if source == ContentSource::Mock {
        info!("Persisting mock course content");
    }

    let credential = &user.credential;
    let course = store
        .insert_course(
            credential,
            &NewCourse {
                title: content.title.clone(),
                subject: subject.to_string(),
                description: content.description.clone(),
                created_by: user.principal.id,
                is_published: true,
            },
        )
        .await
        .map_err(|e| AppError::persistence("Failed to insert course", e))?;

    info!(course_id = %course.id, "Course row created");

    if let Err(err) = persist_children(store, credential, course.id, &content).await {
        if policy.rollback_on_failure {
            roll_back(store, credential, course.id).await;
        }
        return Err(err);
    }

    info!(
        course_id = %course.id,
        pages = content.pages.len(),
        questions = content.questions.len(),
        "Course generated"
    );

    Ok(CourseCreated { id: course.id })
}

async fn persist_children(
    store: &dyn CourseStore,
    credential: &Credential,
    course_id: Uuid,
    content: &GeneratedCourse,
) -> Result<(), AppError> {
    let pages: Vec<NewCoursePage> = content
        .pages
        .iter()
        .enumerate()
        .map(|(index, page)| NewCoursePage {
            course_id,
            page_index: index as i64,
            title: page.title.clone(),
            content_md: page.content_md.clone(),
        })
        .collect();

    store
        .insert_pages(credential, &pages)
        .await
        .map_err(|e| AppError::persistence("Failed to insert course pages", e))?;

    for (index, question) in content.questions.iter().enumerate() {
        let stored = store
            .insert_question(
                credential,
                &NewQuestion {
                    course_id,
                    question_text: question.question_text.clone(),
                    question_type: question.question_type().to_string(),
                },
            )
            .await
            .map_err(|e| AppError::persistence(&format!("Failed to insert question {}", index), e))?;

        let options: Vec<NewQuestionOption> = question
            .options
            .iter()
            .map(|option| NewQuestionOption {
                question_id: stored.id,
                option_text: option.option_text.clone(),
                is_correct: option.is_correct,
            })
            .collect();

        if options.is_empty() {
            continue;
        }

        store.insert_options(credential, &options).await.map_err(|e| {
            AppError::persistence(&format!("Failed to insert options for question {}", index), e)
        })?;
    }

    Ok(())
}

async fn roll_back(store: &dyn CourseStore, credential: &Credential, course_id: Uuid) {
    match store.delete_course(credential, course_id).await {
        Ok(()) => info!(course_id = %course_id, "Rolled back partially generated course"),
        Err(err) => warn!(course_id = %course_id, error = %err, "Failed to roll back partial course"),
    }
}
