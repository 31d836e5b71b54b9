pub mod schema;
pub mod sqlite;
pub mod supabase;

pub use schema::*;
pub use sqlite::*;
pub use supabase::*;

use uuid::Uuid;

use crate::auth::Credential;
use crate::error::AppError;
use crate::models::{
    Course, CoursePage, NewCourse, NewCoursePage, NewQuestion, NewQuestionOption, Question,
    QuestionWithOptions,
};

pub const COURSES_TABLE: &str = "courses";
pub const COURSE_PAGES_TABLE: &str = "course_pages";
pub const QUESTIONS_TABLE: &str = "questions";
pub const QUESTION_OPTIONS_TABLE: &str = "question_options";

/// Which courses a listing returns. Both orderings are newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseFilter {
    CreatedBy(Uuid),
    Published,
}

/// Table-scoped access to the four course tables.
///
/// Every call carries the caller's credential; stores with row-level
/// security use it to scope the query. Only `list_courses` may run in the
/// anonymous scope (`None`).
#[rocket::async_trait]
pub trait CourseStore: Send + Sync {
    async fn insert_course(
        &self,
        credential: &Credential,
        course: &NewCourse,
    ) -> Result<Course, AppError>;

    async fn insert_pages(
        &self,
        credential: &Credential,
        pages: &[NewCoursePage],
    ) -> Result<(), AppError>;

    async fn insert_question(
        &self,
        credential: &Credential,
        question: &NewQuestion,
    ) -> Result<Question, AppError>;

    async fn insert_options(
        &self,
        credential: &Credential,
        options: &[NewQuestionOption],
    ) -> Result<(), AppError>;

    async fn list_courses(
        &self,
        credential: Option<&Credential>,
        filter: CourseFilter,
    ) -> Result<Vec<Course>, AppError>;

    async fn find_course(
        &self,
        credential: &Credential,
        id: Uuid,
    ) -> Result<Option<Course>, AppError>;

    /// Pages ordered by `page_index` ascending.
    async fn list_pages(
        &self,
        credential: &Credential,
        course_id: Uuid,
    ) -> Result<Vec<CoursePage>, AppError>;

    async fn list_questions(
        &self,
        credential: &Credential,
        course_id: Uuid,
    ) -> Result<Vec<QuestionWithOptions>, AppError>;

    /// Removes a course; children go with it through cascading foreign keys.
    async fn delete_course(&self, credential: &Credential, id: Uuid) -> Result<(), AppError>;
}
