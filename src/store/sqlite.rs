use std::collections::HashMap;
use std::str::FromStr;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::Credential;
use crate::error::AppError;
use crate::models::{
    Course, CoursePage, DbCourse, DbCoursePage, DbQuestion, DbQuestionOption, NewCourse,
    NewCoursePage, NewQuestion, NewQuestionOption, Question, QuestionOption, QuestionWithOptions,
};

use super::{CURRENT_SCHEMA, CourseFilter, CourseStore};

/// Local store for development and tests. There is no row-level security
/// here: the credential is accepted and ignored, and owner scoping comes
/// from the explicit `created_by` filter.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        if is_in_memory(database_url) {
            return Self::in_memory().await;
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::with_pool(pool).await
    }

    /// A single-connection in-memory database; every connection to
    /// `sqlite::memory:` would otherwise see its own empty schema.
    pub async fn in_memory() -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: Pool<Sqlite>) -> Result<Self, AppError> {
        info!("Applying course schema");
        sqlx::raw_sql(CURRENT_SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    #[cfg(test)]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.trim_end().ends_with(":memory:")
}

#[rocket::async_trait]
impl CourseStore for SqliteStore {
    #[instrument(skip(self, _credential))]
    async fn insert_course(
        &self,
        _credential: &Credential,
        course: &NewCourse,
    ) -> Result<Course, AppError> {
        info!("Inserting course");
        let id = Uuid::new_v4();
        let created_at = Utc::now();

        sqlx::query(
            "INSERT INTO courses (id, title, subject, description, created_by, is_published, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&course.title)
        .bind(&course.subject)
        .bind(&course.description)
        .bind(course.created_by.to_string())
        .bind(course.is_published)
        .bind(created_at.naive_utc())
        .execute(&self.pool)
        .await?;

        Ok(Course {
            id,
            title: course.title.clone(),
            subject: course.subject.clone(),
            description: Some(course.description.clone()),
            created_by: course.created_by,
            is_published: course.is_published,
            created_at,
        })
    }

    #[instrument(skip_all, fields(count = pages.len()))]
    async fn insert_pages(
        &self,
        _credential: &Credential,
        pages: &[NewCoursePage],
    ) -> Result<(), AppError> {
        info!("Inserting course pages");
        let mut tx = self.pool.begin().await?;

        for page in pages {
            sqlx::query(
                "INSERT INTO course_pages (id, course_id, page_index, title, content_md)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(page.course_id.to_string())
            .bind(page.page_index)
            .bind(&page.title)
            .bind(&page.content_md)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self, _credential))]
    async fn insert_question(
        &self,
        _credential: &Credential,
        question: &NewQuestion,
    ) -> Result<Question, AppError> {
        info!("Inserting question");
        let id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO questions (id, course_id, question_text, type) VALUES (?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(question.course_id.to_string())
        .bind(&question.question_text)
        .bind(&question.question_type)
        .execute(&self.pool)
        .await?;

        Ok(Question {
            id,
            course_id: question.course_id,
            question_text: question.question_text.clone(),
            question_type: question.question_type.clone(),
        })
    }

    #[instrument(skip_all, fields(count = options.len()))]
    async fn insert_options(
        &self,
        _credential: &Credential,
        options: &[NewQuestionOption],
    ) -> Result<(), AppError> {
        info!("Inserting question options");
        let mut tx = self.pool.begin().await?;

        for option in options {
            sqlx::query(
                "INSERT INTO question_options (id, question_id, option_text, is_correct)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(option.question_id.to_string())
            .bind(&option.option_text)
            .bind(option.is_correct)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self, _credential))]
    async fn list_courses(
        &self,
        _credential: Option<&Credential>,
        filter: CourseFilter,
    ) -> Result<Vec<Course>, AppError> {
        info!("Listing courses");
        let query = match filter {
            CourseFilter::CreatedBy(owner) => sqlx::query_as::<_, DbCourse>(
                "SELECT id, title, subject, description, created_by, is_published, created_at
                 FROM courses
                 WHERE created_by = ?
                 ORDER BY created_at DESC",
            )
            .bind(owner.to_string()),
            CourseFilter::Published => sqlx::query_as::<_, DbCourse>(
                "SELECT id, title, subject, description, created_by, is_published, created_at
                 FROM courses
                 WHERE is_published = 1
                 ORDER BY created_at DESC",
            ),
        };

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Course::from).collect())
    }

    #[instrument(skip(self, _credential))]
    async fn find_course(
        &self,
        _credential: &Credential,
        id: Uuid,
    ) -> Result<Option<Course>, AppError> {
        info!("Fetching course by ID");
        let row = sqlx::query_as::<_, DbCourse>(
            "SELECT id, title, subject, description, created_by, is_published, created_at
             FROM courses WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Course::from))
    }

    #[instrument(skip(self, _credential))]
    async fn list_pages(
        &self,
        _credential: &Credential,
        course_id: Uuid,
    ) -> Result<Vec<CoursePage>, AppError> {
        let rows = sqlx::query_as::<_, DbCoursePage>(
            "SELECT id, course_id, page_index, title, content_md
             FROM course_pages
             WHERE course_id = ?
             ORDER BY page_index ASC",
        )
        .bind(course_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CoursePage::from).collect())
    }

    #[instrument(skip(self, _credential))]
    async fn list_questions(
        &self,
        _credential: &Credential,
        course_id: Uuid,
    ) -> Result<Vec<QuestionWithOptions>, AppError> {
        let questions = sqlx::query_as::<_, DbQuestion>(
            "SELECT id, course_id, question_text, type
             FROM questions
             WHERE course_id = ?
             ORDER BY rowid",
        )
        .bind(course_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let options = sqlx::query_as::<_, DbQuestionOption>(
            "SELECT o.id, o.question_id, o.option_text, o.is_correct
             FROM question_options o
             JOIN questions q ON q.id = o.question_id
             WHERE q.course_id = ?
             ORDER BY o.rowid",
        )
        .bind(course_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut options_by_question: HashMap<Uuid, Vec<QuestionOption>> = HashMap::new();
        for option in options.into_iter().map(QuestionOption::from) {
            options_by_question
                .entry(option.question_id)
                .or_default()
                .push(option);
        }

        Ok(questions
            .into_iter()
            .map(Question::from)
            .map(|question| QuestionWithOptions {
                options: options_by_question.remove(&question.id).unwrap_or_default(),
                question,
            })
            .collect())
    }

    #[instrument(skip(self, _credential))]
    async fn delete_course(&self, _credential: &Credential, id: Uuid) -> Result<(), AppError> {
        info!("Deleting course");
        sqlx::query("DELETE FROM courses WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
