use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::Credential;
use crate::error::AppError;
use crate::models::{
    Course, CoursePage, NewCourse, NewCoursePage, NewQuestion, NewQuestionOption, Question,
    QuestionWithOptions,
};

use super::{
    COURSE_PAGES_TABLE, COURSES_TABLE, CourseFilter, CourseStore, QUESTION_OPTIONS_TABLE,
    QUESTIONS_TABLE,
};

/// PostgREST client for the Supabase project. Requests are sent with the
/// anon key as `apikey` and the caller's token as the bearer, so RLS
/// policies see the real user.
pub struct SupabaseStore {
    client: Client,
    rest_url: String,
    anon_key: String,
}

impl SupabaseStore {
    pub fn new(client: Client, supabase_url: &str, anon_key: &str) -> Self {
        Self {
            client,
            rest_url: format!("{}/rest/v1", supabase_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    fn request(
        &self,
        method: reqwest::Method,
        table: &str,
        credential: Option<&Credential>,
    ) -> RequestBuilder {
        let bearer = credential.map(Credential::token).unwrap_or(self.anon_key.as_str());
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    async fn insert_rows<T: Serialize + Sync + ?Sized, R: DeserializeOwned + Send>(
        &self,
        table: &'static str,
        credential: &Credential,
        rows: &T,
    ) -> Result<Vec<R>, AppError> {
        let response = self
            .request(reqwest::Method::POST, table, Some(credential))
            .header("Prefer", "return=representation")
            .json(rows)
            .send()
            .await?;

        read_rows(table, response).await
    }

    async fn select_rows<R: DeserializeOwned + Send>(
        &self,
        table: &'static str,
        credential: Option<&Credential>,
        query: &[(&str, String)],
    ) -> Result<Vec<R>, AppError> {
        let response = self
            .request(reqwest::Method::GET, table, credential)
            .query(query)
            .send()
            .await?;

        read_rows(table, response).await
    }
}

async fn read_rows<R: DeserializeOwned + Send>(
    table: &'static str,
    response: Response,
) -> Result<Vec<R>, AppError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::ExternalService(format!(
            "{} returned {}: {}",
            table, status, body
        )));
    }

    response.json::<Vec<R>>().await.map_err(|e| {
        AppError::ExternalService(format!("{} returned an unreadable body: {}", table, e))
    })
}

fn single<R>(table: &'static str, rows: Vec<R>) -> Result<R, AppError> {
    rows.into_iter().next().ok_or_else(|| {
        AppError::ExternalService(format!("{} insert returned no representation", table))
    })
}

fn eq(value: impl ToString) -> String {
    format!("eq.{}", value.to_string())
}

#[rocket::async_trait]
impl CourseStore for SupabaseStore {
    #[instrument(skip(self, credential))]
    async fn insert_course(
        &self,
        credential: &Credential,
        course: &NewCourse,
    ) -> Result<Course, AppError> {
        info!("Inserting course");
        let rows = self.insert_rows(COURSES_TABLE, credential, course).await?;
        single(COURSES_TABLE, rows)
    }

    #[instrument(skip_all, fields(count = pages.len()))]
    async fn insert_pages(
        &self,
        credential: &Credential,
        pages: &[NewCoursePage],
    ) -> Result<(), AppError> {
        info!("Inserting course pages");
        let _: Vec<CoursePage> = self
            .insert_rows(COURSE_PAGES_TABLE, credential, pages)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, credential))]
    async fn insert_question(
        &self,
        credential: &Credential,
        question: &NewQuestion,
    ) -> Result<Question, AppError> {
        info!("Inserting question");
        let rows = self
            .insert_rows(QUESTIONS_TABLE, credential, question)
            .await?;
        single(QUESTIONS_TABLE, rows)
    }

    #[instrument(skip_all, fields(count = options.len()))]
    async fn insert_options(
        &self,
        credential: &Credential,
        options: &[NewQuestionOption],
    ) -> Result<(), AppError> {
        info!("Inserting question options");
        let _: Vec<serde_json::Value> = self
            .insert_rows(QUESTION_OPTIONS_TABLE, credential, options)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, credential))]
    async fn list_courses(
        &self,
        credential: Option<&Credential>,
        filter: CourseFilter,
    ) -> Result<Vec<Course>, AppError> {
        info!("Listing courses");
        let condition = match filter {
            CourseFilter::CreatedBy(owner) => ("created_by", eq(owner)),
            CourseFilter::Published => ("is_published", eq(true)),
        };

        self.select_rows(
            COURSES_TABLE,
            credential,
            &[
                ("select", "*".to_string()),
                condition,
                ("order", "created_at.desc".to_string()),
            ],
        )
        .await
    }

    #[instrument(skip(self, credential))]
    async fn find_course(
        &self,
        credential: &Credential,
        id: Uuid,
    ) -> Result<Option<Course>, AppError> {
        info!("Fetching course by ID");
        let rows: Vec<Course> = self
            .select_rows(
                COURSES_TABLE,
                Some(credential),
                &[("select", "*".to_string()), ("id", eq(id))],
            )
            .await?;

        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self, credential))]
    async fn list_pages(
        &self,
        credential: &Credential,
        course_id: Uuid,
    ) -> Result<Vec<CoursePage>, AppError> {
        self.select_rows(
            COURSE_PAGES_TABLE,
            Some(credential),
            &[
                ("select", "*".to_string()),
                ("course_id", eq(course_id)),
                ("order", "page_index.asc".to_string()),
            ],
        )
        .await
    }

    #[instrument(skip(self, credential))]
    async fn list_questions(
        &self,
        credential: &Credential,
        course_id: Uuid,
    ) -> Result<Vec<QuestionWithOptions>, AppError> {
        self.select_rows(
            QUESTIONS_TABLE,
            Some(credential),
            &[
                ("select", format!("*,{}(*)", QUESTION_OPTIONS_TABLE)),
                ("course_id", eq(course_id)),
            ],
        )
        .await
    }

    #[instrument(skip(self, credential))]
    async fn delete_course(&self, credential: &Credential, id: Uuid) -> Result<(), AppError> {
        info!("Deleting course");
        let response = self
            .request(reqwest::Method::DELETE, COURSES_TABLE, Some(credential))
            .query(&[("id", eq(id))])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::ExternalService(format!(
                "{} delete returned {}",
                COURSES_TABLE, status
            )));
        }
        Ok(())
    }
}
