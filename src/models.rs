use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_QUESTION_TYPE: &str = "mcq";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub subject: String,
    pub description: Option<String>,
    pub created_by: Uuid,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbCourse {
    pub id: Option<String>,
    pub title: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub created_by: Option<String>,
    pub is_published: Option<bool>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbCourse> for Course {
    fn from(course: DbCourse) -> Self {
        Self {
            id: parse_uuid(course.id),
            title: course.title.unwrap_or_default(),
            subject: course.subject.unwrap_or_default(),
            description: course.description,
            created_by: parse_uuid(course.created_by),
            is_published: course.is_published.unwrap_or_default(),
            created_at: course
                .created_at
                .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
                .unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CoursePage {
    pub id: Uuid,
    pub course_id: Uuid,
    pub page_index: i64,
    pub title: String,
    pub content_md: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbCoursePage {
    pub id: Option<String>,
    pub course_id: Option<String>,
    pub page_index: Option<i64>,
    pub title: Option<String>,
    pub content_md: Option<String>,
}

impl From<DbCoursePage> for CoursePage {
    fn from(page: DbCoursePage) -> Self {
        Self {
            id: parse_uuid(page.id),
            course_id: parse_uuid(page.course_id),
            page_index: page.page_index.unwrap_or_default(),
            title: page.title.unwrap_or_default(),
            content_md: page.content_md.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Question {
    pub id: Uuid,
    pub course_id: Uuid,
    pub question_text: String,
    #[serde(rename = "type")]
    pub question_type: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbQuestion {
    pub id: Option<String>,
    pub course_id: Option<String>,
    pub question_text: Option<String>,
    #[sqlx(rename = "type")]
    pub question_type: Option<String>,
}

impl From<DbQuestion> for Question {
    fn from(question: DbQuestion) -> Self {
        Self {
            id: parse_uuid(question.id),
            course_id: parse_uuid(question.course_id),
            question_text: question.question_text.unwrap_or_default(),
            question_type: question
                .question_type
                .unwrap_or_else(|| DEFAULT_QUESTION_TYPE.to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct QuestionOption {
    pub id: Uuid,
    pub question_id: Uuid,
    pub option_text: String,
    pub is_correct: bool,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbQuestionOption {
    pub id: Option<String>,
    pub question_id: Option<String>,
    pub option_text: Option<String>,
    pub is_correct: Option<bool>,
}

impl From<DbQuestionOption> for QuestionOption {
    fn from(option: DbQuestionOption) -> Self {
        Self {
            id: parse_uuid(option.id),
            question_id: parse_uuid(option.question_id),
            option_text: option.option_text.unwrap_or_default(),
            is_correct: option.is_correct.unwrap_or_default(),
        }
    }
}

/// A question joined with its options. PostgREST names the nested
/// relation `question_options`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct QuestionWithOptions {
    #[serde(flatten)]
    pub question: Question,
    #[serde(default, alias = "question_options")]
    pub options: Vec<QuestionOption>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub pages: Option<Vec<CoursePage>>,
    pub questions: Option<Vec<QuestionWithOptions>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CourseCreated {
    pub id: Uuid,
}

#[derive(Debug, Serialize, Clone)]
pub struct NewCourse {
    pub title: String,
    pub subject: String,
    pub description: String,
    pub created_by: Uuid,
    pub is_published: bool,
}

#[derive(Debug, Serialize, Clone)]
pub struct NewCoursePage {
    pub course_id: Uuid,
    pub page_index: i64,
    pub title: String,
    pub content_md: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct NewQuestion {
    pub course_id: Uuid,
    pub question_text: String,
    #[serde(rename = "type")]
    pub question_type: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct NewQuestionOption {
    pub question_id: Uuid,
    pub option_text: String,
    pub is_correct: bool,
}

fn parse_uuid(value: Option<String>) -> Uuid {
    value
        .and_then(|raw| Uuid::parse_str(&raw).ok())
        .unwrap_or_default()
}
