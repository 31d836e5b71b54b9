//! Course content synthesis.
//!
//! One generator attempt per call. Anything short of a well-formed payload
//! (no key, transport failure, bad JSON, wrong shape) yields the mock course
//! for the subject instead, so synthesis itself never fails.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::models::DEFAULT_QUESTION_TYPE;

use super::{ContentGenerator, GeneratorError};

pub const SYSTEM_INSTRUCTION: &str =
    "You are a helpful education assistant. Always respond with valid JSON.";

pub const CHAPTER_COUNT: usize = 4;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GeneratedCourse {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub pages: Vec<GeneratedPage>,
    #[serde(default)]
    pub questions: Vec<GeneratedQuestion>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GeneratedPage {
    pub title: String,
    pub content_md: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GeneratedQuestion {
    pub question_text: String,
    #[serde(rename = "type", default)]
    pub question_type: Option<String>,
    pub options: Vec<GeneratedOption>,
}

impl GeneratedQuestion {
    /// `"mcq"` unless the generator named a type.
    pub fn question_type(&self) -> &str {
        self.question_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_QUESTION_TYPE)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GeneratedOption {
    pub option_text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// Where a synthesized course came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSource {
    Generator,
    Mock,
}

impl GeneratedCourse {
    pub fn parse(raw: &str) -> Result<Self, GeneratorError> {
        let course: GeneratedCourse = serde_json::from_str(raw.trim())?;
        course.check_shape()?;
        Ok(course)
    }

    fn check_shape(&self) -> Result<(), GeneratorError> {
        if self.title.trim().is_empty() {
            return Err(GeneratorError::Shape("course title is empty".to_string()));
        }
        if self.pages.is_empty() {
            return Err(GeneratorError::Shape("course has no pages".to_string()));
        }
        for (index, question) in self.questions.iter().enumerate() {
            if question.question_text.trim().is_empty() {
                return Err(GeneratorError::Shape(format!(
                    "question {} has no text",
                    index
                )));
            }
            if question.options.is_empty() {
                return Err(GeneratorError::Shape(format!(
                    "question {} has no options",
                    index
                )));
            }
        }
        Ok(())
    }

    /// Deterministic stand-in used whenever the generator cannot be relied on.
    pub fn mock(subject: &str) -> Self {
        let page = |title: &str, content_md: String| GeneratedPage {
            title: title.to_string(),
            content_md,
        };
        let option = |option_text: &str, is_correct: bool| GeneratedOption {
            option_text: option_text.to_string(),
            is_correct,
        };

        Self {
            title: format!("Introduction to {} (Mock)", subject),
            description: format!("This is a generated course about {}.", subject),
            pages: vec![
                page(
                    "Chapter 1: Basics",
                    format!("# Basics of {}\n\nThis is the first chapter content.", subject),
                ),
                page(
                    "Chapter 2: Intermediate",
                    format!("## Going Deeper\n\nMore details about {}.", subject),
                ),
                page(
                    "Chapter 3: Advanced",
                    format!("### Advanced Concepts\n\nComplex topics in {}.", subject),
                ),
                page(
                    "Chapter 4: Conclusion",
                    format!("#### Summary\n\nWrap up of {}.", subject),
                ),
            ],
            questions: vec![
                GeneratedQuestion {
                    question_text: format!("What is {}?", subject),
                    question_type: Some(DEFAULT_QUESTION_TYPE.to_string()),
                    options: vec![
                        option("A good thing", true),
                        option("A bad thing", false),
                        option("Nothing", false),
                    ],
                },
                GeneratedQuestion {
                    question_text: format!("Is {} hard?", subject),
                    question_type: Some(DEFAULT_QUESTION_TYPE.to_string()),
                    options: vec![option("Yes", true), option("No", false)],
                },
            ],
        }
    }
}

pub fn course_prompt(subject: &str) -> String {
    format!(
        r##"
Create an engaging educational course about "{subject}".

Generate a complete mini-course with {chapters} chapters and a quiz. Each chapter needs substantial educational content (at least 3-4 paragraphs) written in Markdown.

IMPORTANT: Return ONLY a valid JSON object with no additional text or explanation. Use exactly this structure:

{{
  "title": "An engaging course title about {subject}",
  "description": "A compelling 1-2 sentence description of what students will learn",
  "pages": [
    {{
      "title": "Chapter 1: Introduction to {subject}",
      "content_md": "# Introduction\n\nDetailed markdown content explaining the fundamentals, with practical examples.\n\n## Key Concepts\n\n- Point 1\n- Point 2"
    }},
    {{
      "title": "Chapter 2: [Relevant Topic]",
      "content_md": "Comprehensive markdown content with headings, paragraphs and examples"
    }},
    {{
      "title": "Chapter 3: [Advanced Topic]",
      "content_md": "In-depth markdown content covering more complex aspects"
    }},
    {{
      "title": "Chapter 4: Practical Application",
      "content_md": "Real-world applications, best practices and a summary of key takeaways"
    }}
  ],
  "questions": [
    {{
      "question_text": "A clear, specific question testing understanding of the chapters",
      "type": "mcq",
      "options": [
        {{ "option_text": "Correct answer", "is_correct": true }},
        {{ "option_text": "Plausible but incorrect option", "is_correct": false }},
        {{ "option_text": "Another incorrect option", "is_correct": false }},
        {{ "option_text": "Third incorrect option", "is_correct": false }}
      ]
    }}
  ]
}}

Write as many quiz questions as the material deserves. Mark exactly one option per question with "is_correct": true.
"##,
        subject = subject,
        chapters = CHAPTER_COUNT,
    )
}

/// Turns a subject into course content, falling back to [`GeneratedCourse::mock`].
#[derive(Clone)]
pub struct CourseSynthesizer {
    generator: Option<Arc<dyn ContentGenerator>>,
}

impl CourseSynthesizer {
    pub fn new(generator: Option<Arc<dyn ContentGenerator>>) -> Self {
        Self { generator }
    }

    /// A synthesizer that always returns the mock course.
    pub fn mock_only() -> Self {
        Self { generator: None }
    }

    #[instrument(skip(self))]
    pub async fn synthesize(&self, subject: &str) -> (GeneratedCourse, ContentSource) {
        match self.try_generate(subject).await {
            Ok(course) => {
                info!(title = %course.title, pages = course.pages.len(), "AI course generated");
                (course, ContentSource::Generator)
            }
            Err(err) => {
                warn!(error = %err, "Course generation failed, falling back to mock data");
                (GeneratedCourse::mock(subject), ContentSource::Mock)
            }
        }
    }

    async fn try_generate(&self, subject: &str) -> Result<GeneratedCourse, GeneratorError> {
        let generator = self.generator.as_ref().ok_or(GeneratorError::NotConfigured)?;
        let raw = generator
            .generate_json(SYSTEM_INSTRUCTION, &course_prompt(subject))
            .await?;
        GeneratedCourse::parse(&raw)
    }
}
