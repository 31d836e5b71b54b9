#[cfg(test)]
pub mod test_utils {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::Once;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rocket::fairing::AdHoc;
    use rocket::http::{Header, Status};
    use rocket::local::asynchronous::{Client, LocalResponse};
    use serde::de::DeserializeOwned;
    use tracing_subscriber::EnvFilter;
    use uuid::Uuid;

    use crate::ai::{ContentGenerator, CourseSynthesizer, GeneratorError};
    use crate::auth::{AuthProvider, Credential, Principal};
    use crate::courses::GenerationPolicy;
    use crate::error::AppError;
    use crate::init_rocket;
    use crate::models::{
        Course, CoursePage, NewCourse, NewCoursePage, NewQuestion, NewQuestionOption, Question,
        QuestionWithOptions,
    };
    use crate::state::AppState;
    use crate::store::{CourseFilter, CourseStore, SqliteStore};

    static INIT: Once = Once::new();

    pub const ALICE_TOKEN: &str = "alice-token";
    pub const BOB_TOKEN: &str = "bob-token";

    pub fn alice() -> Principal {
        Principal {
            id: Uuid::from_u128(0xa11ce),
            email: Some("alice@example.com".to_string()),
        }
    }

    pub fn bob() -> Principal {
        Principal {
            id: Uuid::from_u128(0xb0b),
            email: Some("bob@example.com".to_string()),
        }
    }

    pub fn init_test_tracing() {
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new("debug"))
                .with_test_writer()
                .try_init();
        });
    }

    /// Auth provider backed by a fixed token table.
    #[derive(Default)]
    pub struct TokenTableAuth {
        users: HashMap<String, Principal>,
    }

    #[rocket::async_trait]
    impl AuthProvider for TokenTableAuth {
        async fn get_user(&self, token: &str) -> Result<Option<Principal>, AppError> {
            if token == "provider-down" {
                return Err(AppError::ExternalService("auth provider offline".to_string()));
            }
            Ok(self.users.get(token).cloned())
        }
    }

    /// Generator that answers every prompt with the same body or error.
    pub enum ScriptedGenerator {
        Reply(String),
        Unavailable,
    }

    #[rocket::async_trait]
    impl ContentGenerator for ScriptedGenerator {
        async fn generate_json(&self, _system: &str, _prompt: &str) -> Result<String, GeneratorError> {
            match self {
                ScriptedGenerator::Reply(body) => Ok(body.clone()),
                ScriptedGenerator::Unavailable => Err(GeneratorError::Status {
                    provider: "openai",
                    status: 503,
                }),
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FailAt {
        Course,
        Pages,
        /// The n-th question insert (0-based).
        Question(usize),
        /// The options batch of the n-th question (0-based).
        Options(usize),
        FindCourse,
        ListPages,
        ListQuestions,
    }

    /// Wraps a `SqliteStore` and fails one chosen operation, recording each
    /// call so tests can check nothing ran past the failure.
    pub struct FailingStore {
        inner: SqliteStore,
        fail_at: FailAt,
        questions_seen: AtomicUsize,
        options_seen: AtomicUsize,
        pub calls: std::sync::Mutex<Vec<&'static str>>,
    }

    impl FailingStore {
        pub fn new(inner: SqliteStore, fail_at: FailAt) -> Self {
            Self {
                inner,
                fail_at,
                questions_seen: AtomicUsize::new(0),
                options_seen: AtomicUsize::new(0),
                calls: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }

        pub fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn injected(what: &str) -> AppError {
            AppError::ExternalService(format!("injected failure: {}", what))
        }
    }

    #[rocket::async_trait]
    impl CourseStore for FailingStore {
        async fn insert_course(
            &self,
            credential: &Credential,
            course: &NewCourse,
        ) -> Result<Course, AppError> {
            self.record("insert_course");
            if self.fail_at == FailAt::Course {
                return Err(Self::injected("courses"));
            }
            self.inner.insert_course(credential, course).await
        }

        async fn insert_pages(
            &self,
            credential: &Credential,
            pages: &[NewCoursePage],
        ) -> Result<(), AppError> {
            self.record("insert_pages");
            if self.fail_at == FailAt::Pages {
                return Err(Self::injected("course_pages"));
            }
            self.inner.insert_pages(credential, pages).await
        }

        async fn insert_question(
            &self,
            credential: &Credential,
            question: &NewQuestion,
        ) -> Result<Question, AppError> {
            self.record("insert_question");
            let n = self.questions_seen.fetch_add(1, Ordering::SeqCst);
            if self.fail_at == FailAt::Question(n) {
                return Err(Self::injected("questions"));
            }
            self.inner.insert_question(credential, question).await
        }

        async fn insert_options(
            &self,
            credential: &Credential,
            options: &[NewQuestionOption],
        ) -> Result<(), AppError> {
            self.record("insert_options");
            let n = self.options_seen.fetch_add(1, Ordering::SeqCst);
            if self.fail_at == FailAt::Options(n) {
                return Err(Self::injected("question_options"));
            }
            self.inner.insert_options(credential, options).await
        }

        async fn list_courses(
            &self,
            credential: Option<&Credential>,
            filter: CourseFilter,
        ) -> Result<Vec<Course>, AppError> {
            self.inner.list_courses(credential, filter).await
        }

        async fn find_course(
            &self,
            credential: &Credential,
            id: Uuid,
        ) -> Result<Option<Course>, AppError> {
            if self.fail_at == FailAt::FindCourse {
                return Err(Self::injected("courses"));
            }
            self.inner.find_course(credential, id).await
        }

        async fn list_pages(
            &self,
            credential: &Credential,
            course_id: Uuid,
        ) -> Result<Vec<CoursePage>, AppError> {
            if self.fail_at == FailAt::ListPages {
                return Err(Self::injected("course_pages"));
            }
            self.inner.list_pages(credential, course_id).await
        }

        async fn list_questions(
            &self,
            credential: &Credential,
            course_id: Uuid,
        ) -> Result<Vec<QuestionWithOptions>, AppError> {
            if self.fail_at == FailAt::ListQuestions {
                return Err(Self::injected("questions"));
            }
            self.inner.list_questions(credential, course_id).await
        }

        async fn delete_course(&self, credential: &Credential, id: Uuid) -> Result<(), AppError> {
            self.record("delete_course");
            self.inner.delete_course(credential, id).await
        }
    }

    pub struct TestApp {
        pub client: Client,
        pub store: SqliteStore,
    }

    impl TestApp {
        pub async fn count(&self, table: &str) -> i64 {
            let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(self.store.pool())
                .await
                .expect("Failed to count rows");
            count
        }
    }

    #[derive(Default)]
    pub struct TestAppBuilder {
        users: Vec<(String, Principal)>,
        generator: Option<Arc<dyn ContentGenerator>>,
        fail_at: Option<FailAt>,
        rollback_on_failure: bool,
    }

    impl TestAppBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn user(mut self, token: &str, principal: Principal) -> Self {
            self.users.push((token.to_string(), principal));
            self
        }

        pub fn generator_reply(mut self, body: impl Into<String>) -> Self {
            self.generator = Some(Arc::new(ScriptedGenerator::Reply(body.into())));
            self
        }

        pub fn generator_unavailable(mut self) -> Self {
            self.generator = Some(Arc::new(ScriptedGenerator::Unavailable));
            self
        }

        pub fn fail_at(mut self, fail_at: FailAt) -> Self {
            self.fail_at = Some(fail_at);
            self
        }

        pub fn rollback_on_failure(mut self) -> Self {
            self.rollback_on_failure = true;
            self
        }

        pub async fn build(self) -> TestApp {
            init_test_tracing();

            let sqlite = SqliteStore::in_memory()
                .await
                .expect("Failed to create in-memory store");

            let store: Arc<dyn CourseStore> = match self.fail_at {
                Some(fail_at) => Arc::new(FailingStore::new(sqlite.clone(), fail_at)),
                None => Arc::new(sqlite.clone()),
            };

            let state = AppState {
                store,
                auth: Arc::new(TokenTableAuth {
                    users: self.users.into_iter().collect(),
                }),
                synthesizer: CourseSynthesizer::new(self.generator),
                policy: GenerationPolicy {
                    rollback_on_failure: self.rollback_on_failure,
                },
            };

            let client = Client::tracked(init_rocket(state))
                .await
                .expect("Failed to build rocket client");

            TestApp {
                client,
                store: sqlite,
            }
        }
    }

    /// The usual two-user app with no AI key configured.
    pub async fn standard_test_app() -> TestApp {
        TestAppBuilder::new()
            .user(ALICE_TOKEN, alice())
            .user(BOB_TOKEN, bob())
            .build()
            .await
    }

    pub fn bearer(token: &str) -> Header<'static> {
        Header::new("Authorization", format!("Bearer {}", token))
    }

    pub async fn read_json<T: DeserializeOwned>(response: LocalResponse<'_>) -> T {
        let body = response.into_string().await.expect("Response had no body");
        serde_json::from_str(&body).unwrap_or_else(|e| panic!("Bad JSON ({}): {}", e, body))
    }

    pub async fn generate(app: &TestApp, token: &str, subject: &str) -> Uuid {
        let response = app
            .client
            .post("/courses/generate")
            .header(rocket::http::ContentType::JSON)
            .header(bearer(token))
            .body(serde_json::json!({ "subject": subject }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Created);
        let created: crate::models::CourseCreated = read_json(response).await;
        created.id
    }

    /// Launches a real Rocket server on a free local port with `routes`, for
    /// exercising the HTTP collaborators against canned replies. Returns its
    /// base URL once it is accepting connections.
    pub async fn serve_canned(routes: Vec<rocket::Route>) -> String {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .and_then(|listener| listener.local_addr())
            .expect("Failed to reserve a local port")
            .port();

        let (ready_tx, ready_rx) = rocket::tokio::sync::oneshot::channel::<()>();
        let ready_tx = std::sync::Mutex::new(Some(ready_tx));

        let figment = rocket::Config::figment()
            .merge(("address", "127.0.0.1"))
            .merge(("port", port))
            .merge(("log_level", "off"));

        let server = rocket::custom(figment)
            .mount("/", routes)
            .attach(AdHoc::on_liftoff("Canned server ready", move |_| {
                let ready_tx = ready_tx.lock().unwrap().take();
                Box::pin(async move {
                    if let Some(ready_tx) = ready_tx {
                        let _ = ready_tx.send(());
                    }
                })
            }));

        rocket::tokio::spawn(async move {
            let _ = server.launch().await;
        });
        ready_rx.await.expect("Canned server failed to launch");

        format!("http://127.0.0.1:{}", port)
    }
}
