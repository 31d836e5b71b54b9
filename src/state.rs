use std::sync::Arc;

use crate::ai::CourseSynthesizer;
use crate::auth::AuthProvider;
use crate::courses::GenerationPolicy;
use crate::store::CourseStore;

/// Collaborators shared by every request. Read-only once Rocket launches.
pub struct AppState {
    pub store: Arc<dyn CourseStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub synthesizer: CourseSynthesizer,
    pub policy: GenerationPolicy,
}
