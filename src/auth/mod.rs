pub mod authentication;
pub mod provider;
pub mod user;

pub use authentication::*;
pub use provider::*;
pub use user::*;
