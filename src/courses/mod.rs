pub mod generation;
pub mod retrieval;

pub use generation::*;
pub use retrieval::*;
