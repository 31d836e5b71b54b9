pub mod client;
pub mod course;

pub use client::*;
pub use course::*;
