//! Application services: the conversion job queue and its renderers.

pub mod error;
pub mod jobs;
pub mod render;
