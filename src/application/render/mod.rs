//! Rendering collaborators used by the job workers.
//!
//! Renderers are stateless with respect to jobs: they receive markdown and a
//! target kind, and return bytes plus a MIME type. Recording the outcome on the
//! job happens in the worker.

mod service;
mod types;

pub use service::{ConversionEngine, EngineConfig, GotenbergError, PandocError};
pub use types::{DocumentRenderer, RenderError, RenderRequest, RenderedDocument};
