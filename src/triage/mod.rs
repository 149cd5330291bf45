//! Email triage: score a batch of emails with one model call and
//! render the result as a chat notification.

pub mod error;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod prompt;
pub mod render;
pub mod scorer;

pub use error::TriageError;
pub use models::*;
pub use normalize::{ContentBlockNormalizer, ResponseNormalizer};
pub use pipeline::{Outcome, Pipeline};
pub use prompt::ScoreSchema;
pub use render::RenderMode;
pub use scorer::Scorer;
