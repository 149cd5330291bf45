/// Ways a model response can break the scoring contract. All of them
/// abort the run; nothing is repaired or re-queried.
#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    #[error("Model response had no text content block")]
    MissingText,

    #[error("Model response had {0} text content blocks, expected exactly one")]
    MultipleText(usize),

    #[error("Model response is not a valid JSON score array: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("Model returned {actual} scores for {expected} emails")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Score at position {position} echoed index {echoed}")]
    IndexMismatch { position: usize, echoed: usize },
}
