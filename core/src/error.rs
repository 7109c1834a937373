use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transcript for person '{person_id}' is not sorted: time {next} follows {prev}")]
    UnsortedTranscript {
        person_id: String,
        prev: i64,
        next: i64,
    },

    #[error("Transcript references unknown offer '{offer_id}' (person '{person_id}')")]
    UnknownOffer { person_id: String, offer_id: String },

    #[error("Unrecognized event kind '{0}' in transcript")]
    UnknownEventKind(String),

    #[error("Input table '{name}' is empty")]
    EmptyTable { name: &'static str },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type PipeResult<T> = Result<T, PipelineError>;
