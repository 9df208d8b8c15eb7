use thiserror::Error;

#[derive(Error, Debug)]
pub enum CITraceError {
    #[error("Failed to decode job record: {0}")]
    Decode(String),

    #[error("Invalid build slug '{0}', expected organization/pipeline/number")]
    SlugParse(String),

    #[error("Build {0} has not finished yet")]
    NotReady(String),

    #[error("Failed to initialize tracer: {0}")]
    TracerInit(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Buildkite API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("GraphQL errors: {0}")]
    GraphQLError(String),

    #[error("GraphQL response contained no data")]
    NoResponseData,

    #[error("Build not found: {0}")]
    BuildNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Span export failed: {0}")]
    Export(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CITraceError {
    /// Errors raised while talking to the build data source.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::ApiError { .. }
                | Self::GraphQLError(_)
                | Self::NoResponseData
                | Self::BuildNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CITraceError>;
