//! Diagnostic errors for sampling, external services, and aggregation.

use miette::Diagnostic;
use thiserror::Error;

/// Errors from the analysis pipeline.
#[derive(Debug, Error, Diagnostic)]
pub enum AnalysisError {
    #[error("no API key configured for the {service} service")]
    #[diagnostic(
        code(booklens::analysis::missing_credential),
        help(
            "Set `api_key` under [service] in the config file, or export \
             BOOKLENS_API_KEY before running."
        )
    )]
    MissingCredential { service: String },

    #[error("{service} service returned HTTP {status}: {body}")]
    #[diagnostic(
        code(booklens::analysis::service_status),
        help("Check the model name, the API key, and the service's rate limits.")
    )]
    ServiceStatus {
        service: String,
        status: u16,
        body: String,
    },

    #[error("{service} request failed: {message}")]
    #[diagnostic(
        code(booklens::analysis::transport),
        help("Check network connectivity and the configured base_url.")
    )]
    Transport { service: String, message: String },

    #[error("malformed {service} response: {message}")]
    #[diagnostic(
        code(booklens::analysis::malformed_response),
        help("The service answered, but not with the JSON shape that was requested.")
    )]
    MalformedResponse { service: String, message: String },

    #[error("embedding dimension mismatch: expected {expected}, got {actual} (vector {index})")]
    #[diagnostic(
        code(booklens::analysis::dimension_mismatch),
        help(
            "All vectors averaged together must come from the same embedding \
             model. Check that the embedding_model setting did not change mid-run."
        )
    )]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        index: usize,
    },

    #[error("scratch area error at {path}: {source}")]
    #[diagnostic(
        code(booklens::analysis::work_area),
        help("Check that the work_dir exists and is writable.")
    )]
    WorkArea {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Library(#[from] crate::library::error::LibraryError),
}

/// Convenience alias for analysis results.
pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;
