//! Top-level error type for booklens.
//!
//! Each subsystem defines its own miette diagnostic enum next to its code;
//! `BookLensError` wraps them transparently so error codes and help text
//! reach the user unchanged.

use miette::Diagnostic;
use thiserror::Error;

use crate::analysis::error::AnalysisError;
use crate::config::ConfigError;
use crate::library::error::LibraryError;
use crate::paths::PathError;

#[derive(Debug, Error, Diagnostic)]
pub enum BookLensError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Library(#[from] LibraryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Paths(#[from] PathError),
}

pub type BookLensResult<T> = std::result::Result<T, BookLensError>;
