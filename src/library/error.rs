//! Rich diagnostic error types for extraction and the book catalog.

use miette::Diagnostic;
use thiserror::Error;

/// Errors from extraction, chunk file output, and catalog operations.
#[derive(Debug, Error, Diagnostic)]
pub enum LibraryError {
    #[error("unsupported upload: \"{path}\" is not an EPUB file")]
    #[diagnostic(
        code(booklens::library::unsupported_format),
        help("Only .epub files can be analyzed. Convert the book to EPUB first.")
    )]
    UnsupportedFormat { path: String },

    #[error("parse error in epub container \"{path}\": {message}")]
    #[diagnostic(
        code(booklens::library::parse_error),
        help(
            "The EPUB container could not be opened. Verify the file is a valid \
             EPUB (a zip archive with a package document) and not truncated."
        )
    )]
    ParseError { path: String, message: String },

    #[error("no content extracted from \"{origin}\"")]
    #[diagnostic(
        code(booklens::library::no_content),
        help(
            "Every spine document was empty, unresolvable, or shorter than the \
             minimum paragraph length. Try lowering --min-paragraph-len."
        )
    )]
    NoContentExtracted { origin: String },

    #[error("catalog I/O error: {message}")]
    #[diagnostic(
        code(booklens::library::catalog_io),
        help(
            "Failed to read or write the catalog. Check that the data \
             directory exists and has correct permissions."
        )
    )]
    CatalogIo { message: String },

    #[error("book not found: {id}")]
    #[diagnostic(
        code(booklens::library::book_not_found),
        help("List stored books with `booklens books list`.")
    )]
    BookNotFound { id: u64 },

    #[error("user not found: {id}")]
    #[diagnostic(
        code(booklens::library::user_not_found),
        help("Create the user first with `booklens user add`.")
    )]
    UserNotFound { id: u64 },

    #[error("email already registered: \"{email}\"")]
    #[diagnostic(
        code(booklens::library::duplicate_email),
        help("Each user needs a unique email address.")
    )]
    DuplicateEmail { email: String },

    #[error("I/O error: {source}")]
    #[diagnostic(
        code(booklens::library::io),
        help("A filesystem operation failed. Check file paths and permissions.")
    )]
    Io {
        #[source]
        source: std::io::Error,
    },
}

impl From<std::io::Error> for LibraryError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source }
    }
}

/// Convenience alias for library operation results.
pub type LibraryResult<T> = std::result::Result<T, LibraryError>;
