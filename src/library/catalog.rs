//! Persistent book catalog backed by `catalog.json`.
//!
//! The catalog is a single JSON file holding books (with their analysis
//! results), users, and reading interactions. It lives at
//! `~/.local/share/booklens/catalog.json` unless a data directory is given.
//! Every mutation is flushed immediately.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::library::error::{LibraryError, LibraryResult};
use crate::library::model::*;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogData {
    #[serde(default)]
    books: Vec<Book>,
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    interactions: Vec<UserBookInteraction>,
}

/// Persistent index of books, users, and reading history.
pub struct Catalog {
    path: PathBuf,
    data: CatalogData,
}

impl Catalog {
    /// Open or create a catalog at the given directory.
    ///
    /// The catalog file is `{dir}/catalog.json`. If it doesn't exist,
    /// starts empty.
    pub fn open(dir: &Path) -> LibraryResult<Self> {
        let path = dir.join("catalog.json");

        let data = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|e| LibraryError::CatalogIo {
                message: format!("read {}: {e}", path.display()),
            })?;
            serde_json::from_str(&raw).map_err(|e| LibraryError::CatalogIo {
                message: format!("parse {}: {e}", path.display()),
            })?
        } else {
            CatalogData::default()
        };

        Ok(Self { path, data })
    }

    /// Flush the catalog to disk.
    fn flush(&self) -> LibraryResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LibraryError::CatalogIo {
                message: format!("create dir {}: {e}", parent.display()),
            })?;
        }
        let json =
            serde_json::to_string_pretty(&self.data).map_err(|e| LibraryError::CatalogIo {
                message: format!("serialize catalog: {e}"),
            })?;
        std::fs::write(&self.path, json).map_err(|e| LibraryError::CatalogIo {
            message: format!("write {}: {e}", self.path.display()),
        })?;
        Ok(())
    }

    // ── Books ───────────────────────────────────────────────────────────

    /// Store a new book, assigning the next sequential id.
    pub fn add_book(&mut self, new: NewBook) -> LibraryResult<Book> {
        let id = self.data.books.iter().map(|b| b.id).max().unwrap_or(0) + 1;
        let book = Book {
            id,
            title: new.title,
            author: new.author,
            description: new.description,
            published_year: new.published_year,
            tags: new.tags,
            embedding: new.embedding,
            created_at: now_secs(),
        };
        self.data.books.push(book.clone());
        self.flush()?;
        Ok(book)
    }

    pub fn get_book(&self, id: u64) -> Option<&Book> {
        self.data.books.iter().find(|b| b.id == id)
    }

    /// Books whose title or author contains `query` (case-insensitive),
    /// paged by `skip`/`limit`, in insertion order.
    pub fn list_books(&self, query: Option<&str>, skip: usize, limit: usize) -> Vec<&Book> {
        self.matching_books(query)
            .into_iter()
            .skip(skip)
            .take(limit)
            .collect()
    }

    pub fn count_books(&self, query: Option<&str>) -> usize {
        self.matching_books(query).len()
    }

    /// All stored books, in insertion order.
    pub fn books(&self) -> &[Book] {
        &self.data.books
    }

    fn matching_books(&self, query: Option<&str>) -> Vec<&Book> {
        let needle = query.map(str::to_lowercase).filter(|q| !q.is_empty());
        self.data
            .books
            .iter()
            .filter(|book| match &needle {
                None => true,
                Some(q) => {
                    book.title.to_lowercase().contains(q.as_str())
                        || book
                            .author
                            .as_deref()
                            .is_some_and(|a| a.to_lowercase().contains(q.as_str()))
                }
            })
            .collect()
    }

    // ── Users ───────────────────────────────────────────────────────────

    /// Register a user. An email already on file is rejected.
    pub fn add_user(&mut self, name: &str, email: Option<&str>) -> LibraryResult<User> {
        if let Some(email) = email {
            if self
                .data
                .users
                .iter()
                .any(|u| u.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email)))
            {
                return Err(LibraryError::DuplicateEmail {
                    email: email.into(),
                });
            }
        }

        let id = self.data.users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        let user = User {
            id,
            name: name.into(),
            email: email.map(str::to_string),
            created_at: now_secs(),
        };
        self.data.users.push(user.clone());
        self.flush()?;
        Ok(user)
    }

    pub fn get_user(&self, id: u64) -> Option<&User> {
        self.data.users.iter().find(|u| u.id == id)
    }

    // ── Interactions ────────────────────────────────────────────────────

    /// Record that `user_id` read `book_id`, updating an existing record for
    /// the same pair instead of adding a second one.
    pub fn record_interaction(
        &mut self,
        user_id: u64,
        book_id: u64,
        update: InteractionUpdate,
    ) -> LibraryResult<UserBookInteraction> {
        if self.get_user(user_id).is_none() {
            return Err(LibraryError::UserNotFound { id: user_id });
        }
        if self.get_book(book_id).is_none() {
            return Err(LibraryError::BookNotFound { id: book_id });
        }

        let now = now_secs();
        let record = match self
            .data
            .interactions
            .iter_mut()
            .find(|i| i.user_id == user_id && i.book_id == book_id)
        {
            Some(existing) => {
                existing.status = update.status;
                if update.rating.is_some() {
                    existing.rating = update.rating;
                }
                if update.progress.is_some() {
                    existing.progress = update.progress;
                }
                existing.last_read_at = now;
                existing.clone()
            }
            None => {
                let created = UserBookInteraction {
                    user_id,
                    book_id,
                    status: update.status,
                    rating: update.rating,
                    progress: update.progress,
                    last_read_at: now,
                };
                self.data.interactions.push(created.clone());
                created
            }
        };

        self.flush()?;
        Ok(record)
    }

    /// A user's interactions, optionally filtered by status.
    pub fn user_books(&self, user_id: u64, status: Option<ReadingStatus>) -> Vec<&UserBookInteraction> {
        self.data
            .interactions
            .iter()
            .filter(|i| i.user_id == user_id)
            .filter(|i| status.is_none_or(|s| i.status == s))
            .collect()
    }

    /// Join a user's interactions with the stored embedding of each book.
    pub fn user_library(&self, user_id: u64) -> UserLibrary {
        let entries = self
            .user_books(user_id, None)
            .into_iter()
            .map(|interaction| LibraryEntry {
                interaction: interaction.clone(),
                embedding: self
                    .get_book(interaction.book_id)
                    .and_then(|b| b.embedding.clone()),
            })
            .collect();
        UserLibrary { user_id, entries }
    }
}

/// File-name-safe identifier from a title: lowercase ASCII alphanumerics
/// separated by single dashes. Empty when nothing survives.
pub fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
