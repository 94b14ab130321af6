//! booklens CLI: EPUB analysis and content-based recommendations.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use booklens::analysis::progress::{StderrSink, TracingSink};
use booklens::analysis::{Analyzer, aggregate_dir, write_summary};
use booklens::config::BookLensConfig;
use booklens::library::{
    Catalog, ChunkConfig, EpubExtractor, ExtractOptions, InteractionUpdate, NewBook,
    ReadingStatus, chapters_to_json, chapters_to_text, save_chunks, split_into_chunks,
};
use booklens::paths::BookLensPaths;
use booklens::recommend::{DEFAULT_STRATEGY, recommend};

/// Environment variable that overrides `service.api_key`.
const API_KEY_ENV: &str = "BOOKLENS_API_KEY";

#[derive(Parser)]
#[command(name = "booklens", version, about = "EPUB analysis and book recommendations")]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/booklens/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding catalog.json (default: $XDG_DATA_HOME/booklens).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract an EPUB into plain text or chapter JSON.
    Extract {
        /// EPUB file.
        input: PathBuf,
        /// Output file (default: stdout).
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Emit `[{title, paragraphs}]` JSON instead of text.
        #[arg(long)]
        json: bool,
        /// Render links as `[text](href)`.
        #[arg(long)]
        keep_links: bool,
        /// Keep footnotes and footnote anchors.
        #[arg(long)]
        keep_footnotes: bool,
        /// Collapse line breaks inside paragraphs.
        #[arg(long)]
        join_lines: bool,
        /// Drop paragraphs shorter than this many characters.
        #[arg(long)]
        min_len: Option<usize>,
    },

    /// Split a text file into overlapped chunk files.
    Chunk {
        /// Plain-text file.
        input: PathBuf,
        /// Directory for `{prefix}_chunk_NN.txt` files.
        #[arg(long)]
        out_dir: PathBuf,
        /// File name prefix (default: input file stem).
        #[arg(long)]
        prefix: Option<String>,
        /// Token budget per chunk.
        #[arg(long, default_value = "2000")]
        chunk_size: usize,
        /// Trailing paragraphs copied into the next chunk.
        #[arg(long, default_value = "100")]
        overlap: usize,
    },

    /// Aggregate `*_tag_*.json` files in a directory.
    Aggregate {
        /// Directory containing per-chunk tag files.
        dir: PathBuf,
        /// Also write `{prefix}_tag_all.json` here.
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[arg(long, default_value = "book")]
        prefix: String,
    },

    /// Run the full analysis on an EPUB.
    Analyze {
        /// EPUB file.
        input: PathBuf,
        /// Add the analyzed book to the catalog.
        #[arg(long)]
        store: bool,
        /// Title to store (default: EPUB metadata, then file name).
        #[arg(long)]
        title: Option<String>,
        /// Author to store (default: EPUB metadata).
        #[arg(long)]
        author: Option<String>,
        /// Seed for chunk sampling.
        #[arg(long)]
        seed: Option<u64>,
        /// Log progress instead of printing it.
        #[arg(long)]
        quiet: bool,
    },

    /// Browse the catalog.
    Books {
        #[command(subcommand)]
        action: BookAction,
    },

    /// Manage readers.
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Record that a reader read a book.
    Read {
        user_id: u64,
        book_id: u64,
        /// reading, finished, or dropped.
        #[arg(long, default_value = "finished")]
        status: ReadingStatus,
        #[arg(long)]
        rating: Option<u8>,
        #[arg(long)]
        progress: Option<f32>,
    },

    /// Recommend unread books for a reader.
    Recommend {
        user_id: u64,
        #[arg(long, default_value = "10")]
        top_k: usize,
        #[arg(long, default_value = DEFAULT_STRATEGY)]
        strategy: String,
    },

    /// Inspect or create the config file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum BookAction {
    /// List books, optionally filtered by title or author.
    List {
        #[arg(long)]
        query: Option<String>,
        #[arg(long, default_value = "0")]
        skip: usize,
        #[arg(long, default_value = "100")]
        limit: usize,
    },
    /// Show one book with its tags.
    Show { id: u64 },
}

#[derive(Subcommand)]
enum UserAction {
    /// Register a reader.
    Add {
        name: String,
        #[arg(long)]
        email: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Print the effective config.
    Show,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => BookLensPaths::resolve()?.config_file(),
    };
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => BookLensPaths::resolve()?.data_dir,
    };

    let mut config = BookLensConfig::load_or_default(&config_path)?;
    config.service = config
        .service
        .with_api_key(std::env::var(API_KEY_ENV).ok());

    match cli.command {
        Commands::Extract {
            input,
            output,
            json,
            keep_links,
            keep_footnotes,
            join_lines,
            min_len,
        } => {
            let options = ExtractOptions {
                keep_links: keep_links || config.extract.keep_links,
                keep_footnotes: keep_footnotes || config.extract.keep_footnotes,
                join_lines: join_lines || config.extract.join_lines,
                min_paragraph_len: min_len.unwrap_or(config.extract.min_paragraph_len),
            };
            let book = EpubExtractor::new(options).extract_path(&input)?;
            let rendered = if json {
                chapters_to_json(&book.chapters)?
            } else {
                chapters_to_text(&book.chapters)
            };
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered).into_diagnostic()?;
                    println!("Wrote {} chapters to {}", book.chapters.len(), path.display());
                }
                None => print!("{rendered}"),
            }
        }

        Commands::Chunk {
            input,
            out_dir,
            prefix,
            chunk_size,
            overlap,
        } => {
            let text = std::fs::read_to_string(&input).into_diagnostic()?;
            let chunks = split_into_chunks(&text, &ChunkConfig { chunk_size, overlap });
            let prefix = prefix.unwrap_or_else(|| file_stem(&input));
            let written = save_chunks(&chunks, &out_dir, &prefix)?;
            println!("Wrote {} chunks to {}", written.len(), out_dir.display());
        }

        Commands::Aggregate { dir, out_dir, prefix } => {
            let summary = aggregate_dir(&dir)?;
            if let Some(out_dir) = out_dir {
                let path = write_summary(&summary, &out_dir, &prefix)?;
                eprintln!("Wrote {}", path.display());
            }
            println!("{}", serde_json::to_string_pretty(&summary).into_diagnostic()?);
        }

        Commands::Analyze {
            input,
            store,
            title,
            author,
            seed,
            quiet,
        } => {
            let mut analyzer = Analyzer::from_config(&config);
            analyzer = if quiet {
                analyzer.with_sink(Box::new(TracingSink))
            } else {
                analyzer.with_sink(Box::new(StderrSink))
            };
            if let Some(seed) = seed {
                analyzer = analyzer.with_seed(seed);
            }

            let outcome = analyzer.analyze_document(&input)?;

            if store {
                let metadata = EpubExtractor::new(config.extract.clone())
                    .extract_path(&input)?
                    .metadata;
                let mut catalog = Catalog::open(&data_dir)?;
                let book = catalog.add_book(NewBook {
                    title: title
                        .or(metadata.title)
                        .unwrap_or_else(|| file_stem(&input)),
                    author: author.or(metadata.author),
                    description: metadata.description,
                    published_year: None,
                    tags: Some(outcome.tags),
                    embedding: outcome.embedding,
                })?;
                println!(
                    "Stored book {} \"{}\" (embedding: {})",
                    book.id,
                    book.title,
                    if book.embedding.is_some() { "yes" } else { "no" }
                );
            } else {
                println!("{}", serde_json::to_string_pretty(&outcome).into_diagnostic()?);
            }
        }

        Commands::Books { action } => {
            let catalog = Catalog::open(&data_dir)?;
            match action {
                BookAction::List { query, skip, limit } => {
                    let books = catalog.list_books(query.as_deref(), skip, limit);
                    if books.is_empty() {
                        println!("No books.");
                    } else {
                        println!("Books ({} of {}):", books.len(), catalog.count_books(query.as_deref()));
                        for book in books {
                            println!(
                                "  {} / \"{}\" by {}",
                                book.id,
                                book.title,
                                book.author.as_deref().unwrap_or("unknown")
                            );
                        }
                    }
                }
                BookAction::Show { id } => {
                    let book = catalog
                        .get_book(id)
                        .ok_or(booklens::library::LibraryError::BookNotFound { id })?;
                    println!("{}", serde_json::to_string_pretty(book).into_diagnostic()?);
                }
            }
        }

        Commands::User { action } => match action {
            UserAction::Add { name, email } => {
                let mut catalog = Catalog::open(&data_dir)?;
                let user = catalog.add_user(&name, email.as_deref())?;
                println!("Added user {} \"{}\"", user.id, user.name);
            }
        },

        Commands::Read {
            user_id,
            book_id,
            status,
            rating,
            progress,
        } => {
            let mut catalog = Catalog::open(&data_dir)?;
            let record = catalog.record_interaction(
                user_id,
                book_id,
                InteractionUpdate {
                    status,
                    rating,
                    progress,
                },
            )?;
            println!(
                "User {} / book {}: {}",
                record.user_id, record.book_id, record.status
            );
        }

        Commands::Recommend {
            user_id,
            top_k,
            strategy,
        } => {
            let catalog = Catalog::open(&data_dir)?;
            if catalog.get_user(user_id).is_none() {
                return Err(booklens::library::LibraryError::UserNotFound { id: user_id }.into());
            }
            let library = catalog.user_library(user_id);
            let response = recommend(&library, catalog.books(), top_k, &strategy)?;
            println!("{}", serde_json::to_string_pretty(&response).into_diagnostic()?);
        }

        Commands::Config { action } => match action {
            ConfigAction::Init { force } => {
                if config_path.exists() && !force {
                    miette::bail!(
                        "config already exists at {} (use --force to overwrite)",
                        config_path.display()
                    );
                }
                BookLensConfig::default().save(&config_path)?;
                println!("Wrote {}", config_path.display());
            }
            ConfigAction::Show => {
                let mut shown = config.clone();
                if shown.service.api_key.is_some() {
                    shown.service.api_key = Some("<set>".into());
                }
                print!("{}", toml::to_string_pretty(&shown).into_diagnostic()?);
            }
        },
    }

    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "book".to_string())
}
