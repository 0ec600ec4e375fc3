use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;

use crate::models::{
    Bookmark, Color, Locator, QueryRequest, StoreBackendKind, StoreConfig, TagName,
};
use crate::query::parse_args;

/// Top-level CLI entrypoint for `markdir`.
#[derive(Parser, Debug)]
#[command(
    name = "markdir",
    about = "Bookmark store with a small query language",
    subcommand_required = false,
    arg_required_else_help = false
)]
pub struct Cli {
    /// Print the JSON schema version used for `--format=json` query
    /// output and exit.
    #[arg(long = "schema-version")]
    pub schema_version: bool,

    /// Location of the bookmark store.
    ///
    /// A directory for the file backend (default `.markdir/bookmarks`),
    /// a database file for SQLite (default `.markdir/bookmarks.sqlite`).
    #[arg(long = "store", env = "MARKDIR_STORE", global = true)]
    pub store: Option<PathBuf>,

    /// Store backend. Inferred from a `.sqlite` store path when omitted.
    #[arg(long = "backend", value_enum, global = true)]
    pub backend: Option<StoreBackendArg>,

    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` wins.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add or update a bookmark.
    Add(AddArgs),
    /// Show a single bookmark.
    Get(GetArgs),
    /// Remove a bookmark.
    Remove(RemoveArgs),
    /// Move a bookmark to a new URL, optionally editing it.
    Replace(ReplaceArgs),
    /// Record a visit to a bookmark.
    Visit(VisitArgs),
    /// Run a query such as `tagged:rust by:most-visited limit:10`.
    Query(QueryArgs),
    /// Bulk import bookmarks from a JSON array.
    Import(ImportArgs),
    /// Run a long-lived HTTP+JSON daemon.
    Serve(ServeArgs),
}

/// Fields shared by commands that write a bookmark.
#[derive(Args, Debug, Clone, Default)]
pub struct BookmarkFields {
    /// Bookmark title.
    #[arg(long = "title")]
    pub title: Option<String>,

    /// Tags, repeated or comma separated (`--tag rust,news`).
    #[arg(short = 't', long = "tag", value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Free-form notes.
    #[arg(long = "notes")]
    pub notes: Option<String>,

    /// Color as `#rgb` or `#rrggbb`.
    #[arg(long = "color")]
    pub color: Option<String>,
}

impl BookmarkFields {
    /// Overlay these fields onto `bookmark`. Tags replace the existing
    /// set only when at least one was given.
    pub fn apply(&self, mut bookmark: Bookmark) -> Result<Bookmark> {
        if let Some(title) = &self.title {
            bookmark.title = title.clone();
        }
        if !self.tags.is_empty() {
            bookmark.tags = self
                .tags
                .iter()
                .map(|t| TagName::parse(t))
                .collect::<Result<_>>()?;
        }
        if let Some(notes) = &self.notes {
            bookmark.notes = Some(notes.clone());
        }
        if let Some(color) = &self.color {
            bookmark.color = Some(Color::parse(color)?);
        }
        Ok(bookmark)
    }
}

/// Arguments for the `add` subcommand.
#[derive(Args, Debug)]
pub struct AddArgs {
    /// URL of the bookmark; `http://` is assumed when no scheme is given.
    pub url: String,

    #[command(flatten)]
    pub fields: BookmarkFields,

    /// Output format for the stored bookmark (text or json).
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Optional server URL for delegating the write to a daemon.
    ///
    /// When set (via this flag or `MARKDIR_SERVER_URL`), the bookmark is
    /// sent to the HTTP server instead of being written locally.
    #[arg(long = "server", env = "MARKDIR_SERVER_URL")]
    pub server: Option<String>,

    /// Disable use of any configured server and write locally.
    #[arg(long = "no-server")]
    pub no_server: bool,
}

impl AddArgs {
    pub fn to_bookmark(&self) -> Result<Bookmark> {
        let locator = Locator::parse(&self.url)?;
        self.fields.apply(Bookmark::new(locator))
    }
}

/// Arguments for the `get` subcommand.
#[derive(Args, Debug)]
pub struct GetArgs {
    pub url: String,

    /// Output format (text or json).
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Arguments for the `remove` subcommand.
#[derive(Args, Debug)]
pub struct RemoveArgs {
    pub url: String,
}

/// Arguments for the `replace` subcommand.
#[derive(Args, Debug)]
pub struct ReplaceArgs {
    /// URL the bookmark is currently stored under.
    pub old_url: String,

    /// URL to store it under from now on (may equal the old one).
    pub new_url: String,

    #[command(flatten)]
    pub fields: BookmarkFields,
}

/// Arguments for the `visit` subcommand.
#[derive(Args, Debug)]
pub struct VisitArgs {
    pub url: String,
}

/// Arguments for the `query` subcommand.
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Query terms, one per argument; quote a term to keep its spaces
    /// (`'created:>3 days ago'`).
    ///
    /// `action:arg` terms (`is`, `tagged`, `site`, `visit-count`,
    /// `limit`, `by`, `created`, `last-visited`, `last-modified`) run
    /// left to right. A bare word is shorthand for `tagged:word`.
    pub query: Vec<String>,

    /// Output format (text, table, or json).
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Optional server URL for delegating the query to a daemon.
    ///
    /// When set (via this flag or `MARKDIR_SERVER_URL`), the query is
    /// sent to the HTTP server instead of being run locally. Use
    /// `--no-server` to force local execution.
    #[arg(long = "server", env = "MARKDIR_SERVER_URL")]
    pub server: Option<String>,

    /// Disable use of any configured server and force a local query.
    #[arg(long = "no-server")]
    pub no_server: bool,
}

impl QueryArgs {
    /// Each argument becomes exactly one term, so shell quoting
    /// survives.
    pub fn to_request(&self) -> QueryRequest {
        QueryRequest {
            query: None,
            terms: parse_args(&self.query),
        }
    }
}

/// Arguments for the `import` subcommand.
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON file holding an array of bookmarks, or `-` for stdin.
    pub file: PathBuf,
}

impl ImportArgs {
    pub fn read_bookmarks(&self) -> Result<Vec<Bookmark>> {
        let contents = if self.file == Path::new("-") {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read bookmarks from stdin")?;
            buf
        } else {
            fs::read_to_string(&self.file)
                .with_context(|| format!("failed to read {}", self.file.display()))?
        };

        serde_json::from_str(&contents).context("failed to parse bookmark JSON array")
    }
}

pub const DEFAULT_SERVE_ADDR: &str = "127.0.0.1:7878";

/// Arguments for the `serve` subcommand.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind the HTTP server to.
    #[arg(long = "addr", default_value = DEFAULT_SERVE_ADDR)]
    pub addr: String,
}

/// CLI representation of output format.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Table,
    Json,
}

/// CLI representation of store backend kind.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendArg {
    File,
    Sqlite,
}

/// Resolve the store location and backend from global CLI flags.
pub fn store_config_from_args(cli: &Cli) -> StoreConfig {
    let backend_arg = match (&cli.backend, &cli.store) {
        (Some(kind), _) => *kind,
        (None, Some(path)) => {
            if path
                .extension()
                .and_then(|e| e.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("sqlite"))
                .unwrap_or(false)
            {
                StoreBackendArg::Sqlite
            } else {
                StoreBackendArg::File
            }
        }
        (None, None) => StoreBackendArg::File,
    };

    let backend = match backend_arg {
        StoreBackendArg::File => StoreBackendKind::File,
        StoreBackendArg::Sqlite => StoreBackendKind::Sqlite,
    };

    let path = match (&cli.store, backend_arg) {
        (Some(path), _) => path.clone(),
        (None, StoreBackendArg::File) => PathBuf::from(".markdir").join("bookmarks"),
        (None, StoreBackendArg::Sqlite) => PathBuf::from(".markdir").join("bookmarks.sqlite"),
    };

    StoreConfig { backend, path }
}
