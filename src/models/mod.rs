//! Shared data models for bookmarks, query terms, and store configs.
//!
//! These types form the stable JSON surface used by the on-disk
//! store, the HTTP API, and `--format=json` CLI output.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Error, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Schema version for `QueryResult` JSON payloads.
///
/// MINOR bumps are additive (new optional fields); MAJOR bumps change
/// required fields or their meaning.
pub const QUERY_RESULT_VERSION: &str = "1.0.0";

/// Normalized URL-like string identifying a bookmark.
///
/// Two bookmarks with the same locator are the same bookmark. The
/// normalization is deliberately light: surrounding whitespace is
/// trimmed, a missing scheme defaults to `http://`, and the scheme is
/// lower-cased. Everything after the scheme is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locator(String);

impl Locator {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            bail!("bookmark url must not be empty");
        }
        if trimmed.chars().any(char::is_whitespace) {
            bail!("bookmark url must not contain whitespace: '{trimmed}'");
        }

        let normalized = match trimmed.split_once("://") {
            Some((scheme, rest)) if is_scheme(scheme) => {
                format!("{}://{}", scheme.to_ascii_lowercase(), rest)
            }
            _ => format!("http://{trimmed}"),
        };

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-cased host of the locator, or `None` when it does not
    /// parse as a URL with a host.
    pub fn host(&self) -> Option<String> {
        let url = url::Url::parse(&self.0).ok()?;
        url.host_str().map(|h| h.to_ascii_lowercase())
    }
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Locator {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Locator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Locator {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Locator> for String {
    fn from(value: Locator) -> Self {
        value.0
    }
}

/// Case-normalized tag name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagName(String);

impl TagName {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            bail!("tag name must not be empty");
        }
        if trimmed.chars().any(char::is_whitespace) {
            bail!("tag name must not contain whitespace: '{trimmed}'");
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TagName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TagName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TagName> for String {
    fn from(value: TagName) -> Self {
        value.0
    }
}

/// Deduplicated set of tags attached to a bookmark.
pub type TagSet = BTreeSet<TagName>;

/// Annotation color, normalized to lower-case `#rrggbb`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(String);

impl Color {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let Some(hex) = trimmed.strip_prefix('#') else {
            bail!("color must start with '#': '{trimmed}'");
        };
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            bail!("color must be hexadecimal: '{trimmed}'");
        }

        let expanded = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect::<String>(),
            6 => hex.to_string(),
            _ => bail!("color must be #rgb or #rrggbb: '{trimmed}'"),
        };

        Ok(Self(format!("#{}", expanded.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Color {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.0
    }
}

/// A single saved bookmark.
///
/// Every optional attribute is an explicit `Option`; records written
/// by older versions may lack timestamps entirely and are backfilled
/// by the store when it is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub url: Locator,

    #[serde(default)]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(default)]
    pub tags: TagSet,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,

    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created: Option<OffsetDateTime>,

    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub modified: Option<OffsetDateTime>,

    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_visited: Option<OffsetDateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visit_count: Option<u64>,
}

impl Bookmark {
    /// A bookmark with only its locator set.
    pub fn new(url: Locator) -> Self {
        Self {
            url,
            title: String::new(),
            notes: None,
            tags: TagSet::new(),
            color: None,
            created: None,
            modified: None,
            last_visited: None,
            visit_count: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_tags<I>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = TagName>,
    {
        self.tags.extend(tags);
        self
    }

    pub fn has_tag(&self, tag: &TagName) -> bool {
        self.tags.contains(tag)
    }

    pub fn is_tagged(&self) -> bool {
        !self.tags.is_empty()
    }
}

/// A parsed `(action, argument)` unit of the query language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTerm {
    pub action: String,
    pub arg: String,
}

impl QueryTerm {
    pub fn new(action: impl Into<String>, arg: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            arg: arg.into(),
        }
    }
}

impl fmt::Display for QueryTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.action, self.arg)
    }
}

/// Which durable map realization backs the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    /// One JSON document per bookmark under a directory.
    #[default]
    File,
    /// One row per bookmark in a single SQLite database file.
    Sqlite,
}

/// Location and kind of the bookmark store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackendKind,
    /// Directory for the file backend, database file for SQLite.
    pub path: PathBuf,
}

/// Outcome of a bulk import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Records whose locator was not present before the import.
    pub added: usize,
    /// Records that overwrote an existing locator.
    pub updated: usize,
}

/// Request body for `POST /v1/query`.
///
/// `query` is tokenized first; explicit `terms` are appended after it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default)]
    pub terms: Vec<QueryTerm>,
}

/// Result of running a query over the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub version: String,
    pub terms: Vec<QueryTerm>,
    pub total: usize,
    pub bookmarks: Vec<Bookmark>,
}

/// Request body for `PUT /v1/bookmark`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceRequest {
    pub replacing: Locator,
    pub bookmark: Bookmark,
}
