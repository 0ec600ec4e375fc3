use std::cmp;

use anyhow::Result;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

use crate::models::{Bookmark, QueryResult};

/// Internal representation of a row rendered by the CLI, shared by the
/// text and table formats.
struct DisplayRow {
    url: String,
    title: String,
    tags: String,
    visits: String,
    created: String,
}

/// Render a `QueryResult` one bookmark per line:
/// `url  title  [tag, tag]`, omitting an empty title or tag list.
pub fn print_text(result: &QueryResult) -> Result<()> {
    for row in build_rows(result) {
        let mut line = row.url;
        if !row.title.is_empty() {
            line.push_str("  ");
            line.push_str(&row.title);
        }
        if !row.tags.is_empty() {
            line.push_str(&format!("  [{}]", row.tags));
        }
        println!("{line}");
    }

    Ok(())
}

/// Render a `QueryResult` as a simple table.
///
/// Columns: URL, TITLE, TAGS, VISITS, CREATED (calendar date only).
pub fn print_table(result: &QueryResult) -> Result<()> {
    let rows = build_rows(result);

    if rows.is_empty() {
        return Ok(());
    }

    const MAX_URL_WIDTH: usize = 50;
    const MAX_TITLE_WIDTH: usize = 40;
    const MAX_TAGS_WIDTH: usize = 30;

    let url_header = "URL";
    let title_header = "TITLE";
    let tags_header = "TAGS";
    let visits_header = "VISITS";
    let created_header = "CREATED";

    let max_url_len = rows.iter().map(|r| r.url.chars().count()).max().unwrap_or(0);
    let max_title_len = rows
        .iter()
        .map(|r| r.title.chars().count())
        .max()
        .unwrap_or(0);
    let max_tags_len = rows.iter().map(|r| r.tags.chars().count()).max().unwrap_or(0);
    let max_visits_len = rows.iter().map(|r| r.visits.len()).max().unwrap_or(0);

    let url_width = cmp::min(cmp::max(url_header.len(), max_url_len), MAX_URL_WIDTH);
    let title_width = cmp::min(cmp::max(title_header.len(), max_title_len), MAX_TITLE_WIDTH);
    let tags_width = cmp::min(cmp::max(tags_header.len(), max_tags_len), MAX_TAGS_WIDTH);
    let visits_width = cmp::max(visits_header.len(), max_visits_len);

    println!(
        "{:<url_width$} {:<title_width$} {:<tags_width$} {:>visits_width$} {}",
        url_header, title_header, tags_header, visits_header, created_header
    );

    for row in rows {
        let url = truncate(&row.url, url_width);
        let title = truncate(&row.title, title_width);
        let tags = truncate(&row.tags, tags_width);

        println!(
            "{:<url_width$} {:<title_width$} {:<tags_width$} {:>visits_width$} {}",
            url, title, tags, row.visits, row.created
        );
    }

    Ok(())
}

/// Render a single bookmark as `field : value` lines.
pub fn print_bookmark(bookmark: &Bookmark) -> Result<()> {
    println!("url          : {}", bookmark.url);
    if !bookmark.title.is_empty() {
        println!("title        : {}", bookmark.title);
    }
    if bookmark.is_tagged() {
        println!("tags         : {}", join_tags(bookmark));
    }
    if let Some(color) = &bookmark.color {
        println!("color        : {color}");
    }
    if let Some(notes) = &bookmark.notes {
        println!("notes        : {notes}");
    }
    if let Some(created) = bookmark.created {
        println!("created      : {}", timestamp(created)?);
    }
    if let Some(modified) = bookmark.modified {
        println!("modified     : {}", timestamp(modified)?);
    }
    if let Some(last_visited) = bookmark.last_visited {
        println!("last_visited : {}", timestamp(last_visited)?);
    }
    println!("visits       : {}", bookmark.visit_count.unwrap_or(0));

    Ok(())
}

fn timestamp(ts: OffsetDateTime) -> Result<String> {
    Ok(ts.format(&Rfc3339)?)
}

fn join_tags(bookmark: &Bookmark) -> String {
    bookmark
        .tags
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn build_rows(result: &QueryResult) -> Vec<DisplayRow> {
    result
        .bookmarks
        .iter()
        .map(|b| DisplayRow {
            url: b.url.to_string(),
            title: b.title.clone(),
            tags: join_tags(b),
            visits: b.visit_count.map(|c| c.to_string()).unwrap_or_default(),
            created: b
                .created
                .map(|ts| ts.to_offset(UtcOffset::UTC).date().to_string())
                .unwrap_or_default(),
        })
        .collect()
}

fn truncate(s: &str, max_width: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_width {
        s.to_string()
    } else if max_width <= 1 {
        "…".to_string()
    } else {
        s.chars()
            .take(max_width.saturating_sub(1))
            .collect::<String>()
            + "…"
    }
}
