//! Sort orders available to the `by` action.
//!
//! The "most-*" keys each have a "least-*" twin that is the exact
//! reversal of the same base comparator. Records missing the sorted
//! field come last in the "most-*" orders and therefore first in the
//! "least-*" ones.

use std::cmp::Ordering;

use crate::models::Bookmark;
use crate::query::QueryError;

type BookmarkOrder = fn(&Bookmark, &Bookmark) -> Ordering;

fn most_recently_created_first(a: &Bookmark, b: &Bookmark) -> Ordering {
    b.created.cmp(&a.created)
}

fn most_recently_visited_first(a: &Bookmark, b: &Bookmark) -> Ordering {
    b.last_visited.cmp(&a.last_visited)
}

fn most_recently_modified_first(a: &Bookmark, b: &Bookmark) -> Ordering {
    b.modified.cmp(&a.modified)
}

fn most_visited_first(a: &Bookmark, b: &Bookmark) -> Ordering {
    b.visit_count.cmp(&a.visit_count)
}

fn by_title(a: &Bookmark, b: &Bookmark) -> Ordering {
    a.title.cmp(&b.title)
}

fn by_url(a: &Bookmark, b: &Bookmark) -> Ordering {
    a.url.cmp(&b.url)
}

const SORT_KEYS: [(&str, BookmarkOrder, bool); 10] = [
    ("most-recently-created", most_recently_created_first, false),
    ("least-recently-created", most_recently_created_first, true),
    ("most-recently-visited", most_recently_visited_first, false),
    ("least-recently-visited", most_recently_visited_first, true),
    ("most-recently-modified", most_recently_modified_first, false),
    ("least-recently-modified", most_recently_modified_first, true),
    ("most-visited", most_visited_first, false),
    ("least-visited", most_visited_first, true),
    ("title", by_title, false),
    ("url", by_url, false),
];

/// A resolved sort key.
#[derive(Clone, Copy)]
pub struct SortOrder {
    order: BookmarkOrder,
    reversed: bool,
}

impl SortOrder {
    /// Look up a sort key by name (already lower-cased by the caller).
    pub fn parse(key: &str) -> Result<Self, QueryError> {
        SORT_KEYS
            .iter()
            .find(|(name, _, _)| *name == key)
            .map(|&(_, order, reversed)| SortOrder { order, reversed })
            .ok_or_else(|| QueryError::InvalidSortOrder(key.to_string()))
    }

    pub fn compare(&self, a: &Bookmark, b: &Bookmark) -> Ordering {
        let ordering = (self.order)(a, b);
        if self.reversed {
            ordering.reverse()
        } else {
            ordering
        }
    }

    /// Stable sort: ties keep their relative input order.
    pub fn sort(&self, records: &mut [Bookmark]) {
        records.sort_by(|a, b| self.compare(a, b));
    }
}
