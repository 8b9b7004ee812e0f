//! Builder for the IGDB query language (apicalypse).
//!
//! User input only ever enters a query through [`Query::search`] or
//! [`string_literal`], both of which escape it; numeric values are typed.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::helpers::time::year_bounds;

const LIST_FIELDS: &[&str] = &["name", "first_release_date", "cover.url"];
const RANKED_FIELDS: &[&str] = &[
    "name",
    "first_release_date",
    "cover.url",
    "total_rating",
    "total_rating_count",
    "hypes",
];
const DETAIL_FIELDS: &[&str] = &[
    "name",
    "summary",
    "storyline",
    "first_release_date",
    "total_rating",
    "total_rating_count",
    "genres.name",
    "platforms.name",
    "platforms.abbreviation",
    "age_ratings.category",
    "age_ratings.rating",
    "cover.url",
    "screenshots.url",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    fields: Vec<String>,
    search: Option<String>,
    filters: Vec<String>,
    sort: Option<String>,
    limit: Option<u32>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.fields.extend(fields.iter().map(|f| f.to_string()));
        self
    }

    /// Full-text search term; escaped on render.
    pub fn search(mut self, term: &str) -> Self {
        self.search = Some(term.to_owned());
        self
    }

    /// Raw filter clause, joined with `&`. Interpolated strings must come from
    /// [`string_literal`].
    pub fn filter(mut self, clause: impl Into<String>) -> Self {
        self.filters.push(clause.into());
        self
    }

    pub fn sort_desc(mut self, field: &str) -> Self {
        self.sort = Some(format!("{} desc", field));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(term) = &self.search {
            let _ = write!(out, "search {}; ", string_literal(term));
        }
        if self.fields.is_empty() {
            out.push_str("fields *;");
        } else {
            let _ = write!(out, "fields {};", self.fields.join(", "));
        }
        if !self.filters.is_empty() {
            let _ = write!(out, " where {};", self.filters.join(" & "));
        }
        if let Some(sort) = &self.sort {
            let _ = write!(out, " sort {};", sort);
        }
        if let Some(limit) = self.limit {
            let _ = write!(out, " limit {};", limit);
        }
        out
    }
}

/// Escape a value for use inside a double-quoted literal: backslashes and
/// quotes are escaped, control characters are dropped.
pub fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

pub fn string_literal(value: &str) -> String {
    format!("\"{}\"", escape_literal(value))
}

/// `GET /games`
pub fn games() -> Query {
    Query::new().fields(LIST_FIELDS).limit(10)
}

/// `POST /searchGames`. `None` when the input has no words, in which case
/// nothing should be sent upstream.
pub fn search_games(input: &str) -> Option<Query> {
    let trimmed = input.trim();
    let words: Vec<&str> = trimmed.split_whitespace().collect();
    if words.is_empty() {
        return None;
    }
    let query = Query::new()
        .search(&words.join("*"))
        .fields(LIST_FIELDS)
        .fields(&["total_rating"])
        .filter(format!("name ~ *{}*", string_literal(trimmed)))
        .limit(20);
    Some(query)
}

/// `GET /home/topDaily`
pub fn top_daily() -> Query {
    Query::new()
        .fields(RANKED_FIELDS)
        .filter("total_rating != null")
        .filter("total_rating_count > 10")
        .sort_desc("total_rating")
        .limit(10)
}

/// `GET /home/topThisYear`
pub fn top_this_year(now: DateTime<Utc>) -> Query {
    let (start, end) = year_bounds(now);
    Query::new()
        .fields(RANKED_FIELDS)
        .filter(format!("first_release_date >= {}", start))
        .filter(format!("first_release_date < {}", end))
        .filter("total_rating != null")
        .sort_desc("total_rating")
        .limit(20)
}

/// `GET /home/anticipated`
pub fn anticipated(now: DateTime<Utc>) -> Query {
    Query::new()
        .fields(RANKED_FIELDS)
        .filter(format!("first_release_date > {}", now.timestamp()))
        .filter("hypes > 0")
        .sort_desc("hypes")
        .limit(20)
}

/// `GET /game/{id}`
pub fn game_details(id: u64) -> Query {
    Query::new()
        .fields(DETAIL_FIELDS)
        .filter(format!("id = {}", id))
        .limit(1)
}
