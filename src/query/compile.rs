//! Term compiler: turns `QueryTerm`s into pipeline stages.
//!
//! Actions are looked up in a registration map from action name to
//! stage factory, so new actions and aliases can be added without
//! touching the dispatch code. Every factory validates its argument up
//! front; a term either compiles into a pure stage or fails, and a
//! query with any failing term never runs.

use std::collections::HashMap;
use std::sync::Arc;

use time::{Date, OffsetDateTime, UtcOffset};

use crate::models::{Bookmark, QueryTerm, TagName};
use crate::query::compare::split_comparison;
use crate::query::dates::parse_date_expression;
use crate::query::sort::SortOrder;

/// Query compilation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("invalid query action '{0}'")]
    InvalidAction(String),
    #[error("invalid argument for 'is' query: '{0}'")]
    InvalidIsArgument(String),
    #[error("invalid {action} param '{arg}'")]
    InvalidParam { action: String, arg: String },
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("invalid tag name '{0}'")]
    InvalidTag(String),
    #[error("unable to convert '{0}' to a date")]
    InvalidDate(String),
    #[error("invalid sort order '{0}'")]
    InvalidSortOrder(String),
}

/// A pure transformation of a record sequence.
pub type Stage = Arc<dyn Fn(Vec<Bookmark>) -> Vec<Bookmark> + Send + Sync>;

/// Builds a stage for one term.
pub type StageFactory = fn(&Compiler, &QueryTerm) -> Result<Stage, QueryError>;

/// Compiled query: stages applied in term order.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Run every stage, each on the previous stage's output.
    pub fn apply(&self, records: Vec<Bookmark>) -> Vec<Bookmark> {
        self.stages
            .iter()
            .fold(records, |records, stage| stage(records))
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Registry of query actions.
#[derive(Clone)]
pub struct Compiler {
    actions: HashMap<String, StageFactory>,
    today: Date,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    /// The standard action set, with relative dates resolved against
    /// the current UTC date.
    pub fn new() -> Self {
        Self::with_today(OffsetDateTime::now_utc().date())
    }

    /// The standard action set with an explicit "today".
    pub fn with_today(today: Date) -> Self {
        let mut compiler = Self {
            actions: HashMap::new(),
            today,
        };

        compiler
            .register("is", is_stage)
            .register("tagged", tagged_stage)
            .register("site", site_stage)
            .register("visit-count", visit_count_stage)
            .register("limit", limit_stage)
            .register("by", by_stage)
            .register("created", created_stage)
            .register("last-visited", last_visited_stage)
            .register("last-modified", last_modified_stage);

        compiler
    }

    pub fn today(&self) -> Date {
        self.today
    }

    /// Register (or override) the factory for an action name.
    pub fn register(&mut self, action: &str, factory: StageFactory) -> &mut Self {
        self.actions.insert(action.to_string(), factory);
        self
    }

    /// Make `alias` behave exactly like the already registered
    /// `target`. Returns false when `target` is unknown.
    pub fn alias(&mut self, alias: &str, target: &str) -> bool {
        match self.actions.get(target).copied() {
            Some(factory) => {
                self.actions.insert(alias.to_string(), factory);
                true
            }
            None => false,
        }
    }

    /// Compile a single term.
    pub fn compile_term(&self, term: &QueryTerm) -> Result<Stage, QueryError> {
        let factory = self
            .actions
            .get(term.action.as_str())
            .ok_or_else(|| QueryError::InvalidAction(term.action.clone()))?;
        factory(self, term)
    }

    /// Compile every term, failing on the first one that does not
    /// compile.
    pub fn compile(&self, terms: &[QueryTerm]) -> Result<Pipeline, QueryError> {
        let stages = terms
            .iter()
            .map(|term| self.compile_term(term))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Pipeline { stages })
    }
}

fn filter<P>(predicate: P) -> Stage
where
    P: Fn(&Bookmark) -> bool + Send + Sync + 'static,
{
    Arc::new(move |records: Vec<Bookmark>| records.into_iter().filter(|b| predicate(b)).collect())
}

fn is_stage(_: &Compiler, term: &QueryTerm) -> Result<Stage, QueryError> {
    match term.arg.to_lowercase().as_str() {
        "untagged" => Ok(filter(|b| !b.is_tagged())),
        "tagged" => Ok(filter(Bookmark::is_tagged)),
        other => Err(QueryError::InvalidIsArgument(other.to_string())),
    }
}

fn tagged_stage(_: &Compiler, term: &QueryTerm) -> Result<Stage, QueryError> {
    let tag = TagName::parse(&term.arg).map_err(|_| QueryError::InvalidTag(term.arg.clone()))?;
    Ok(filter(move |b| b.has_tag(&tag)))
}

/// Host equals the site or is a subdomain of it. Records whose
/// locator has no parseable host never match.
fn site_stage(_: &Compiler, term: &QueryTerm) -> Result<Stage, QueryError> {
    let site = term.arg.to_lowercase();
    let suffix = format!(".{site}");
    Ok(filter(move |b| match b.url.host() {
        Some(host) => host == site || host.ends_with(&suffix),
        None => false,
    }))
}

fn visit_count_stage(_: &Compiler, term: &QueryTerm) -> Result<Stage, QueryError> {
    let (comparison, operand) = split_comparison(&term.arg).ok_or_else(|| invalid_param(term))?;
    let wanted: u64 = operand
        .trim()
        .parse()
        .map_err(|_| QueryError::InvalidNumber(operand.to_string()))?;
    Ok(filter(move |b| {
        comparison.test(b.visit_count.as_ref(), Some(&wanted))
    }))
}

fn limit_stage(_: &Compiler, term: &QueryTerm) -> Result<Stage, QueryError> {
    let limit: usize = term
        .arg
        .trim()
        .parse()
        .map_err(|_| QueryError::InvalidNumber(term.arg.clone()))?;
    Ok(Arc::new(move |mut records: Vec<Bookmark>| {
        records.truncate(limit);
        records
    }))
}

fn by_stage(_: &Compiler, term: &QueryTerm) -> Result<Stage, QueryError> {
    let order = SortOrder::parse(&term.arg.to_lowercase())?;
    Ok(Arc::new(move |mut records: Vec<Bookmark>| {
        order.sort(&mut records);
        records
    }))
}

fn created_stage(compiler: &Compiler, term: &QueryTerm) -> Result<Stage, QueryError> {
    date_stage(compiler, term, |b| b.created)
}

fn last_visited_stage(compiler: &Compiler, term: &QueryTerm) -> Result<Stage, QueryError> {
    date_stage(compiler, term, |b| b.last_visited)
}

fn last_modified_stage(compiler: &Compiler, term: &QueryTerm) -> Result<Stage, QueryError> {
    date_stage(compiler, term, |b| b.modified)
}

/// Compare the UTC calendar date of a timestamp (time of day dropped)
/// against a parsed date expression.
fn date_stage(
    compiler: &Compiler,
    term: &QueryTerm,
    field: fn(&Bookmark) -> Option<OffsetDateTime>,
) -> Result<Stage, QueryError> {
    let (comparison, text) = split_comparison(&term.arg).ok_or_else(|| invalid_param(term))?;
    let wanted = parse_date_expression(text, compiler.today())
        .ok_or_else(|| QueryError::InvalidDate(text.to_string()))?;
    Ok(filter(move |b| {
        let day = field(b).map(|ts| ts.to_offset(UtcOffset::UTC).date());
        comparison.test(day.as_ref(), Some(&wanted))
    }))
}

fn invalid_param(term: &QueryTerm) -> QueryError {
    QueryError::InvalidParam {
        action: term.action.clone(),
        arg: term.arg.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Locator;
    use time::macros::{date, datetime};

    fn compiler() -> Compiler {
        Compiler::with_today(date!(2024 - 06 - 15))
    }

    fn bookmark(url: &str) -> Bookmark {
        Bookmark::new(Locator::parse(url).expect("locator"))
    }

    fn tagged(url: &str, tags: &[&str]) -> Bookmark {
        bookmark(url).with_tags(tags.iter().map(|t| TagName::parse(t).expect("tag")))
    }

    fn run(terms: &[(&str, &str)], records: Vec<Bookmark>) -> Vec<Bookmark> {
        let terms: Vec<_> = terms.iter().map(|(a, v)| QueryTerm::new(*a, *v)).collect();
        compiler().compile(&terms).expect("compile").apply(records)
    }

    fn urls(records: &[Bookmark]) -> Vec<&str> {
        records.iter().map(|b| b.url.as_str()).collect()
    }

    fn compile_error(action: &str, arg: &str) -> QueryError {
        match compiler().compile(&[QueryTerm::new(action, arg)]) {
            Ok(_) => panic!("expected {action}:{arg} to fail"),
            Err(err) => err,
        }
    }

    #[test]
    fn is_filters_on_tag_presence() {
        let records = vec![
            tagged("http://a.com", &[]),
            tagged("http://b.com", &["rust"]),
        ];

        assert_eq!(
            urls(&run(&[("is", "untagged")], records.clone())),
            ["http://a.com"]
        );
        assert_eq!(urls(&run(&[("is", "TAGGED")], records)), ["http://b.com"]);
        assert_eq!(
            compile_error("is", "starred").to_string(),
            "invalid argument for 'is' query: 'starred'"
        );
    }

    #[test]
    fn tagged_matches_case_insensitively() {
        let records = vec![
            tagged("http://a.com", &["rust", "news"]),
            tagged("http://b.com", &["go"]),
        ];
        assert_eq!(urls(&run(&[("tagged", "Rust")], records)), ["http://a.com"]);
    }

    #[test]
    fn site_matches_host_and_subdomains_only() {
        let records = vec![
            bookmark("http://example.com/a"),
            bookmark("https://docs.Example.com/b"),
            bookmark("http://notexample.com"),
            bookmark("http://[broken"),
        ];

        assert_eq!(
            urls(&run(&[("site", "EXAMPLE.com")], records)),
            ["http://example.com/a", "https://docs.Example.com/b"]
        );
    }

    #[test]
    fn visit_count_never_matches_absent_counts() {
        let mut five = bookmark("http://five.com");
        five.visit_count = Some(5);
        let mut ten = bookmark("http://ten.com");
        ten.visit_count = Some(10);
        let none = bookmark("http://none.com");
        let records = vec![five, ten, none];

        assert_eq!(
            urls(&run(&[("visit-count", ">5")], records.clone())),
            ["http://ten.com"]
        );
        assert_eq!(
            urls(&run(&[("visit-count", "<=5")], records.clone())),
            ["http://five.com"]
        );
        for op in ["", "=", "==", "<", "<=", ">", ">="] {
            let arg = format!("{op}0");
            let matched = run(&[("visit-count", arg.as_str())], records.clone());
            assert!(!urls(&matched).contains(&"http://none.com"), "op {op}");
        }
    }

    #[test]
    fn visit_count_rejects_bad_operands() {
        assert_eq!(
            compile_error("visit-count", "!=5"),
            QueryError::InvalidNumber("!=5".to_string())
        );
        assert_eq!(
            compile_error("visit-count", ""),
            QueryError::InvalidParam {
                action: "visit-count".to_string(),
                arg: String::new()
            }
        );
    }

    #[test]
    fn limit_truncates_in_order() {
        let records = vec![
            bookmark("http://a.com"),
            bookmark("http://b.com"),
            bookmark("http://c.com"),
        ];
        assert_eq!(
            urls(&run(&[("limit", "2")], records.clone())),
            ["http://a.com", "http://b.com"]
        );
        assert_eq!(run(&[("limit", "10")], records).len(), 3);
        assert_eq!(
            compile_error("limit", "-1"),
            QueryError::InvalidNumber("-1".to_string())
        );
    }

    #[test]
    fn by_most_visited_then_limit() {
        let records: Vec<_> = [1, 5, 10]
            .iter()
            .map(|&count| {
                let mut b = bookmark(&format!("http://v{count}.com"));
                b.visit_count = Some(count);
                b
            })
            .collect();

        let result = run(&[("by", "most-visited"), ("limit", "2")], records);
        assert_eq!(urls(&result), ["http://v10.com", "http://v5.com"]);
        assert_eq!(
            compile_error("by", "random").to_string(),
            "invalid sort order 'random'"
        );
    }

    #[test]
    fn created_compares_calendar_dates() {
        let mut old = bookmark("http://old.com");
        old.created = Some(datetime!(2020-01-01 10:00 UTC));
        let mut new = bookmark("http://new.com");
        new.created = Some(datetime!(2021-06-15 23:59 UTC));
        let undated = bookmark("http://undated.com");
        let records = vec![old, new, undated];

        assert_eq!(
            urls(&run(&[("created", ">=2021/01/01")], records.clone())),
            ["http://new.com"]
        );
        assert_eq!(
            urls(&run(&[("created", "2021/06/15")], records.clone())),
            ["http://new.com"]
        );
        assert_eq!(
            urls(&run(&[("created", "<2021/06/15")], records)),
            ["http://old.com"]
        );
    }

    #[test]
    fn date_filters_use_the_utc_calendar_day() {
        let mut utc = bookmark("http://utc.com");
        utc.created = Some(datetime!(2020-12-31 20:00 UTC));
        let mut plus5 = bookmark("http://plus5.com");
        plus5.created = Some(datetime!(2021-01-01 01:00 +05:00));
        assert_eq!(utc.created, plus5.created);
        let records = vec![utc, plus5];

        assert!(run(&[("created", "2021/01/01")], records.clone()).is_empty());
        assert_eq!(
            urls(&run(&[("created", "2020/12/31")], records)),
            ["http://utc.com", "http://plus5.com"]
        );
    }

    #[test]
    fn relative_dates_use_the_compiler_today() {
        let mut recent = bookmark("http://recent.com");
        recent.last_visited = Some(datetime!(2024-06-14 08:00 UTC));
        let mut stale = bookmark("http://stale.com");
        stale.last_visited = Some(datetime!(2024-01-02 08:00 UTC));
        let records = vec![recent, stale];

        assert_eq!(
            urls(&run(&[("last-visited", ">=1-week-ago")], records.clone())),
            ["http://recent.com"]
        );
        assert_eq!(
            urls(&run(&[("last-visited", "yesterday")], records)),
            ["http://recent.com"]
        );
    }

    #[test]
    fn unparseable_dates_fail_compilation() {
        assert_eq!(
            compile_error("last-modified", ">=soonish").to_string(),
            "unable to convert 'soonish' to a date"
        );
    }

    #[test]
    fn unknown_actions_fail_and_nothing_runs() {
        let terms = vec![QueryTerm::new("limit", "1"), QueryTerm::new("starred", "yes")];
        let err = match compiler().compile(&terms) {
            Ok(_) => panic!("expected failure"),
            Err(err) => err,
        };
        assert_eq!(err.to_string(), "invalid query action 'starred'");
    }

    #[test]
    fn aliases_share_the_target_factory() {
        let mut compiler = compiler();
        assert!(compiler.alias("tag", "tagged"));
        assert!(!compiler.alias("nope", "missing"));

        let pipeline = compiler
            .compile(&[QueryTerm::new("tag", "rust")])
            .expect("compile alias");
        let result = pipeline.apply(vec![
            tagged("http://a.com", &["rust"]),
            tagged("http://b.com", &[]),
        ]);
        assert_eq!(urls(&result), ["http://a.com"]);
    }

    #[test]
    fn compiling_twice_gives_identical_results() {
        let terms = vec![
            QueryTerm::new("is", "tagged"),
            QueryTerm::new("by", "title"),
            QueryTerm::new("limit", "2"),
        ];
        let records = vec![
            tagged("http://c.com", &["x"]).with_title("c"),
            tagged("http://a.com", &["x"]).with_title("a"),
            tagged("http://b.com", &[]).with_title("b"),
            tagged("http://d.com", &["y"]).with_title("d"),
        ];

        let first = compiler().compile(&terms).expect("compile");
        let second = compiler().compile(&terms).expect("compile");
        assert_eq!(first.len(), 3);
        assert_eq!(first.apply(records.clone()), second.apply(records));
    }

    #[test]
    fn empty_pipeline_is_identity() {
        let pipeline = compiler().compile(&[]).expect("compile");
        assert!(pipeline.is_empty());
        let records = vec![bookmark("http://b.com"), bookmark("http://a.com")];
        assert_eq!(pipeline.apply(records.clone()), records);
    }
}
