//! Query string tokenizer.
//!
//! Turns user input such as `tagged:rust by:most-visited limit:10`
//! into a list of `QueryTerm`s:
//! - Terms are separated by whitespace; double quotes group text that
//!   contains spaces (`created:>"3 days ago"`).
//! - `action:arg` splits at the first `:`, so arguments may contain
//!   further colons.
//! - A bare word `w` is shorthand for `tagged:w`.

use crate::models::QueryTerm;

/// Tokenize a query string into terms, in input order.
pub fn parse_query(input: &str) -> Vec<QueryTerm> {
    tokenize(input)
        .iter()
        .map(|token| parse_term(token))
        .collect()
}

/// Parse already split arguments (e.g. shell words), one term each.
///
/// Unlike `parse_query`, an argument keeps its inner spaces, so
/// `created:>3 days ago` stays a single term. Blank arguments are
/// skipped.
pub fn parse_args<I, S>(args: I) -> Vec<QueryTerm>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .map(|arg| arg.as_ref().trim().to_string())
        .filter(|arg| !arg.is_empty())
        .map(|arg| parse_term(&arg))
        .collect()
}

/// Tokenize a query string, treating whitespace as separators and
/// allowing double-quoted segments to contain spaces.
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(current);
                    current = String::new();
                }
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

fn parse_term(token: &str) -> QueryTerm {
    match token.split_once(':') {
        Some((action, arg)) => QueryTerm::new(action.to_ascii_lowercase(), arg),
        None => QueryTerm::new("tagged", token),
    }
}
