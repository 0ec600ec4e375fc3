//! Comparison operators used by `visit-count` and the date actions.

use std::cmp::Ordering;

/// A comparison between a record's field and a query argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Recognized operator prefixes, in matching order. `==` must be tried
/// before `=`, and `<=`/`>=` before `<`/`>`.
const OPERATORS: [(&str, Comparison); 6] = [
    ("==", Comparison::Eq),
    ("=", Comparison::Eq),
    ("<=", Comparison::Le),
    ("<", Comparison::Lt),
    (">=", Comparison::Ge),
    (">", Comparison::Gt),
];

impl Comparison {
    /// `field OP arg`, false whenever either side is absent.
    pub fn test<T: Ord + ?Sized>(self, field: Option<&T>, arg: Option<&T>) -> bool {
        let (Some(field), Some(arg)) = (field, arg) else {
            return false;
        };

        let ordering = field.cmp(arg);
        match self {
            Comparison::Eq => ordering == Ordering::Equal,
            Comparison::Lt => ordering == Ordering::Less,
            Comparison::Le => ordering != Ordering::Greater,
            Comparison::Gt => ordering == Ordering::Greater,
            Comparison::Ge => ordering != Ordering::Less,
        }
    }
}

/// Split an argument into an optional leading operator and the
/// remaining operand.
///
/// A missing operator means equality. The operand must be non-empty;
/// when an operator would consume the whole input, the input is taken
/// as a bare operand instead (so `"=="` yields `(Eq, "=")`). Returns
/// `None` only for empty input.
pub fn split_comparison(input: &str) -> Option<(Comparison, &str)> {
    for (operator, comparison) in OPERATORS {
        if let Some(rest) = input.strip_prefix(operator) {
            if !rest.is_empty() {
                return Some((comparison, rest));
            }
        }
    }

    if input.is_empty() {
        None
    } else {
        Some((Comparison::Eq, input))
    }
}
