//! Token Grammar
//!
//! Recognises `${...}` token expressions in arbitrary text.
//!
//! ## Syntax
//!
//! - `${name}` - value semantics, the strategy receives no argument array
//! - `${name()}` - function semantics with zero arguments
//! - `${name(`a`, `b`)}` - function semantics, back-tick quoted arguments
//! - `${name.path.to.value}` - lookup key `name`, then a logical property path
//!
//! Whitespace is allowed inside the braces and around the parentheses.
//! Token ids are 1..=1024 characters from `[A-Za-z0-9_.]` and must not start
//! with a digit. Inside an argument `\'` stands for a literal back-tick.
//! Expressions do not nest: a `${...}` inside an argument is plain argument text.

use regex::{Captures, Regex};
use std::ops::Range;
use std::sync::LazyLock;

/// Maximum length of a token id.
pub const MAX_TOKEN_ID_LEN: usize = 1024;

/// `${ id ( args ) }` with the argument list optional.
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\$\{\s*(?P<id>[A-Za-z_.][A-Za-z0-9_.]{0,1023})\s*(?P<call>\(\s*(?P<args>`(?:\\'|[^`])*`(?:\s*,\s*`(?:\\'|[^`])*`)*)?\s*\))?\s*\}",
    )
    .unwrap()
});

/// A single back-tick quoted argument.
static ARG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`((?:\\'|[^`])*)`").unwrap());

/// One `${...}` occurrence found in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenExpression<'a> {
    /// The full matched text, `${` through `}`.
    pub matched: &'a str,
    /// Byte range of `matched` in the input.
    pub range: Range<usize>,
    /// Raw dotted token id.
    pub token_id: &'a str,
    /// `None` without parentheses, otherwise the unescaped arguments.
    pub args: Option<Vec<String>>,
}

impl<'a> TokenExpression<'a> {
    fn from_captures(caps: &Captures<'a>) -> Option<Self> {
        let whole = caps.get(0)?;
        let token_id = caps.name("id")?.as_str();
        let args = caps
            .name("call")
            .map(|_| caps.name("args").map(|a| parse_args(a.as_str())).unwrap_or_default());

        Some(Self {
            matched: whole.as_str(),
            range: whole.range(),
            token_id,
            args,
        })
    }

    /// First dot-separated segment of the token id.
    ///
    /// Empty when the id starts with a dot.
    pub fn lookup_key(&self) -> &'a str {
        self.token_id.split('.').next().unwrap_or_default()
    }

    /// Remaining segments after the lookup key.
    pub fn property_path(&self) -> Vec<&'a str> {
        self.token_id.split('.').skip(1).collect()
    }

    /// True when the expression used `(...)`.
    pub fn is_call(&self) -> bool {
        self.args.is_some()
    }
}

/// Scan `input` left to right for non-overlapping token expressions.
pub fn scan(input: &str) -> impl Iterator<Item = TokenExpression<'_>> {
    TOKEN_RE
        .captures_iter(input)
        .filter_map(|caps| TokenExpression::from_captures(&caps))
}

/// Check whether `input` holds at least one token expression.
pub fn contains_tokens(input: &str) -> bool {
    TOKEN_RE.is_match(input)
}

/// Split a raw argument list into unescaped argument values.
pub fn parse_args(raw: &str) -> Vec<String> {
    ARG_RE
        .captures_iter(raw)
        .map(|cap| unescape(&cap[1]))
        .collect()
}

fn unescape(arg: &str) -> String {
    arg.replace("\\'", "`")
}
