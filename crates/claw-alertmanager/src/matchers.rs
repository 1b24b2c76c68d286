//! Label matchers and the filter-matching engine.
//!
//! A [`Matcher`] is a single `name <op> value` predicate. Filters made of
//! several matchers are evaluated with [`matches_filter_labels`], which adds
//! the empty-value rule used by the query endpoints: an empty `=`/`=~`
//! matcher is satisfied by an absent label and an empty `!=`/`!~` matcher is
//! satisfied by a present one.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AlertmanagerError, Result};
use crate::labels::LabelSet;

/// The comparison a matcher performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchType {
    /// Literal equality (`=`).
    Equal,
    /// Literal inequality (`!=`).
    NotEqual,
    /// Anchored regex match (`=~`).
    Regexp,
    /// Negated anchored regex match (`!~`).
    NotRegexp,
}

impl MatchType {
    /// Returns the operator symbol.
    #[must_use]
    pub const fn as_symbol(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::Regexp => "=~",
            Self::NotRegexp => "!~",
        }
    }

    /// True for `!=` and `!~`.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        matches!(self, Self::NotEqual | Self::NotRegexp)
    }

    /// True for `=~` and `!~`.
    #[must_use]
    pub const fn is_regex(&self) -> bool {
        matches!(self, Self::Regexp | Self::NotRegexp)
    }

    const fn from_flags(is_regex: bool, is_equal: bool) -> Self {
        match (is_regex, is_equal) {
            (false, true) => Self::Equal,
            (false, false) => Self::NotEqual,
            (true, true) => Self::Regexp,
            (true, false) => Self::NotRegexp,
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_symbol())
    }
}

/// A single label predicate. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "MatcherWire", into = "MatcherWire")]
pub struct Matcher {
    name: String,
    value: String,
    match_type: MatchType,
    regex: Option<Regex>,
}

impl Matcher {
    /// Builds a matcher, compiling `value` as an anchored pattern for regex types.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMatcher` if the regex does not compile.
    pub fn new(match_type: MatchType, name: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let value = value.into();

        let regex = if match_type.is_regex() {
            let anchored = format!("^(?:{value})$");
            Some(Regex::new(&anchored).map_err(|e| AlertmanagerError::InvalidMatcher {
                reason: format!("{name}{match_type}{value:?}: {e}"),
            })?)
        } else {
            None
        };

        Ok(Self {
            name,
            value,
            match_type,
            regex,
        })
    }

    /// Shorthand for an `=` matcher, which cannot fail.
    #[must_use]
    pub fn equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            match_type: MatchType::Equal,
            regex: None,
        }
    }

    /// The label name this matcher inspects.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The literal value or regex source.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The comparison performed.
    #[must_use]
    pub const fn match_type(&self) -> MatchType {
        self.match_type
    }

    /// Evaluates the predicate against a label value.
    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        match (self.match_type, &self.regex) {
            (MatchType::Equal, _) => value == self.value,
            (MatchType::NotEqual, _) => value != self.value,
            (MatchType::Regexp, Some(re)) => re.is_match(value),
            (MatchType::NotRegexp, Some(re)) => !re.is_match(value),
            (MatchType::Regexp | MatchType::NotRegexp, None) => false,
        }
    }

    /// Evaluates the predicate against a label set, treating an absent label
    /// as the empty string.
    #[must_use]
    pub fn matches_labels(&self, labels: &LabelSet) -> bool {
        self.matches(labels.get(&self.name).map_or("", String::as_str))
    }
}

impl PartialEq for Matcher {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value == other.value && self.match_type == other.match_type
    }
}

impl Eq for Matcher {}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}\"{}\"", self.name, self.match_type, escape(&self.value))
    }
}

/// The v1 API JSON form of a matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatcherWire {
    name: String,
    value: String,
    #[serde(default)]
    is_regex: bool,
    #[serde(default = "default_true")]
    is_equal: bool,
}

const fn default_true() -> bool {
    true
}

impl TryFrom<MatcherWire> for Matcher {
    type Error = AlertmanagerError;

    fn try_from(wire: MatcherWire) -> Result<Self> {
        Self::new(MatchType::from_flags(wire.is_regex, wire.is_equal), wire.name, wire.value)
    }
}

impl From<Matcher> for MatcherWire {
    fn from(m: Matcher) -> Self {
        Self {
            is_regex: m.match_type.is_regex(),
            is_equal: !m.match_type.is_negative(),
            name: m.name,
            value: m.value,
        }
    }
}

/// Evaluates a filter against a label set.
///
/// Every matcher must be satisfied; an empty filter always matches.
#[must_use]
pub fn matches_filter_labels(matchers: &[Matcher], labels: &LabelSet) -> bool {
    matchers.iter().all(|m| {
        let value = labels.get(m.name());
        if m.value().is_empty() {
            // "must equal nothing" holds for absent labels,
            // "must not equal nothing" holds for present ones.
            match (m.match_type().is_negative(), value.is_some()) {
                (false, false) | (true, true) => return true,
                _ => {}
            }
        }
        m.matches(value.map_or("", String::as_str))
    })
}

static MATCHER_EXPR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([a-zA-Z_:][a-zA-Z0-9_:]*)\s*(=~|!~|!=|=)\s*(.*?)\s*$")
        .unwrap_or_else(|_| unreachable!("static regex"))
});

/// Parses a filter expression such as `{alertname="X",severity=~"crit.*"}`.
///
/// Surrounding braces are optional, values may be quoted, and a trailing
/// comma is tolerated.
///
/// # Errors
///
/// Returns `InvalidMatcher` for malformed expressions or invalid regexes.
pub fn parse_matchers(input: &str) -> Result<Vec<Matcher>> {
    let trimmed = input.trim();
    let inner = match (trimmed.starts_with('{'), trimmed.ends_with('}')) {
        (true, true) if trimmed.len() >= 2 => &trimmed[1..trimmed.len() - 1],
        (false, false) => trimmed,
        _ => {
            return Err(AlertmanagerError::InvalidMatcher {
                reason: format!("unbalanced braces in {input:?}"),
            });
        }
    };

    let mut matchers = Vec::new();
    for part in split_outside_quotes(inner)? {
        if part.trim().is_empty() {
            continue;
        }
        matchers.push(parse_matcher(&part)?);
    }
    Ok(matchers)
}

/// Parses a single `name<op>value` expression.
///
/// # Errors
///
/// Returns `InvalidMatcher` if the expression is malformed.
pub fn parse_matcher(expr: &str) -> Result<Matcher> {
    let caps = MATCHER_EXPR
        .captures(expr)
        .ok_or_else(|| AlertmanagerError::InvalidMatcher {
            reason: format!("bad matcher format: {expr}"),
        })?;

    let name = &caps[1];
    let match_type = match &caps[2] {
        "=" => MatchType::Equal,
        "!=" => MatchType::NotEqual,
        "=~" => MatchType::Regexp,
        _ => MatchType::NotRegexp,
    };
    let raw = &caps[3];

    let value = if let Some(quoted) = raw.strip_prefix('"') {
        let body = quoted
            .strip_suffix('"')
            .ok_or_else(|| AlertmanagerError::InvalidMatcher {
                reason: format!("unterminated quote in {expr}"),
            })?;
        unescape(body)
    } else if raw.contains('"') {
        return Err(AlertmanagerError::InvalidMatcher {
            reason: format!("stray quote in {expr}"),
        });
    } else {
        raw.to_string()
    };

    Matcher::new(match_type, name, value)
}

fn split_outside_quotes(input: &str) -> Result<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in input.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                current.push(c);
                in_quotes = !in_quotes;
            }
            ',' if !in_quotes => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    if in_quotes {
        return Err(AlertmanagerError::InvalidMatcher {
            reason: format!("unterminated quote in {input:?}"),
        });
    }
    parts.push(current);
    Ok(parts)
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn escape(s: &str) -> String {
    s.replace('\\', r"\\").replace('"', "\\\"").replace('\n', r"\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn labels(pairs: &[(&str, &str)]) -> LabelSet {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    mod matcher_tests {
        use super::*;

        #[test]
        fn regex_is_anchored() {
            let m = Matcher::new(MatchType::Regexp, "job", "api").unwrap();
            assert!(m.matches("api"));
            assert!(!m.matches("api-server"));
            assert!(!m.matches("my-api"));
        }

        #[test]
        fn regex_alternation_is_anchored_as_a_group() {
            let m = Matcher::new(MatchType::Regexp, "job", "a|b").unwrap();
            assert!(m.matches("a"));
            assert!(m.matches("b"));
            assert!(!m.matches("ab"));
        }

        #[test]
        fn invalid_regex_fails() {
            let err = Matcher::new(MatchType::Regexp, "job", "(").unwrap_err();
            assert!(matches!(err, AlertmanagerError::InvalidMatcher { .. }));
        }

        #[test]
        fn not_regexp_negates() {
            let m = Matcher::new(MatchType::NotRegexp, "env", "prod|staging").unwrap();
            assert!(!m.matches("prod"));
            assert!(m.matches("dev"));
        }

        #[test]
        fn matches_labels_treats_absent_as_empty() {
            let m = Matcher::equal("team", "");
            assert!(m.matches_labels(&labels(&[("other", "x")])));
        }

        #[test]
        fn display() {
            let m = Matcher::new(MatchType::NotRegexp, "job", "a\"b").unwrap();
            assert_eq!(m.to_string(), r#"job!~"a\"b""#);
        }

        #[test]
        fn json_wire_format() {
            let m = Matcher::new(MatchType::NotRegexp, "job", "api.*").unwrap();
            let json = serde_json::to_value(&m).unwrap();
            assert_eq!(
                json,
                serde_json::json!({"name": "job", "value": "api.*", "isRegex": true, "isEqual": false})
            );
        }

        #[test]
        fn json_is_equal_defaults_to_true() {
            let m: Matcher = serde_json::from_str(r#"{"name":"job","value":"api","isRegex":false}"#).unwrap();
            assert_eq!(m.match_type(), MatchType::Equal);
        }

        #[test]
        fn json_rejects_invalid_regex() {
            let res: serde_json::Result<Matcher> =
                serde_json::from_str(r#"{"name":"job","value":"(","isRegex":true}"#);
            assert!(res.is_err());
        }
    }

    mod filter_tests {
        use super::*;
        use test_case::test_case;

        // (type, pattern, label value or None when absent, expected)
        #[test_case(MatchType::Equal, "", None, true ; "equal empty absent")]
        #[test_case(MatchType::Equal, "", Some("x"), false ; "equal empty present")]
        #[test_case(MatchType::Equal, "x", None, false ; "equal value absent")]
        #[test_case(MatchType::Equal, "x", Some("x"), true ; "equal value same")]
        #[test_case(MatchType::Equal, "x", Some("y"), false ; "equal value different")]
        #[test_case(MatchType::Regexp, "", None, true ; "regexp empty absent")]
        #[test_case(MatchType::Regexp, "", Some("x"), false ; "regexp empty present")]
        #[test_case(MatchType::Regexp, "x.*", None, false ; "regexp value absent")]
        #[test_case(MatchType::Regexp, "x.*", Some("xyz"), true ; "regexp value matching")]
        #[test_case(MatchType::Regexp, ".*", None, true ; "regexp wildcard absent")]
        #[test_case(MatchType::NotEqual, "", None, false ; "not equal empty absent")]
        #[test_case(MatchType::NotEqual, "", Some("x"), true ; "not equal empty present")]
        #[test_case(MatchType::NotEqual, "x", None, true ; "not equal value absent")]
        #[test_case(MatchType::NotEqual, "x", Some("x"), false ; "not equal value same")]
        #[test_case(MatchType::NotEqual, "x", Some("y"), true ; "not equal value different")]
        #[test_case(MatchType::NotRegexp, "", None, false ; "not regexp empty absent")]
        #[test_case(MatchType::NotRegexp, "", Some("x"), true ; "not regexp empty present")]
        #[test_case(MatchType::NotRegexp, "x.*", None, true ; "not regexp value absent")]
        #[test_case(MatchType::NotRegexp, "x.*", Some("xyz"), false ; "not regexp value matching")]
        fn truth_table(match_type: MatchType, pattern: &str, value: Option<&str>, expected: bool) {
            let m = Matcher::new(match_type, "team", pattern).unwrap();
            let ls = match value {
                Some(v) => labels(&[("team", v), ("other", "o")]),
                None => labels(&[("other", "o")]),
            };
            assert_eq!(matches_filter_labels(&[m], &ls), expected);
        }

        #[test]
        fn empty_filter_matches_everything() {
            assert!(matches_filter_labels(&[], &LabelSet::new()));
            assert!(matches_filter_labels(&[], &labels(&[("a", "b")])));
        }

        #[test]
        fn all_matchers_must_hold() {
            let ms = parse_matchers(r#"{alertname="X",severity=~"crit.*"}"#).unwrap();
            assert!(matches_filter_labels(
                &ms,
                &labels(&[("alertname", "X"), ("severity", "critical")])
            ));
            assert!(!matches_filter_labels(
                &ms,
                &labels(&[("alertname", "X"), ("severity", "warning")])
            ));
        }

        proptest! {
            #[test]
            fn equal_with_value_matches_iff_label_equal(value in "[a-z]{1,8}", label in "[a-z]{0,8}") {
                let m = Matcher::equal("team", value.clone());
                let ls = labels(&[("team", &label)]);
                prop_assert_eq!(matches_filter_labels(&[m], &ls), label == value);
            }

            #[test]
            fn negation_flips_result_for_non_empty_patterns(value in "[a-z]{1,8}", label in "[a-z]{1,8}") {
                let pos = Matcher::new(MatchType::Equal, "team", value.clone()).unwrap();
                let neg = Matcher::new(MatchType::NotEqual, "team", value).unwrap();
                let ls = labels(&[("team", &label)]);
                prop_assert_ne!(
                    matches_filter_labels(&[pos], &ls),
                    matches_filter_labels(&[neg], &ls)
                );
            }
        }
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn parse_braced_list() {
            let ms = parse_matchers(r#"{alertname="HighCPU", job!="api", env=~"prod|dev", team!~"x"}"#).unwrap();
            assert_eq!(ms.len(), 4);
            assert_eq!(ms[0], Matcher::equal("alertname", "HighCPU"));
            assert_eq!(ms[1].match_type(), MatchType::NotEqual);
            assert_eq!(ms[2].match_type(), MatchType::Regexp);
            assert_eq!(ms[2].value(), "prod|dev");
            assert_eq!(ms[3].match_type(), MatchType::NotRegexp);
        }

        #[test]
        fn parse_without_braces_and_quotes() {
            let ms = parse_matchers("alertname=HighCPU").unwrap();
            assert_eq!(ms, vec![Matcher::equal("alertname", "HighCPU")]);
        }

        #[test]
        fn parse_comma_inside_quotes() {
            let ms = parse_matchers(r#"{msg="a,b",x="y"}"#).unwrap();
            assert_eq!(ms.len(), 2);
            assert_eq!(ms[0].value(), "a,b");
        }

        #[test]
        fn parse_escapes() {
            let ms = parse_matchers(r#"{msg="say \"hi\"\n"}"#).unwrap();
            assert_eq!(ms[0].value(), "say \"hi\"\n");
        }

        #[test]
        fn parse_empty_value() {
            let ms = parse_matchers(r#"{team=""}"#).unwrap();
            assert_eq!(ms[0].value(), "");
        }

        #[test]
        fn parse_trailing_comma() {
            let ms = parse_matchers(r#"{a="1",}"#).unwrap();
            assert_eq!(ms.len(), 1);
        }

        #[test]
        fn parse_empty_braces() {
            assert!(parse_matchers("{}").unwrap().is_empty());
        }

        #[test]
        fn parse_errors() {
            assert!(parse_matchers(r#"{a="1""#).is_err());
            assert!(parse_matchers(r#"{a="1}"#).is_err());
            assert!(parse_matchers("{1a=b}").is_err());
            assert!(parse_matchers("{a}").is_err());
            assert!(parse_matchers(r#"{a=~"("}"#).is_err());
        }

        #[test]
        fn display_round_trips_through_parser() {
            let m = Matcher::new(MatchType::Regexp, "msg", "a\"b,c").unwrap();
            let parsed = parse_matchers(&format!("{{{m}}}")).unwrap();
            assert_eq!(parsed, vec![m]);
        }
    }
}
