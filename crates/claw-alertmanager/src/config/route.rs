//! Static route tree configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::matchers::{MatchType, Matcher, parse_matchers};

/// One node of the configured route tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Receiver for alerts matching this node; inherited when empty.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub receiver: String,
    /// Matcher expressions such as `severity=~"crit.*"`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matchers: Vec<String>,
    /// Legacy equality matchers.
    #[serde(rename = "match", skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
    /// Legacy regex matchers.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub match_re: BTreeMap<String, String>,
    /// Keep matching siblings after this node matched.
    #[serde(rename = "continue")]
    pub continue_matching: bool,
    /// Labels alerts are grouped by.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<String>,
    /// Wait before the first notification for a group, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_wait_secs: Option<u64>,
    /// Wait between notifications for a changed group, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_interval_secs: Option<u64>,
    /// Wait before re-sending an unchanged group, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_interval_secs: Option<u64>,
    /// Child routes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Self>,
}

impl RouteConfig {
    /// Creates a route to `receiver` with no matchers.
    #[must_use]
    pub fn new(receiver: impl Into<String>) -> Self {
        Self {
            receiver: receiver.into(),
            ..Self::default()
        }
    }

    /// Compiles the node's `match`, `match_re` and `matchers` into one list.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMatcher` if an expression or regex is malformed.
    pub fn matcher_set(&self) -> Result<Vec<Matcher>> {
        let mut out: Vec<Matcher> = self
            .match_labels
            .iter()
            .map(|(name, value)| Matcher::equal(name, value))
            .collect();
        for (name, pattern) in &self.match_re {
            out.push(Matcher::new(MatchType::Regexp, name, pattern)?);
        }
        for expr in &self.matchers {
            out.extend(parse_matchers(expr)?);
        }
        Ok(out)
    }

    /// Every non-empty receiver name in the subtree, depth first.
    #[must_use]
    pub fn receiver_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_receivers(&mut names);
        names
    }

    fn collect_receivers<'a>(&'a self, names: &mut Vec<&'a str>) {
        if !self.receiver.is_empty() {
            names.push(&self.receiver);
        }
        for child in &self.routes {
            child.collect_receivers(names);
        }
    }

    /// True if any node in the subtree routes to `name`.
    #[must_use]
    pub fn references(&self, name: &str) -> bool {
        self.receiver_names().contains(&name)
    }

    /// Checks every matcher in the subtree compiles.
    ///
    /// # Errors
    ///
    /// Returns the first matcher error found.
    pub fn validate(&self) -> Result<()> {
        self.matcher_set()?;
        self.routes.iter().try_for_each(Self::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> RouteConfig {
        let mut root = RouteConfig::new("default");
        let mut db = RouteConfig::new("db");
        db.match_labels.insert("service".into(), "db".into());
        db.routes.push(RouteConfig::new("db-oncall"));
        let mut api = RouteConfig::default();
        api.matchers.push(r#"service=~"api|web""#.into());
        root.routes.push(db);
        root.routes.push(api);
        root
    }

    #[test]
    fn receiver_names_depth_first() {
        assert_eq!(tree().receiver_names(), vec!["default", "db", "db-oncall"]);
    }

    #[test]
    fn references() {
        let t = tree();
        assert!(t.references("db-oncall"));
        assert!(!t.references("nobody"));
    }

    #[test]
    fn matcher_set_combines_forms() {
        let mut r = RouteConfig::new("x");
        r.match_labels.insert("a".into(), "1".into());
        r.match_re.insert("b".into(), "2|3".into());
        r.matchers.push(r#"{c!="4"}"#.into());
        let set = r.matcher_set().unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set[0].match_type(), MatchType::Equal);
        assert_eq!(set[1].match_type(), MatchType::Regexp);
        assert_eq!(set[2].match_type(), MatchType::NotEqual);
    }

    #[test]
    fn validate_reports_nested_errors() {
        let mut t = tree();
        t.routes[0].routes[0].match_re.insert("x".into(), "(".into());
        assert!(t.validate().is_err());
        assert!(tree().validate().is_ok());
    }

    #[test]
    fn yaml_field_names() {
        let r: RouteConfig =
            serde_yaml::from_str("receiver: a\nmatch: {team: x}\ncontinue: true\ngroup_wait_secs: 30\n")
                .unwrap();
        assert!(r.continue_matching);
        assert_eq!(r.match_labels.get("team").map(String::as_str), Some("x"));
        assert_eq!(r.group_wait_secs, Some(30));
    }
}
