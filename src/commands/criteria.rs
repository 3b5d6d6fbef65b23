use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use tracing::{debug, warn};

use crate::common::collections::HashSet;
use crate::model::con::ConId;
use crate::model::tree::Tree;

/// A compiled regular expression that remembers its source, so criteria can
/// round-trip through record files and the wire format.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Pattern, regex::Error> {
        Ok(Pattern {
            source: source.to_owned(),
            regex: Regex::new(source)?,
        })
    }

    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Pattern) -> bool {
        self.source == other.source
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for Pattern {
    type Err = regex::Error;

    fn from_str(s: &str) -> Result<Pattern, regex::Error> {
        Pattern::new(s)
    }
}

/// Match criteria for selecting containers. Filters accumulate through
/// [`Criteria::add`] and are consumed once by candidate resolution; a
/// criteria value with no filters at all means "operate on the focused
/// container", which is distinct from criteria that matched nothing.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub con_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<u32>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mark: Option<Pattern>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<Pattern>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<Pattern>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Pattern>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<Pattern>,
}

impl Criteria {
    pub fn new() -> Criteria {
        Criteria::default()
    }

    /// True iff no filter was ever added.
    pub fn is_empty(&self) -> bool {
        self.con_id.is_none()
            && self.window_id.is_none()
            && self.mark.is_none()
            && self.class.is_none()
            && self.instance.is_none()
            && self.role.is_none()
            && self.title.is_none()
    }

    /// Adds one filter clause. Malformed values and unknown kinds are
    /// diagnostics, not errors: the clause is dropped and resolution goes
    /// on without it.
    pub fn add(&mut self, kind: &str, value: &str) {
        match kind {
            "class" => self.class = compile(kind, value),
            "instance" => self.instance = compile(kind, value),
            "window_role" => self.role = compile(kind, value),
            "title" => self.title = compile(kind, value),
            "con_mark" => self.mark = compile(kind, value),
            "con_id" => match value.parse::<u64>() {
                Ok(id) => self.con_id = Some(id),
                Err(_) => warn!("could not parse container id {value:?}"),
            },
            "id" => match value.parse::<u32>() {
                Ok(id) => self.window_id = Some(id),
                Err(_) => warn!("could not parse window id {value:?}"),
            },
            other => warn!("unknown criterion: {other}"),
        }
    }
}

fn compile(kind: &str, value: &str) -> Option<Pattern> {
    match Pattern::new(value) {
        Ok(pattern) => Some(pattern),
        Err(err) => {
            warn!("invalid {kind} pattern {value:?}: {err}");
            None
        }
    }
}

/// The resolved candidate set: container references in tree-discovery
/// order, duplicate-free. Owns nothing; ids live only as long as the tree
/// keeps the containers alive.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CandidateSet {
    cons: Vec<ConId>,
}

impl CandidateSet {
    /// Snapshots every live container.
    pub fn snapshot(tree: &Tree) -> CandidateSet {
        let mut seen = HashSet::default();
        let mut cons = Vec::new();
        for id in tree.all_cons() {
            if seen.insert(id) {
                cons.push(id);
            }
        }
        CandidateSet { cons }
    }

    /// Filters the working set in place against the criteria.
    ///
    /// Per-candidate precedence: a container-id filter matches by identity
    /// only; otherwise a mark filter decides for candidates that carry a
    /// mark; otherwise the candidate must own a bound window matching every
    /// specified window property.
    pub fn resolve(&mut self, tree: &Tree, criteria: &Criteria) {
        self.cons.retain(|&id| Self::matches(tree, criteria, id));
        for &id in &self.cons {
            debug!(?id, "matching container");
        }
    }

    pub fn matching(tree: &Tree, criteria: &Criteria) -> CandidateSet {
        let mut set = CandidateSet::snapshot(tree);
        set.resolve(tree, criteria);
        set
    }

    fn matches(tree: &Tree, criteria: &Criteria, id: ConId) -> bool {
        let Some(con) = tree.con(id) else {
            return false;
        };
        if let Some(raw) = criteria.con_id {
            return id.to_raw() == raw;
        }
        if let (Some(pattern), Some(mark)) = (&criteria.mark, con.mark.as_deref()) {
            return pattern.matches(mark);
        }
        let Some(window) = &con.window else {
            return false;
        };
        // an unmarked candidate satisfies nothing when the only filters are
        // mark filters
        let has_window_filter = criteria.window_id.is_some()
            || criteria.class.is_some()
            || criteria.instance.is_some()
            || criteria.role.is_some()
            || criteria.title.is_some();
        if !has_window_filter {
            return false;
        }
        if let Some(window_id) = criteria.window_id {
            if window.id != window_id {
                return false;
            }
        }
        let fields = [
            (&criteria.class, &window.class),
            (&criteria.instance, &window.instance),
            (&criteria.role, &window.role),
            (&criteria.title, &window.title),
        ];
        for (pattern, value) in fields {
            if let Some(pattern) = pattern {
                match value {
                    Some(value) if pattern.matches(value) => {}
                    _ => return false,
                }
            }
        }
        true
    }

    pub fn ids(&self) -> &[ConId] {
        &self.cons
    }

    pub fn is_empty(&self) -> bool {
        self.cons.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cons.len()
    }

    /// The empty-criteria default rule: with no filters at all, the
    /// candidate set is the single focused container.
    pub fn or_focused(&self, tree: &Tree, criteria: &Criteria) -> Vec<ConId> {
        if criteria.is_empty() {
            vec![tree.focused()]
        } else {
            self.cons.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::con::{ConId, WindowInfo};
    use crate::model::geometry::Rect;
    use crate::model::tree::Tree;

    fn tree_with_windows() -> (Tree, ConId, ConId, ConId) {
        let mut tree = Tree::new();
        let output = tree.add_output("out-0", Rect::new(0, 0, 1000, 1000));
        let ws = tree.new_workspace_on(output, "1");
        let term = tree.open_con(ws);
        tree.con_mut(term).window = Some(WindowInfo {
            id: 10,
            class: Some("UXTerm".into()),
            instance: Some("uxterm".into()),
            role: Some("terminal".into()),
            title: Some("shell - mutt".into()),
        });
        let browser = tree.open_con(ws);
        tree.con_mut(browser).window = Some(WindowInfo {
            id: 11,
            class: Some("Navigator".into()),
            instance: Some("firefox".into()),
            role: None,
            title: Some("docs".into()),
        });
        let empty = tree.open_con(ws);
        tree.focus(term);
        (tree, term, browser, empty)
    }

    #[test]
    fn empty_criteria_is_distinct_from_matched_nothing() {
        let (tree, _term, _browser, _empty) = tree_with_windows();
        let empty = Criteria::new();
        assert!(empty.is_empty());

        let mut unmatched = Criteria::new();
        unmatched.add("class", "NoSuchClass");
        assert!(!unmatched.is_empty());
        assert!(CandidateSet::matching(&tree, &unmatched).is_empty());
    }

    #[test]
    fn or_focused_substitutes_the_focused_container() {
        let (tree, term, _browser, _empty) = tree_with_windows();
        let criteria = Criteria::new();
        let set = CandidateSet::matching(&tree, &criteria);
        assert_eq!(set.or_focused(&tree, &criteria), vec![term]);
    }

    #[test]
    fn class_match_requires_a_bound_window() {
        let (tree, term, _browser, _empty) = tree_with_windows();
        let mut criteria = Criteria::new();
        criteria.add("class", "Term$");
        let set = CandidateSet::matching(&tree, &criteria);
        // the windowless container and all layout containers drop out
        assert_eq!(set.ids(), &[term]);
    }

    #[test]
    fn all_specified_window_properties_must_match() {
        let (tree, term, _browser, _empty) = tree_with_windows();
        let mut criteria = Criteria::new();
        criteria.add("class", "Term");
        criteria.add("title", "mutt");
        assert_eq!(CandidateSet::matching(&tree, &criteria).ids(), &[term]);

        criteria.add("instance", "firefox");
        assert!(CandidateSet::matching(&tree, &criteria).is_empty());
    }

    #[test]
    fn window_id_matches_exactly() {
        let (tree, _term, browser, _empty) = tree_with_windows();
        let mut criteria = Criteria::new();
        criteria.add("id", "11");
        assert_eq!(CandidateSet::matching(&tree, &criteria).ids(), &[browser]);
    }

    #[test]
    fn con_id_matches_by_identity_only() {
        let (tree, _term, browser, _empty) = tree_with_windows();
        let mut criteria = Criteria::new();
        criteria.add("con_id", &browser.to_raw().to_string());
        // a window filter that would not match is ignored: identity wins
        criteria.add("class", "NoSuchClass");
        assert_eq!(CandidateSet::matching(&tree, &criteria).ids(), &[browser]);
    }

    #[test]
    fn mark_criterion_decides_for_marked_candidates() {
        let (mut tree, term, browser, _empty) = tree_with_windows();
        tree.con_mut(term).mark = Some("a".into());
        let mut criteria = Criteria::new();
        criteria.add("con_mark", "^a$");
        assert_eq!(CandidateSet::matching(&tree, &criteria).ids(), &[term]);
        let _ = browser;
    }

    #[test]
    fn invalid_regex_is_dropped_not_fatal() {
        let mut criteria = Criteria::new();
        criteria.add("class", "[unterminated");
        assert!(criteria.is_empty());
    }

    #[test]
    fn unknown_criterion_is_dropped() {
        let mut criteria = Criteria::new();
        criteria.add("flavor", "strawberry");
        assert!(criteria.is_empty());
    }

    #[test]
    fn malformed_ids_are_dropped() {
        let mut criteria = Criteria::new();
        criteria.add("con_id", "not-a-number");
        criteria.add("id", "-3");
        assert!(criteria.is_empty());
    }

    #[test]
    fn snapshot_preserves_discovery_order() {
        let (tree, term, browser, empty) = tree_with_windows();
        let set = CandidateSet::snapshot(&tree);
        let t = set.ids().iter().position(|&c| c == term).unwrap();
        let b = set.ids().iter().position(|&c| c == browser).unwrap();
        let e = set.ids().iter().position(|&c| c == empty).unwrap();
        assert!(t < b && b < e);
    }

    #[test]
    fn pattern_serde_round_trips_through_source() {
        let pattern = Pattern::new("^foo.*$").unwrap();
        let json = serde_json::to_string(&{
            let mut c = Criteria::new();
            c.class = Some(pattern);
            c
        })
        .unwrap();
        let back: Criteria = serde_json::from_str(&json).unwrap();
        assert_eq!(back.class.as_ref().map(|p| p.source()), Some("^foo.*$"));
        assert!(back.class.unwrap().matches("foobar"));
    }
}
