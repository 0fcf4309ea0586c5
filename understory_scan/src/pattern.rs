// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pattern trees: how selectors and nested groups compose a scan order.
//!
//! A [`Pattern`] is the root of an authored access pattern. Its children are
//! [`Selector`]s and nested [`GroupNode`]s. Applying a pattern (or a group
//! node) runs every child on the same input, concatenates their results into
//! one member list, and wraps that list in a single [`Group`]; an empty result
//! yields no group at all. Groups produced by children stay nested: only
//! `GroupBy`'s singleton policy ever flattens.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use crate::cue::Cue;
use crate::operator::{ApplyContext, Selector};
use crate::record::PatternError;
use crate::target::{DEFAULT_CYCLES, Group, GroupProps, Selectable, Target};

/// A nested group in a pattern tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupNode {
    /// Properties of the group this node produces.
    pub props: GroupProps,
    /// Selectors and nested groups, in order.
    pub children: Vec<PatternChild>,
}

/// A child of a [`Pattern`] or [`GroupNode`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatternChild {
    /// A chain of operators over the input.
    Selector(Selector),
    /// A nested group.
    Group(GroupNode),
}

impl PatternChild {
    /// Apply to the input selectables.
    pub fn apply<K: Copy + Eq>(
        &self,
        input: &[Target<K>],
        cx: &ApplyContext<'_>,
    ) -> Vec<Target<K>> {
        match self {
            Self::Selector(selector) => selector.apply(input.to_vec(), cx),
            Self::Group(group) => group.apply(input, cx),
        }
    }
}

impl From<Selector> for PatternChild {
    fn from(value: Selector) -> Self {
        Self::Selector(value)
    }
}

impl From<GroupNode> for PatternChild {
    fn from(value: GroupNode) -> Self {
        Self::Group(value)
    }
}

impl GroupNode {
    /// Create a group node.
    pub fn new(props: GroupProps, children: Vec<PatternChild>) -> Self {
        Self { props, children }
    }

    /// Returns `[Group]` built from the children's results, or `[]`.
    pub fn apply<K: Copy + Eq>(
        &self,
        input: &[Target<K>],
        cx: &ApplyContext<'_>,
    ) -> Vec<Target<K>> {
        compose(&self.children, &self.props, input, cx)
    }
}

fn compose<K: Copy + Eq>(
    children: &[PatternChild],
    props: &GroupProps,
    input: &[Target<K>],
    cx: &ApplyContext<'_>,
) -> Vec<Target<K>> {
    let mut members = Vec::new();
    for child in children {
        members.extend(child.apply(input, cx));
    }
    if members.is_empty() {
        Vec::new()
    } else {
        vec![Target::Group(Group::new(members, props.clone()))]
    }
}

/// Root of an authored access pattern.
///
/// ```rust
/// use understory_scan::{
///     AccessRecord, ApplyContext, FieldRef, GroupBy, GroupProps, Pattern, Selectable, Selector,
/// };
///
/// let keys: Vec<Selectable<u32>> = (0..6)
///     .map(|i| Selectable::new(i, AccessRecord::new().with("row", (i / 3 + 1) as i64)))
///     .collect();
///
/// let mut pattern = Pattern::default();
/// pattern.children.push(
///     Selector::new(vec![GroupBy::new(FieldRef::new("#row"), GroupProps::default()).into()]).into(),
/// );
///
/// let never = |_: &str, _: &AccessRecord| false;
/// let root = pattern.targets(keys, &ApplyContext::new(&never));
/// // Two rows of three keys each.
/// assert_eq!(root.members.len(), 2);
/// assert_eq!(root.members[0].as_group().unwrap().members.len(), 3);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    /// Unique key within a [`PatternList`].
    pub key: String,
    /// Name, cycles, and the leaf cue style.
    ///
    /// `props.cue` is the style applied to a single highlighted leaf.
    pub props: GroupProps,
    /// Selectors and nested groups, in order.
    pub children: Vec<PatternChild>,
}

impl Default for Pattern {
    fn default() -> Self {
        Self {
            key: String::new(),
            props: GroupProps {
                name: "a pattern".to_string(),
                cycles: DEFAULT_CYCLES,
                cue: Cue::Button,
            },
            children: Vec::new(),
        }
    }
}

impl Pattern {
    /// Create an empty pattern with a key and name.
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        let mut pattern = Self {
            key: key.into(),
            ..Self::default()
        };
        pattern.props.name = name.into();
        pattern
    }

    /// Returns `[Group]` built from the children's results, or `[]`.
    pub fn apply<K: Copy + Eq>(
        &self,
        input: &[Target<K>],
        cx: &ApplyContext<'_>,
    ) -> Vec<Target<K>> {
        compose(&self.children, &self.props, input, cx)
    }

    /// Build the root group a scanner walks.
    ///
    /// A pattern without children scans every selectable in input order. When
    /// the children select nothing, the root is an empty group.
    pub fn targets<K: Copy + Eq>(
        &self,
        selectables: Vec<Selectable<K>>,
        cx: &ApplyContext<'_>,
    ) -> Group<K> {
        let input: Vec<Target<K>> = selectables.into_iter().map(Target::Selectable).collect();
        if self.children.is_empty() {
            return Group::new(input, self.props.clone());
        }
        match self.apply(&input, cx).pop() {
            Some(Target::Group(root)) => root,
            _ => Group::new(Vec::new(), self.props.clone()),
        }
    }
}

/// The authored patterns, addressable by key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatternList {
    patterns: Vec<Pattern>,
}

impl PatternList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pattern; its key must be unique in the list.
    pub fn push(&mut self, pattern: Pattern) -> Result<(), PatternError> {
        if self.patterns.iter().any(|p| p.key == pattern.key) {
            return Err(PatternError::DuplicateKey(pattern.key));
        }
        self.patterns.push(pattern);
        Ok(())
    }

    /// Remove the pattern with `key`.
    pub fn remove(&mut self, key: &str) -> Option<Pattern> {
        let i = self.patterns.iter().position(|p| p.key == key)?;
        Some(self.patterns.remove(i))
    }

    /// The pattern with `key`, falling back to the first pattern.
    pub fn by_key(&self, key: &str) -> Option<&Pattern> {
        self.patterns
            .iter()
            .find(|p| p.key == key)
            .or_else(|| self.patterns.first())
    }

    /// `(key, name)` for each pattern, in order.
    pub fn pattern_map(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.patterns
            .iter()
            .map(|p| (p.key.as_str(), p.props.name.as_str()))
    }

    /// A key not used by any pattern in the list.
    pub fn unused_key(&self) -> String {
        (self.patterns.len() + 1..)
            .map(|n| format!("pattern-{n}"))
            .find(|k| self.patterns.iter().all(|p| &p.key != k))
            .unwrap_or_default()
    }

    /// All patterns, in order.
    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// Number of patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Returns `true` if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
