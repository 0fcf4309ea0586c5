// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Persisted form of pattern trees.
//!
//! Authoring tools store patterns as a generic tree of [`NodeRecord`]s: a kind
//! tag (`className`), a bag of textual properties, and ordered children. This
//! module converts between that shape and the typed [`Pattern`] tree, so the
//! storage format stays independent of the engine's types. With the `serde`
//! feature, records serialize to JSON or any other serde format.
//!
//! | kind              | properties                       | children                 |
//! |-------------------|----------------------------------|--------------------------|
//! | `PatternList`     | none                             | `PatternManager`         |
//! | `PatternManager`  | `Name`, `Key`, `Cycles`, `Cue`   | `PatternSelector`, `PatternGroup` |
//! | `PatternGroup`    | `Name`, `Cycles`, `Cue`          | `PatternSelector`, `PatternGroup` |
//! | `PatternSelector` | none                             | `Filter`, `OrderBy`, `GroupBy` |
//! | `Filter`          | `Filter`                         | none                     |
//! | `OrderBy`         | `OrderBy`                        | none                     |
//! | `GroupBy`         | `GroupBy`, `Name`, `Cycles`, `Cue` | none                   |
//!
//! Missing properties take their defaults and unknown properties are ignored.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use core::num::NonZeroU32;

use crate::cue::Cue;
use crate::operator::{FieldRef, Filter, GroupBy, OrderBy, Operator, Selector};
use crate::pattern::{GroupNode, Pattern, PatternChild, PatternList};
use crate::target::{DEFAULT_CYCLES, GroupProps};

/// Kind tags used in records.
pub mod kind {
    /// Root of a list of patterns.
    pub const LIST: &str = "PatternList";
    /// Root of one pattern.
    pub const MANAGER: &str = "PatternManager";
    /// Nested group node.
    pub const GROUP: &str = "PatternGroup";
    /// Operator chain.
    pub const SELECTOR: &str = "PatternSelector";
    /// Filter operator.
    pub const FILTER: &str = "Filter";
    /// Order-by operator.
    pub const ORDER_BY: &str = "OrderBy";
    /// Group-by operator.
    pub const GROUP_BY: &str = "GroupBy";
}

mod prop {
    pub(super) const NAME: &str = "Name";
    pub(super) const KEY: &str = "Key";
    pub(super) const CYCLES: &str = "Cycles";
    pub(super) const CUE: &str = "Cue";
    pub(super) const FILTER: &str = "Filter";
    pub(super) const ORDER_BY: &str = "OrderBy";
    pub(super) const GROUP_BY: &str = "GroupBy";
}

/// One node of a persisted pattern tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeRecord {
    /// Kind tag, one of the constants in [`kind`].
    #[cfg_attr(feature = "serde", serde(rename = "className"))]
    pub class_name: String,
    /// Property values as text.
    #[cfg_attr(feature = "serde", serde(default))]
    pub props: BTreeMap<String, String>,
    /// Ordered children.
    #[cfg_attr(feature = "serde", serde(default))]
    pub children: Vec<Self>,
}

impl NodeRecord {
    /// A record with no properties or children.
    pub fn new(class_name: &str) -> Self {
        Self {
            class_name: class_name.to_string(),
            ..Self::default()
        }
    }

    fn with_prop(mut self, name: &str, value: impl Into<String>) -> Self {
        self.props.insert(name.to_string(), value.into());
        self
    }

    fn with_children(mut self, children: Vec<Self>) -> Self {
        self.children = children;
        self
    }

    fn prop(&self, name: &str) -> Option<&str> {
        self.props.get(name).map(String::as_str)
    }

    fn expect_kind(&self, expected: &'static str) -> Result<(), PatternError> {
        if self.class_name == expected {
            Ok(())
        } else {
            Err(PatternError::UnexpectedKind {
                expected,
                found: self.class_name.clone(),
            })
        }
    }

    fn expect_leaf(&self) -> Result<(), PatternError> {
        if self.children.is_empty() {
            Ok(())
        } else {
            Err(PatternError::UnexpectedChildren(self.class_name.clone()))
        }
    }
}

/// Errors produced when reading a record into a pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatternError {
    /// The kind tag is not one this crate knows.
    UnknownKind(String),
    /// A known kind appeared where another was required.
    UnexpectedKind {
        /// What the position allows.
        expected: &'static str,
        /// What the record carried.
        found: String,
    },
    /// A node that takes no children had some.
    UnexpectedChildren(String),
    /// `Cycles` was not an integer of at least one.
    InvalidCycles(String),
    /// Two patterns in a list share a key.
    DuplicateKey(String),
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKind(kind) => write!(f, "unknown pattern node kind `{kind}`"),
            Self::UnexpectedKind { expected, found } => {
                write!(f, "expected a `{expected}` node, found `{found}`")
            }
            Self::UnexpectedChildren(kind) => write!(f, "`{kind}` nodes take no children"),
            Self::InvalidCycles(text) => {
                write!(f, "cycles must be an integer of at least 1, got `{text}`")
            }
            Self::DuplicateKey(key) => write!(f, "duplicate pattern key `{key}`"),
        }
    }
}

impl core::error::Error for PatternError {}

fn is_known(class_name: &str) -> bool {
    [
        kind::LIST,
        kind::MANAGER,
        kind::GROUP,
        kind::SELECTOR,
        kind::FILTER,
        kind::ORDER_BY,
        kind::GROUP_BY,
    ]
    .contains(&class_name)
}

fn misplaced(record: &NodeRecord, expected: &'static str) -> PatternError {
    if is_known(&record.class_name) {
        PatternError::UnexpectedKind {
            expected,
            found: record.class_name.clone(),
        }
    } else {
        PatternError::UnknownKind(record.class_name.clone())
    }
}

fn read_props(record: &NodeRecord, defaults: GroupProps) -> Result<GroupProps, PatternError> {
    let cycles = match record.prop(prop::CYCLES) {
        None => defaults.cycles,
        Some(text) => text
            .trim()
            .parse::<NonZeroU32>()
            .map_err(|_| PatternError::InvalidCycles(text.to_string()))?,
    };
    Ok(GroupProps {
        name: record
            .prop(prop::NAME)
            .map_or(defaults.name, ToString::to_string),
        cycles,
        cue: record.prop(prop::CUE).map_or(defaults.cue, Cue::from_key),
    })
}

fn write_props(record: NodeRecord, props: &GroupProps) -> NodeRecord {
    record
        .with_prop(prop::NAME, props.name.as_str())
        .with_prop(prop::CYCLES, props.cycles.to_string())
        .with_prop(prop::CUE, props.cue.key())
}

fn group_node_defaults() -> GroupProps {
    GroupProps {
        name: String::new(),
        cycles: DEFAULT_CYCLES,
        cue: Cue::Group,
    }
}

fn read_children(record: &NodeRecord) -> Result<Vec<PatternChild>, PatternError> {
    record
        .children
        .iter()
        .map(|child| match child.class_name.as_str() {
            kind::SELECTOR => Selector::from_record(child).map(PatternChild::Selector),
            kind::GROUP => GroupNode::from_record(child).map(PatternChild::Group),
            _ => Err(misplaced(child, kind::SELECTOR)),
        })
        .collect()
}

fn write_children(children: &[PatternChild]) -> Vec<NodeRecord> {
    children
        .iter()
        .map(|child| match child {
            PatternChild::Selector(s) => s.to_record(),
            PatternChild::Group(g) => g.to_record(),
        })
        .collect()
}

impl Operator {
    /// Read a `Filter`, `OrderBy`, or `GroupBy` record.
    pub fn from_record(record: &NodeRecord) -> Result<Self, PatternError> {
        let field = |name| FieldRef::new(record.prop(name).unwrap_or_default());
        let op = match record.class_name.as_str() {
            kind::FILTER => Filter::new(record.prop(prop::FILTER).unwrap_or_default()).into(),
            kind::ORDER_BY => OrderBy::new(field(prop::ORDER_BY)).into(),
            kind::GROUP_BY => {
                GroupBy::new(field(prop::GROUP_BY), read_props(record, group_node_defaults())?)
                    .into()
            }
            _ => return Err(misplaced(record, kind::FILTER)),
        };
        record.expect_leaf()?;
        Ok(op)
    }

    /// Write this operator as a record.
    pub fn to_record(&self) -> NodeRecord {
        match self {
            Self::Filter(f) => {
                NodeRecord::new(kind::FILTER).with_prop(prop::FILTER, f.expression.as_str())
            }
            Self::OrderBy(o) => {
                NodeRecord::new(kind::ORDER_BY).with_prop(prop::ORDER_BY, o.field.as_str())
            }
            Self::GroupBy(g) => write_props(
                NodeRecord::new(kind::GROUP_BY).with_prop(prop::GROUP_BY, g.field.as_str()),
                &g.props,
            ),
        }
    }
}

impl Selector {
    /// Read a `PatternSelector` record.
    pub fn from_record(record: &NodeRecord) -> Result<Self, PatternError> {
        record.expect_kind(kind::SELECTOR)?;
        let operators = record
            .children
            .iter()
            .map(Operator::from_record)
            .collect::<Result<_, _>>()?;
        Ok(Self::new(operators))
    }

    /// Write this selector as a record.
    pub fn to_record(&self) -> NodeRecord {
        NodeRecord::new(kind::SELECTOR)
            .with_children(self.operators.iter().map(Operator::to_record).collect())
    }
}

impl GroupNode {
    /// Read a `PatternGroup` record.
    pub fn from_record(record: &NodeRecord) -> Result<Self, PatternError> {
        record.expect_kind(kind::GROUP)?;
        Ok(Self::new(
            read_props(record, group_node_defaults())?,
            read_children(record)?,
        ))
    }

    /// Write this group node as a record.
    pub fn to_record(&self) -> NodeRecord {
        write_props(NodeRecord::new(kind::GROUP), &self.props)
            .with_children(write_children(&self.children))
    }
}

impl Pattern {
    /// Read a `PatternManager` record.
    pub fn from_record(record: &NodeRecord) -> Result<Self, PatternError> {
        if record.class_name != kind::MANAGER {
            return Err(misplaced(record, kind::MANAGER));
        }
        let defaults = Self::default();
        Ok(Self {
            key: record
                .prop(prop::KEY)
                .map_or(defaults.key, ToString::to_string),
            props: read_props(record, defaults.props)?,
            children: read_children(record)?,
        })
    }

    /// Write this pattern as a record.
    pub fn to_record(&self) -> NodeRecord {
        write_props(NodeRecord::new(kind::MANAGER), &self.props)
            .with_prop(prop::KEY, self.key.as_str())
            .with_children(write_children(&self.children))
    }
}

impl PatternList {
    /// Read a `PatternList` record.
    pub fn from_record(record: &NodeRecord) -> Result<Self, PatternError> {
        if record.class_name != kind::LIST {
            return Err(misplaced(record, kind::LIST));
        }
        let mut list = Self::new();
        for child in &record.children {
            list.push(Pattern::from_record(child)?)?;
        }
        Ok(list)
    }

    /// Write this list as a record.
    pub fn to_record(&self) -> NodeRecord {
        NodeRecord::new(kind::LIST)
            .with_children(self.patterns().iter().map(Pattern::to_record).collect())
    }
}

impl TryFrom<&NodeRecord> for Pattern {
    type Error = PatternError;

    fn try_from(value: &NodeRecord) -> Result<Self, Self::Error> {
        Self::from_record(value)
    }
}

impl From<&Pattern> for NodeRecord {
    fn from(value: &Pattern) -> Self {
        value.to_record()
    }
}
