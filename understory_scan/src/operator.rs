// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Selector operators: `Filter`, `OrderBy`, and `GroupBy`.
//!
//! Every operator maps a list of targets to a new list of targets. Operators
//! are polymorphic over nesting: when the input starts with a [`Group`], the
//! operator is applied to each group's members instead, the survivors are
//! rewrapped with the group's original properties, and groups left empty are
//! dropped. A [`Selector`] chains operators left to right.
//!
//! Mixed lists are resolved by the first element. In group mode, a stray
//! selectable beside the groups passes through untouched. In flat mode, a
//! stray group has no access record: `Filter` keeps it, `OrderBy` sorts it
//! last, and `GroupBy` drops it.

use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;

use hashbrown::HashMap;

use crate::access::{AccessRecord, Value};
use crate::collate::natural_cmp;
use crate::config::SingletonGroups;
use crate::target::{Group, GroupProps, Target};

/// Evaluates `Filter` expressions against access records.
///
/// The expression language belongs to the host. Closures of the form
/// `Fn(&str, &AccessRecord) -> bool` implement this trait.
pub trait ExpressionEvaluator {
    /// Returns `true` when `access` satisfies `expression`.
    fn evaluate(&self, expression: &str, access: &AccessRecord) -> bool;
}

impl<F> ExpressionEvaluator for F
where
    F: Fn(&str, &AccessRecord) -> bool,
{
    fn evaluate(&self, expression: &str, access: &AccessRecord) -> bool {
        self(expression, access)
    }
}

/// Everything an operator needs from its surroundings.
#[derive(Copy, Clone)]
pub struct ApplyContext<'a> {
    /// Evaluator for `Filter` expressions.
    pub evaluator: &'a dyn ExpressionEvaluator,
    /// `GroupBy` behavior for a single resulting group.
    pub singleton_groups: SingletonGroups,
}

impl fmt::Debug for ApplyContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplyContext")
            .field("singleton_groups", &self.singleton_groups)
            .finish_non_exhaustive()
    }
}

impl<'a> ApplyContext<'a> {
    /// Context with the default singleton policy.
    pub fn new(evaluator: &'a dyn ExpressionEvaluator) -> Self {
        Self {
            evaluator,
            singleton_groups: SingletonGroups::default(),
        }
    }

    /// Override the singleton policy.
    #[must_use]
    pub fn with_singleton_groups(mut self, policy: SingletonGroups) -> Self {
        self.singleton_groups = policy;
        self
    }
}

/// Reference to an access-record field, as authored.
///
/// References are conventionally written with a leading `#` (`#row`). The
/// authored text is kept verbatim so it persists unchanged; [`FieldRef::field`]
/// yields the bare field name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FieldRef(String);

impl FieldRef {
    /// Marker that introduces a field reference.
    pub const MARKER: char = '#';

    /// Wrap authored reference text.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Reference a field by its bare name.
    pub fn field_named(name: &str) -> Self {
        let mut text = String::with_capacity(name.len() + 1);
        text.push(Self::MARKER);
        text.push_str(name);
        Self(text)
    }

    /// The authored text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The field name with the marker removed.
    pub fn field(&self) -> &str {
        self.0.strip_prefix(Self::MARKER).unwrap_or(&self.0)
    }

    fn value_of<'r, K>(&self, target: &'r Target<K>) -> Option<&'r Value> {
        match target {
            Target::Selectable(s) => s.access.get(self.field()),
            Target::Group(_) => None,
        }
    }
}

/// Keep selectables whose record satisfies an expression.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Filter {
    /// Expression handed to the [`ExpressionEvaluator`].
    pub expression: String,
}

/// Stable, numeric-aware sort by a field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderBy {
    /// Sort key.
    pub field: FieldRef,
}

/// Partition selectables into groups by a field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupBy {
    /// Grouping key.
    pub field: FieldRef,
    /// Properties given to every group this operator creates.
    pub props: GroupProps,
}

impl Filter {
    /// Filter on `expression`.
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
        }
    }

    /// Apply to a list of targets.
    pub fn apply<K: Copy + Eq>(
        &self,
        input: Vec<Target<K>>,
        cx: &ApplyContext<'_>,
    ) -> Vec<Target<K>> {
        apply_nested(input, cx, &|flat, cx| {
            flat.into_iter()
                .filter(|t| match t {
                    Target::Selectable(s) => cx.evaluator.evaluate(&self.expression, &s.access),
                    Target::Group(_) => true,
                })
                .collect()
        })
    }
}

impl OrderBy {
    /// Order by `field`.
    pub fn new(field: FieldRef) -> Self {
        Self { field }
    }

    /// Apply to a list of targets.
    pub fn apply<K: Copy + Eq>(
        &self,
        input: Vec<Target<K>>,
        cx: &ApplyContext<'_>,
    ) -> Vec<Target<K>> {
        apply_nested(input, cx, &|flat, _| {
            let mut keyed: Vec<(Option<String>, Target<K>)> = flat
                .into_iter()
                .map(|t| (self.field.value_of(&t).map(Value::to_string), t))
                .collect();
            // `sort_by` is stable, so equal keys keep their input order.
            keyed.sort_by(|(a, _), (b, _)| match (a, b) {
                (Some(a), Some(b)) => natural_cmp(a, b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            });
            keyed.into_iter().map(|(_, t)| t).collect()
        })
    }
}

impl GroupBy {
    /// Group by `field`, giving new groups `props`.
    pub fn new(field: FieldRef, props: GroupProps) -> Self {
        Self { field, props }
    }

    /// Apply to a list of targets.
    ///
    /// Elements whose key is falsy (absent, empty, zero) are dropped. Groups
    /// appear in first-encounter order of their key.
    pub fn apply<K: Copy + Eq>(
        &self,
        input: Vec<Target<K>>,
        cx: &ApplyContext<'_>,
    ) -> Vec<Target<K>> {
        apply_nested(input, cx, &|flat, cx| {
            let mut slots: HashMap<String, usize> = HashMap::new();
            let mut groups: Vec<Group<K>> = Vec::new();
            for target in flat {
                let Some(key) = self
                    .field
                    .value_of(&target)
                    .filter(|v| v.is_truthy())
                    .map(Value::to_string)
                else {
                    continue;
                };
                match slots.get(&key) {
                    Some(&slot) => groups[slot].members.push(target),
                    None => {
                        slots.insert(key, groups.len());
                        groups.push(Group::new(vec![target], self.props.clone()));
                    }
                }
            }
            if groups.len() == 1 && cx.singleton_groups == SingletonGroups::Flatten {
                return groups.pop().map(|g| g.members).unwrap_or_default();
            }
            groups.into_iter().map(Target::Group).collect()
        })
    }
}

/// One step of a [`Selector`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operator {
    /// See [`Filter`].
    Filter(Filter),
    /// See [`OrderBy`].
    OrderBy(OrderBy),
    /// See [`GroupBy`].
    GroupBy(GroupBy),
}

impl Operator {
    /// Apply to a list of targets.
    pub fn apply<K: Copy + Eq>(
        &self,
        input: Vec<Target<K>>,
        cx: &ApplyContext<'_>,
    ) -> Vec<Target<K>> {
        match self {
            Self::Filter(op) => op.apply(input, cx),
            Self::OrderBy(op) => op.apply(input, cx),
            Self::GroupBy(op) => op.apply(input, cx),
        }
    }
}

impl From<Filter> for Operator {
    fn from(value: Filter) -> Self {
        Self::Filter(value)
    }
}

impl From<OrderBy> for Operator {
    fn from(value: OrderBy) -> Self {
        Self::OrderBy(value)
    }
}

impl From<GroupBy> for Operator {
    fn from(value: GroupBy) -> Self {
        Self::GroupBy(value)
    }
}

/// An ordered chain of operators.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selector {
    /// Operators, applied first to last.
    pub operators: Vec<Operator>,
}

impl Selector {
    /// Chain `operators`.
    pub fn new(operators: Vec<Operator>) -> Self {
        Self { operators }
    }

    /// Fold the input through every operator.
    pub fn apply<K: Copy + Eq>(
        &self,
        input: Vec<Target<K>>,
        cx: &ApplyContext<'_>,
    ) -> Vec<Target<K>> {
        self.operators
            .iter()
            .fold(input, |acc, op| op.apply(acc, cx))
    }
}

type FlatFn<'f, K> = dyn Fn(Vec<Target<K>>, &ApplyContext<'_>) -> Vec<Target<K>> + 'f;

/// Run `flat` directly on flat input, or on the members of each group.
fn apply_nested<K: Copy + Eq>(
    input: Vec<Target<K>>,
    cx: &ApplyContext<'_>,
    flat: &FlatFn<'_, K>,
) -> Vec<Target<K>> {
    match input.first() {
        Some(Target::Group(_)) => input
            .into_iter()
            .filter_map(|target| match target {
                Target::Group(group) => {
                    let members = apply_nested(group.members, cx, flat);
                    (!members.is_empty()).then(|| Target::Group(Group::new(members, group.props)))
                }
                leaf @ Target::Selectable(_) => Some(leaf),
            })
            .collect(),
        _ => flat(input, cx),
    }
}
