// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Scan: switch-access scanning primitives.
//!
//! Switch users drive an interface with one or two buttons. Instead of
//! pointing, they wait while the interface highlights candidates in turn and
//! press when the right one is lit. This crate models that as:
//!
//! - **Selectables** ([`Selectable`]): host elements paired with an
//!   [`AccessRecord`] of named fields (row, column, label, ...) and an
//!   optional direct action.
//! - **Targets** ([`Target`] / [`Group`]): a tree of selectables and nested
//!   groups. A group's [`GroupProps::cycles`] repeats its members before the
//!   cursor leaves it.
//! - **Operators** ([`Filter`], [`OrderBy`], [`GroupBy`]) chained into a
//!   [`Selector`], and **patterns** ([`Pattern`], [`GroupNode`]) composing
//!   selectors into the target tree.
//! - A **scanner** ([`Scanner`]): the cursor automaton that moves through the
//!   tree on [`ScanInput::Next`] and descends or fires on
//!   [`ScanInput::Activate`], highlighting through a [`Highlighter`].
//!
//! Filter expressions and rule dispatch belong to the host; they plug in
//! through [`ExpressionEvaluator`] and [`RuleEngine`].
//!
//! ## Minimal example
//!
//! Scan a three-by-three keypad row by row, then key by key:
//!
//! ```rust
//! use understory_scan::{
//!     AccessRecord, Activation, CueMarkers, FieldRef, GroupBy, GroupProps, Pattern,
//!     ScanConfig, ScanInput, Scanner, Selectable, Selector,
//! };
//!
//! let keypad = || -> Vec<Selectable<u32>> {
//!     (0..9)
//!         .map(|i| Selectable::new(i, AccessRecord::new().with("row", i64::from(i / 3))))
//!         .collect()
//! };
//!
//! let mut pattern = Pattern::new("rows", "row then key");
//! pattern.children.push(
//!     Selector::new(vec![GroupBy::new(FieldRef::new("#row"), GroupProps::default()).into()])
//!         .into(),
//! );
//!
//! let never = |_: &str, _: &AccessRecord| false;
//! let mut pressed = Vec::new();
//! let mut rules = |_: &str, _: &str, access: &AccessRecord| pressed.push(access.clone());
//!
//! let mut scanner = Scanner::new(pattern, CueMarkers::new(), ScanConfig::default());
//! scanner.refresh(&keypad, &never);
//!
//! // Highlight the second row and enter it.
//! scanner.dispatch(ScanInput::Next, &mut rules);
//! scanner.dispatch(ScanInput::Next, &mut rules);
//! assert_eq!(scanner.highlighter().len(), 3);
//! assert_eq!(
//!     scanner.dispatch(ScanInput::Activate, &mut rules),
//!     Some(Activation::Descended)
//! );
//!
//! // The first key of that row is lit; pressing it reaches the rules.
//! assert!(scanner.highlighter().get(&3).is_some());
//! assert_eq!(
//!     scanner.dispatch(ScanInput::Activate, &mut rules),
//!     Some(Activation::Rules)
//! );
//! drop(rules);
//! assert_eq!(pressed.len(), 1);
//! ```
//!
//! ## Persistence
//!
//! Pattern trees round-trip through [`NodeRecord`], a generic
//! `{ className, props, children }` node. With the `serde` feature (on by
//! default) records and [`ScanConfig`] serialize with any serde format.
//!
//! ## Logging
//!
//! Stack pushes, pops, resets, and ignored stale timers are reported through
//! `tracing` at `debug`; every advance at `trace`.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod access;
mod collate;
mod config;
mod cue;
mod operator;
mod pattern;
mod record;
mod scanner;
mod target;

pub use access::{AccessRecord, Action, Value, keys};
pub use config::{ScanConfig, SingletonGroups};
pub use cue::{Cue, CueMarkers, Highlighter};
pub use operator::{
    ApplyContext, ExpressionEvaluator, FieldRef, Filter, GroupBy, Operator, OrderBy, Selector,
};
pub use pattern::{GroupNode, Pattern, PatternChild, PatternList};
pub use record::{NodeRecord, PatternError, kind};
pub use scanner::{
    Activation, CueTicket, Frame, PRESS, RefreshOutcome, RuleEngine, ScanInput, Scanner,
    SelectableSource,
};
pub use target::{DEFAULT_CYCLES, Group, GroupProps, Leaves, Selectable, Target};
