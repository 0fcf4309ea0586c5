// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The scanning automaton.
//!
//! ## Overview
//!
//! A [`Scanner`] walks the [`Group`] tree produced by a [`Pattern`] with a
//! stack of cursor frames. The innermost frame is the current one; its cursor
//! names the *current* target, which the scanner highlights through its
//! [`Highlighter`].
//!
//! - [`Scanner::next`] advances the cursor. An exhausted inner frame is
//!   popped and the parent resumes where it left off; an exhausted root
//!   wraps to its first member, so scanning never ends on its own.
//! - [`Scanner::activate`] descends into a current group (skipping chains of
//!   single-group wrappers), or fires the current leaf.
//! - [`Scanner::refresh`] rebuilds the targets from the host's selectables and
//!   follows each cursor to the element it was on, unless the pattern
//!   structure changed.
//!
//! ## Dwell timers
//!
//! Auto-scan timers live in the host. Every cue hands out a [`CueTicket`]
//! stamped with the scanner's epoch; the epoch moves whenever the position is
//! reset or invalidated. A timer that fires with an old ticket is stale, and
//! [`Scanner::dispatch_if_current`] ignores it.
//!
//! ```rust
//! use understory_scan::{
//!     AccessRecord, Cue, CueMarkers, Pattern, ScanConfig, ScanInput, Scanner, Selectable,
//! };
//!
//! let keys = || -> Vec<Selectable<u32>> {
//!     (1..=3).map(|i| Selectable::new(i, AccessRecord::new())).collect()
//! };
//! let never = |_: &str, _: &AccessRecord| false;
//! let mut rules = |_: &str, _: &str, _: &AccessRecord| {};
//!
//! let mut scanner = Scanner::new(Pattern::default(), CueMarkers::new(), ScanConfig::default());
//! scanner.refresh(&keys, &never);
//! scanner.next();
//! assert_eq!(scanner.highlighter().get(&1), Some(&Cue::Button));
//!
//! let ticket = scanner.ticket();
//! scanner.next();
//! assert_eq!(scanner.highlighter().get(&2), Some(&Cue::Button));
//!
//! // The pattern changed under a pending timer: its ticket is now stale.
//! let mut edited = Pattern::default();
//! edited.props.name = "edited".into();
//! scanner.set_pattern(edited);
//! scanner.refresh(&keys, &never);
//! assert!(scanner.dispatch_if_current(ticket, ScanInput::Next, &mut rules).is_none());
//! ```

use alloc::vec::Vec;

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::access::AccessRecord;
use crate::config::ScanConfig;
use crate::cue::Highlighter;
use crate::operator::{ApplyContext, ExpressionEvaluator};
use crate::pattern::Pattern;
use crate::target::{Group, Selectable, Target};

/// Event name forwarded to the rule engine when a leaf is activated.
pub const PRESS: &str = "press";

/// Source of the selectables currently active in the host UI.
///
/// Closures returning `Vec<Selectable<K>>` implement this trait.
pub trait SelectableSource<K> {
    /// Current selectables, in document order.
    fn selectables(&self) -> Vec<Selectable<K>>;
}

impl<K, F> SelectableSource<K> for F
where
    F: Fn() -> Vec<Selectable<K>>,
{
    fn selectables(&self) -> Vec<Selectable<K>> {
        self()
    }
}

/// Receives activations of leaves that carry no direct callback.
///
/// Closures of the form `FnMut(&str, &str, &AccessRecord)` implement this
/// trait.
pub trait RuleEngine {
    /// Apply the rules for `event` on `component`.
    fn apply_rules(&mut self, component: &str, event: &str, access: &AccessRecord);
}

impl<F> RuleEngine for F
where
    F: FnMut(&str, &str, &AccessRecord),
{
    fn apply_rules(&mut self, component: &str, event: &str, access: &AccessRecord) {
        self(component, event, access);
    }
}

/// A discrete input mapped onto the scanner.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScanInput {
    /// Advance the cursor.
    Next,
    /// Activate the current target.
    Activate,
}

/// What [`Scanner::activate`] did.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Activation {
    /// There was no current target.
    Nothing,
    /// A new frame was pushed for the current group.
    Descended,
    /// The leaf's own callback ran.
    Callback,
    /// The leaf was forwarded to the rule engine.
    Rules,
}

/// Proof of which cue a pending timer belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CueTicket(u64);

bitflags! {
    /// Summary of what a [`Scanner::refresh`] did to the cursor.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct RefreshOutcome: u8 {
        /// The stack was reset to a fresh root frame.
        const RESET   = 0b0000_0001;
        /// Stale frames were dropped or a cursor was unset.
        const TRIMMED = 0b0000_0010;
        /// The new targets are empty.
        const EMPTY   = 0b0000_0100;
        /// A cursor followed its element to a new position.
        const MOVED   = 0b0000_1000;
    }
}

/// Path of member indices from the root group; usually shallow.
type GroupPath = SmallVec<[usize; 4]>;

/// One level of the cursor stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame<K> {
    path: GroupPath,
    index: Option<usize>,
    /// First leaf of the member under the cursor, used to find it again
    /// after the targets are rebuilt.
    anchor: Option<K>,
}

impl<K> Frame<K> {
    fn root() -> Self {
        Self {
            path: GroupPath::new(),
            index: None,
            anchor: None,
        }
    }

    /// Member indices leading from the root group to this frame's group.
    pub fn path(&self) -> &[usize] {
        &self.path
    }

    /// Cursor within the frame's group; `None` before the first advance.
    pub fn index(&self) -> Option<usize> {
        self.index
    }
}

/// The element that stands for `target` when re-anchoring a cursor.
fn first_leaf<K: Copy + Eq>(target: &Target<K>) -> Option<K> {
    match target {
        Target::Selectable(leaf) => Some(leaf.element),
        Target::Group(group) => group.leaves().next().map(|leaf| leaf.element),
    }
}

/// Switch-access scanning automaton.
///
/// The scanner is idle until the first [`refresh`](Self::refresh) (or
/// [`start`](Self::start)) and active afterwards. It is driven synchronously,
/// one call per input event.
pub struct Scanner<K, H> {
    pattern: Pattern,
    highlighter: H,
    config: ScanConfig,
    targets: Group<K>,
    /// Outermost first; the last frame is current.
    stack: Vec<Frame<K>>,
    structure_changed: bool,
    epoch: u64,
}

impl<K, H> core::fmt::Debug for Scanner<K, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scanner")
            .field("pattern", &self.pattern.key)
            .field("members", &self.targets.members.len())
            .field("depth", &self.stack.len())
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

impl<K: Copy + Eq, H: Highlighter<K>> Scanner<K, H> {
    /// Create an idle scanner for `pattern`.
    pub fn new(pattern: Pattern, highlighter: H, config: ScanConfig) -> Self {
        let targets = Group::new(Vec::new(), pattern.props.clone());
        Self {
            pattern,
            highlighter,
            config,
            targets,
            stack: Vec::new(),
            structure_changed: false,
            epoch: 0,
        }
    }

    /// The pattern in use.
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Replace the pattern. Takes effect on the next refresh.
    ///
    /// A pattern that differs from the current one is a structural change:
    /// pending tickets go stale at once and the next refresh restarts the
    /// scan.
    pub fn set_pattern(&mut self, pattern: Pattern) {
        if pattern != self.pattern {
            tracing::debug!(key = %pattern.key, "pattern structure changed");
            self.structure_changed = true;
            self.pattern = pattern;
            self.epoch += 1;
        }
    }

    /// Current policies.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// The highlight registry.
    pub fn highlighter(&self) -> &H {
        &self.highlighter
    }

    /// Mutable access to the highlight registry.
    pub fn highlighter_mut(&mut self) -> &mut H {
        &mut self.highlighter
    }

    /// The root group built by the last refresh.
    pub fn targets(&self) -> &Group<K> {
        &self.targets
    }

    /// Cursor frames, outermost first. Empty while idle.
    pub fn frames(&self) -> &[Frame<K>] {
        &self.stack
    }

    /// Returns `true` once the scanner has a cursor stack.
    pub fn is_active(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Ticket for the current cue epoch.
    ///
    /// The ticket is shared by every cue shown within one epoch: it survives
    /// ordinary [`next`](Self::next) and [`activate`](Self::activate) moves,
    /// and goes stale when the stack is reset, when a refresh moves the
    /// cursor to a different target, or when the pattern changes.
    pub fn ticket(&self) -> CueTicket {
        CueTicket(self.epoch)
    }

    /// Rebuild the targets from `source` and restart or resume scanning.
    pub fn refresh<S, E>(&mut self, source: &S, evaluator: &E) -> RefreshOutcome
    where
        S: SelectableSource<K> + ?Sized,
        E: ExpressionEvaluator,
    {
        let cx = ApplyContext::new(evaluator).with_singleton_groups(self.config.singleton_groups);
        self.targets = self.pattern.targets(source.selectables(), &cx);
        let mut outcome = self.start();
        if self.targets.is_empty() {
            outcome |= RefreshOutcome::EMPTY;
        }
        outcome
    }

    /// Begin scanning the current targets.
    ///
    /// The stack is reset when the scanner is idle, when the pattern structure
    /// changed, or when position preservation is disabled. Otherwise each
    /// existing frame is re-anchored on the element it pointed at.
    pub fn start(&mut self) -> RefreshOutcome {
        let outcome = if self.stack.is_empty()
            || self.structure_changed
            || !self.config.preserve_position
        {
            self.reset_stack();
            RefreshOutcome::RESET
        } else {
            self.revalidate()
        };
        self.structure_changed = false;
        self.cue();
        outcome
    }

    /// Unconditionally restart from the root.
    pub fn reset(&mut self) {
        self.reset_stack();
        self.structure_changed = false;
        self.cue();
    }

    fn reset_stack(&mut self) {
        tracing::debug!(epoch = self.epoch + 1, "scan stack reset");
        self.stack.clear();
        self.stack.push(Frame::root());
        self.epoch += 1;
    }

    /// Follow every preserved frame to the element it pointed at.
    ///
    /// Nested frames are re-entered from their parent's cursor. A frame whose
    /// element is gone loses its cursor, and the frames inside it are dropped.
    /// The epoch moves if the current target is not the one shown before.
    fn revalidate(&mut self) -> RefreshOutcome {
        let before = (self.stack.len(), self.stack.last().and_then(|f| f.anchor));
        let mut outcome = RefreshOutcome::empty();
        let mut keep = 0;
        while keep < self.stack.len() {
            let path = if keep == 0 {
                Some(GroupPath::new())
            } else {
                let parent = &self.stack[keep - 1];
                parent
                    .index
                    .and_then(|i| self.entered_path(&parent.path, i))
            };
            let Some(path) = path else {
                break;
            };
            let Some(group) = self.targets.descendant(&path) else {
                break;
            };
            let frame = &self.stack[keep];
            let index = frame.anchor.and_then(|anchor| {
                frame
                    .index
                    .filter(|&i| group.member(i).and_then(first_leaf) == Some(anchor))
                    .or_else(|| group.index_of(&anchor))
            });
            if index.is_none() && frame.index.is_some() {
                outcome |= RefreshOutcome::TRIMMED;
            } else if index != frame.index || path != frame.path {
                outcome |= RefreshOutcome::MOVED;
            }
            let anchor = index.and_then(|i| group.member(i)).and_then(first_leaf);
            let frame = &mut self.stack[keep];
            frame.path = path;
            frame.index = index;
            frame.anchor = anchor;
            keep += 1;
        }
        if keep < self.stack.len() {
            tracing::debug!(dropped = self.stack.len() - keep, "stale scan frames dropped");
            self.stack.truncate(keep);
            outcome |= RefreshOutcome::TRIMMED;
        }
        let after = (self.stack.len(), self.stack.last().and_then(|f| f.anchor));
        if after != before {
            tracing::debug!(?outcome, "scan cursor re-anchored");
            self.epoch += 1;
        }
        outcome
    }

    /// Path of the frame entered from member `index` of the group at `path`,
    /// skipping chains of single-group wrappers.
    fn entered_path(&self, path: &[usize], index: usize) -> Option<GroupPath> {
        let group = self.targets.descendant(path)?;
        if index >= group.len() {
            return None;
        }
        let slot = index % group.members.len();
        let mut target = group.members[slot].as_group()?;
        let mut entered: GroupPath = path.iter().copied().collect();
        entered.push(slot);
        while target.len() == 1 {
            let Some(inner) = target.members[0].as_group() else {
                break;
            };
            entered.push(0);
            target = inner;
        }
        Some(entered)
    }

    fn top(&self) -> Option<(&Frame<K>, &Group<K>)> {
        let frame = self.stack.last()?;
        let group = self.targets.descendant(&frame.path)?;
        Some((frame, group))
    }

    /// Point the current frame at `index` and remember what it points at.
    fn set_index(&mut self, index: Option<usize>) {
        let anchor = self
            .top()
            .zip(index)
            .and_then(|((_, group), i)| group.member(i))
            .and_then(first_leaf);
        if let Some(frame) = self.stack.last_mut() {
            frame.index = index;
            frame.anchor = anchor;
        }
    }

    /// The target under the cursor.
    pub fn current(&self) -> Option<&Target<K>> {
        let (frame, group) = self.top()?;
        group.member(frame.index?)
    }

    /// Move the cursor of the current frame to the member containing `element`.
    ///
    /// An element that is not in the current group unsets the cursor.
    pub fn set_current(&mut self, element: &K) {
        let Some((_, group)) = self.top() else {
            return;
        };
        let index = group.index_of(element);
        self.set_index(index);
    }

    /// Advance the cursor, popping or wrapping at the end of a group.
    pub fn next(&mut self) {
        let Some((index, len)) = self.top().map(|(frame, group)| (frame.index, group.len()))
        else {
            return;
        };
        let depth = self.stack.len();
        let advanced = match index {
            None if len > 0 => Some(0),
            Some(i) if i + 1 < len => Some(i + 1),
            _ if depth > 1 => None,
            _ if len > 0 => Some(0),
            _ => index,
        };
        if advanced.is_none() && depth > 1 {
            self.stack.pop();
            tracing::debug!(depth = depth - 1, "scan stack pop");
        } else {
            self.set_index(advanced);
        }
        tracing::trace!(
            depth = self.stack.len(),
            index = ?self.stack.last().and_then(Frame::index),
            "scan next"
        );
        self.cue();
    }

    /// Activate the current target.
    pub fn activate<R: RuleEngine + ?Sized>(&mut self, rules: &mut R) -> Activation {
        let Some(current) = self.current() else {
            return Activation::Nothing;
        };
        let activation = match current {
            Target::Group(_) => {
                let Some(path) = self
                    .top()
                    .and_then(|(frame, _)| self.entered_path(&frame.path, frame.index?))
                else {
                    return Activation::Nothing;
                };
                tracing::debug!(path = ?path.as_slice(), "scan stack push");
                self.stack.push(Frame {
                    path,
                    ..Frame::root()
                });
                self.set_index(Some(0));
                Activation::Descended
            }
            Target::Selectable(leaf) => {
                if let Some(action) = leaf.access.action() {
                    tracing::debug!("activate callback");
                    action();
                    Activation::Callback
                } else {
                    let component = leaf.access.component_name();
                    tracing::debug!(component, "activate rules");
                    rules.apply_rules(component, PRESS, &leaf.access);
                    Activation::Rules
                }
            }
        };
        self.cue();
        activation
    }

    /// Run one input.
    pub fn dispatch<R: RuleEngine + ?Sized>(
        &mut self,
        input: ScanInput,
        rules: &mut R,
    ) -> Option<Activation> {
        match input {
            ScanInput::Next => {
                self.next();
                None
            }
            ScanInput::Activate => Some(self.activate(rules)),
        }
    }

    /// Run one input on behalf of a timer armed with `ticket`.
    ///
    /// Returns `None` without touching the scanner if the ticket is stale.
    pub fn dispatch_if_current<R: RuleEngine + ?Sized>(
        &mut self,
        ticket: CueTicket,
        input: ScanInput,
        rules: &mut R,
    ) -> Option<Option<Activation>> {
        if ticket != self.ticket() {
            tracing::debug!(?ticket, epoch = self.epoch, "stale dwell ignored");
            return None;
        }
        Some(self.dispatch(input, rules))
    }

    /// Remove every cue in the interface.
    pub fn clear_cue(&mut self) {
        self.highlighter.clear_cues();
    }

    /// Clear all cues, then highlight the current target.
    ///
    /// A leaf gets the pattern's cue; a group gets its own cue on every leaf.
    pub fn cue(&mut self) -> CueTicket {
        self.highlighter.clear_cues();
        let leaf_cue = &self.pattern.props.cue;
        let Some(frame) = self.stack.last() else {
            return CueTicket(self.epoch);
        };
        let current = self
            .targets
            .descendant(&frame.path)
            .zip(frame.index)
            .and_then(|(group, i)| group.member(i));
        match current {
            Some(Target::Selectable(leaf)) => self.highlighter.set_cue(leaf.element, leaf_cue),
            Some(Target::Group(group)) => group.cue(&group.props.cue, &mut self.highlighter),
            None => {}
        }
        CueTicket(self.epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Value;
    use crate::config::SingletonGroups;
    use crate::cue::{Cue, CueMarkers};
    use crate::operator::{FieldRef, Filter, GroupBy, Selector};
    use crate::pattern::{GroupNode, PatternChild};
    use crate::target::{DEFAULT_CYCLES, GroupProps};
    use alloc::rc::Rc;
    use alloc::string::{String, ToString};
    use alloc::vec;
    use core::cell::{Cell, RefCell};
    use core::num::NonZeroU32;

    type TestScanner = Scanner<u32, CueMarkers<u32>>;

    fn never(_: &str, _: &AccessRecord) -> bool {
        false
    }

    fn truthy_field(expr: &str, access: &AccessRecord) -> bool {
        access.get(expr).is_some_and(Value::is_truthy)
    }

    fn no_rules(_: &str, _: &str, _: &AccessRecord) {}

    fn flat(n: u32) -> impl Fn() -> Vec<Selectable<u32>> {
        move || {
            (1..=n)
                .map(|i| Selectable::new(i, AccessRecord::new().with("name", i64::from(i))))
                .collect()
        }
    }

    /// Six keys in two rows.
    fn grid() -> Vec<Selectable<u32>> {
        keys_in_rows(1..=6)
    }

    /// Keys in rows of three, numbered from one.
    fn keys_in_rows(ids: impl IntoIterator<Item = u32>) -> Vec<Selectable<u32>> {
        ids.into_iter()
            .map(|i| {
                Selectable::new(
                    i,
                    AccessRecord::new()
                        .with("row", i64::from((i - 1) / 3 + 1))
                        .with("name", i64::from(i)),
                )
            })
            .collect()
    }

    fn one_cycle() -> GroupProps {
        GroupProps {
            cycles: NonZeroU32::new(1).unwrap(),
            ..GroupProps::default()
        }
    }

    fn rows_pattern() -> Pattern {
        let mut pattern = Pattern::new("rows", "rows");
        pattern.props.cycles = NonZeroU32::new(1).unwrap();
        pattern.children.push(PatternChild::Selector(Selector::new(vec![
            GroupBy::new(FieldRef::new("#row"), one_cycle()).into(),
        ])));
        pattern
    }

    fn scanner(pattern: Pattern) -> TestScanner {
        Scanner::new(pattern, CueMarkers::new(), ScanConfig::default())
    }

    fn current_id(s: &TestScanner) -> Option<u32> {
        s.current()
            .and_then(Target::as_selectable)
            .map(|l| l.element)
    }

    fn marked(s: &TestScanner) -> Vec<u32> {
        let mut v: Vec<u32> = s.highlighter().iter().map(|(k, _)| k).collect();
        v.sort_unstable();
        v
    }

    #[test]
    fn idle_scanner_ignores_inputs() {
        let mut s = scanner(Pattern::default());
        assert!(!s.is_active());
        s.next();
        assert_eq!(s.activate(&mut no_rules), Activation::Nothing);
        assert!(s.current().is_none());
    }

    #[test]
    fn start_cues_nothing_until_first_next() {
        let mut s = scanner(Pattern::default());
        let outcome = s.refresh(&flat(3), &never);
        assert_eq!(outcome, RefreshOutcome::RESET);
        assert_eq!(s.frames().len(), 1);
        assert_eq!(s.frames()[0].index(), None);
        assert!(s.current().is_none());
        assert!(s.highlighter().is_empty());
    }

    #[test]
    fn single_frame_wraps_forever() {
        let mut pattern = Pattern::default();
        pattern.props.cycles = NonZeroU32::new(1).unwrap();
        let mut s = scanner(pattern);
        s.refresh(&flat(3), &never);
        let mut seen = Vec::new();
        for _ in 0..9 {
            s.next();
            seen.push(s.frames()[0].index().unwrap());
        }
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn cycles_repeat_members_before_wrapping() {
        let mut s = scanner(Pattern::default());
        s.refresh(&flat(2), &never);
        let mut seen = Vec::new();
        for _ in 0..5 {
            s.next();
            seen.push(current_id(&s).unwrap());
        }
        assert_eq!(seen, vec![1, 2, 1, 2, 1]);
        assert_eq!(s.frames()[0].index(), Some(0));
    }

    #[test]
    fn next_cues_leaf_with_pattern_cue() {
        let mut pattern = Pattern::default();
        pattern.props.cue = Cue::Named("target".into());
        let mut s = scanner(pattern);
        s.refresh(&flat(3), &never);
        s.next();
        s.next();
        assert_eq!(marked(&s), vec![2]);
        assert_eq!(s.highlighter().get(&2), Some(&Cue::Named("target".into())));
    }

    #[test]
    fn group_cue_marks_every_leaf_with_group_style() {
        let mut s = scanner(rows_pattern());
        s.refresh(&grid, &never);
        s.next();
        assert_eq!(marked(&s), vec![1, 2, 3]);
        assert!(s.highlighter().iter().all(|(_, c)| *c == Cue::Group));
        s.next();
        assert_eq!(marked(&s), vec![4, 5, 6]);
    }

    #[test]
    fn activate_descends_and_pop_resumes_parent() {
        let mut s = scanner(rows_pattern());
        s.refresh(&grid, &never);
        s.next();
        s.next();
        assert_eq!(s.frames()[0].index(), Some(1));

        assert_eq!(s.activate(&mut no_rules), Activation::Descended);
        assert_eq!(s.frames().len(), 2);
        assert_eq!(s.frames()[1].path(), &[1]);
        assert_eq!(current_id(&s), Some(4));
        assert_eq!(marked(&s), vec![4]);

        s.next();
        s.next();
        assert_eq!(current_id(&s), Some(6));
        // Exhausted: pop back to the rows without resetting them.
        s.next();
        assert_eq!(s.frames().len(), 1);
        assert_eq!(s.frames()[0].index(), Some(1));
        assert_eq!(marked(&s), vec![4, 5, 6]);
        // The parent continues, then wraps.
        s.next();
        assert_eq!(s.frames()[0].index(), Some(0));
        assert_eq!(marked(&s), vec![1, 2, 3]);
    }

    #[test]
    fn activate_collapses_singleton_group_chains() {
        // root -> [wrapper -> [inner -> [1, 2]], 3]
        let inner = GroupNode::new(
            one_cycle(),
            vec![Selector::new(vec![Filter::new("inner").into()]).into()],
        );
        let wrapper = GroupNode::new(one_cycle(), vec![inner.into()]);
        let mut pattern = Pattern::default();
        pattern.children = vec![
            wrapper.into(),
            Selector::new(vec![Filter::new("outer").into()]).into(),
        ];
        let source = || {
            vec![
                Selectable::new(1, AccessRecord::new().with("inner", true)),
                Selectable::new(2, AccessRecord::new().with("inner", true)),
                Selectable::new(3, AccessRecord::new().with("outer", true)),
            ]
        };
        let mut s = scanner(pattern);
        s.refresh(&source, &truthy_field);
        s.next();
        assert_eq!(marked(&s), vec![1, 2]);

        assert_eq!(s.activate(&mut no_rules), Activation::Descended);
        assert_eq!(s.frames().len(), 2);
        assert_eq!(s.frames()[1].path(), &[0, 0]);
        assert_eq!(current_id(&s), Some(1));
    }

    #[test]
    fn activate_leaf_prefers_callback_then_rules() {
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let source = move || {
            let counter = Rc::clone(&counter);
            vec![
                Selectable::new(
                    1,
                    AccessRecord::new().with_action(move || counter.set(counter.get() + 1)),
                ),
                Selectable::new(
                    2,
                    AccessRecord::new()
                        .with("ComponentName", "speech")
                        .with("label", "hello"),
                ),
            ]
        };
        let calls: RefCell<Vec<(String, String)>> = RefCell::new(Vec::new());
        let mut rules = |component: &str, event: &str, _: &AccessRecord| {
            calls
                .borrow_mut()
                .push((component.to_string(), event.to_string()));
        };

        let mut s = scanner(Pattern::default());
        s.refresh(&source, &never);
        s.next();
        assert_eq!(s.activate(&mut rules), Activation::Callback);
        assert_eq!(hits.get(), 1);
        // Activation re-cues the same leaf and does not advance.
        assert_eq!(current_id(&s), Some(1));
        assert_eq!(marked(&s), vec![1]);

        s.next();
        assert_eq!(s.activate(&mut rules), Activation::Rules);
        assert_eq!(
            calls.borrow().as_slice(),
            &[("speech".to_string(), PRESS.to_string())]
        );
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn set_current_moves_cursor_or_unsets_it() {
        let mut s = scanner(rows_pattern());
        s.refresh(&grid, &never);
        s.set_current(&5);
        assert_eq!(s.frames()[0].index(), Some(1));
        s.next();
        assert_eq!(s.frames()[0].index(), Some(0));

        s.set_current(&42);
        assert_eq!(s.frames()[0].index(), None);
        assert!(s.current().is_none());
        s.next();
        assert_eq!(s.frames()[0].index(), Some(0));
    }

    #[test]
    fn empty_targets_are_inert() {
        let mut pattern = Pattern::default();
        pattern
            .children
            .push(Selector::new(vec![Filter::new("x").into()]).into());
        let mut s = scanner(pattern);
        let outcome = s.refresh(&flat(3), &never);
        assert_eq!(outcome, RefreshOutcome::RESET | RefreshOutcome::EMPTY);
        s.next();
        assert_eq!(s.frames()[0].index(), None);
        assert!(s.current().is_none());
        assert_eq!(s.activate(&mut no_rules), Activation::Nothing);
        assert!(s.highlighter().is_empty());
    }

    #[test]
    fn unchanged_structure_keeps_position() {
        let mut s = scanner(rows_pattern());
        s.refresh(&grid, &never);
        s.next();
        s.next();
        s.activate(&mut no_rules);
        s.next();
        let ticket = s.ticket();

        let outcome = s.refresh(&grid, &never);
        assert_eq!(outcome, RefreshOutcome::empty());
        assert_eq!(s.frames().len(), 2);
        assert_eq!(current_id(&s), Some(5));
        assert_eq!(s.ticket(), ticket);

        // Setting an equal pattern is not a structural change either.
        s.set_pattern(rows_pattern());
        assert_eq!(s.refresh(&grid, &never), RefreshOutcome::empty());
    }

    #[test]
    fn structural_change_resets_and_invalidates_tickets() {
        let mut s = scanner(rows_pattern());
        s.refresh(&grid, &never);
        s.next();
        let ticket = s.ticket();

        let mut edited = rows_pattern();
        edited.props.cycles = DEFAULT_CYCLES;
        s.set_pattern(edited);
        assert_ne!(s.ticket(), ticket);
        assert_eq!(s.refresh(&grid, &never), RefreshOutcome::RESET);
        assert_eq!(s.frames()[0].index(), None);

        let stale = s.dispatch_if_current(ticket, ScanInput::Next, &mut no_rules);
        assert!(stale.is_none());
        assert_eq!(s.frames()[0].index(), None);
        let fresh = s.ticket();
        assert_eq!(
            s.dispatch_if_current(fresh, ScanInput::Next, &mut no_rules),
            Some(None)
        );
        assert_eq!(s.frames()[0].index(), Some(0));
    }

    #[test]
    fn shrinking_content_trims_stale_frames() {
        let mut s = scanner(rows_pattern());
        s.refresh(&grid, &never);
        s.next();
        s.next();
        s.activate(&mut no_rules);
        let ticket = s.ticket();

        // The second row disappears. Its keys are gone, so the root cursor
        // loses its place and the frame inside the row is dropped.
        let first_row = || grid().into_iter().take(3).collect::<Vec<_>>();
        let outcome = s.refresh(&first_row, &never);
        assert_eq!(outcome, RefreshOutcome::TRIMMED);
        assert_eq!(s.frames().len(), 1);
        assert_ne!(s.ticket(), ticket);
        // A single row group flattens, so the root now holds the keys.
        assert_eq!(s.targets().members.len(), 3);
        assert_eq!(s.frames()[0].index(), None);
        assert!(s.current().is_none());
        assert!(s.highlighter().is_empty());
    }

    #[test]
    fn removing_an_earlier_row_keeps_the_cursor_on_its_key() {
        let mut s = scanner(rows_pattern());
        s.refresh(&|| keys_in_rows(1..=9), &never);
        s.next();
        s.next();
        s.activate(&mut no_rules);
        s.next();
        assert_eq!(current_id(&s), Some(5));
        let ticket = s.ticket();

        let outcome = s.refresh(&|| keys_in_rows(4..=9), &never);
        assert_eq!(outcome, RefreshOutcome::MOVED);
        assert_eq!(s.frames()[0].index(), Some(0));
        assert_eq!(s.frames()[1].path(), &[0]);
        assert_eq!(current_id(&s), Some(5));
        assert_eq!(marked(&s), vec![5]);

        // The pending timer still refers to the key on screen.
        let mut pressed = Vec::new();
        let mut rules = |_: &str, _: &str, access: &AccessRecord| {
            pressed.push(access.get("name").map(ToString::to_string));
        };
        let fired = s.dispatch_if_current(ticket, ScanInput::Activate, &mut rules);
        assert_eq!(fired, Some(Some(Activation::Rules)));
        assert_eq!(pressed, vec![Some("5".to_string())]);
    }

    #[test]
    fn removing_the_current_key_invalidates_pending_tickets() {
        let mut s = scanner(rows_pattern());
        s.refresh(&|| keys_in_rows(1..=9), &never);
        s.next();
        s.next();
        s.activate(&mut no_rules);
        s.next();
        let ticket = s.ticket();

        let outcome = s.refresh(&|| keys_in_rows((1..=9).filter(|&i| i != 5)), &never);
        assert_eq!(outcome, RefreshOutcome::TRIMMED);
        // The row survives; only the cursor inside it is unset.
        assert_eq!(s.frames().len(), 2);
        assert_eq!(s.frames()[0].index(), Some(1));
        assert_eq!(s.frames()[1].index(), None);
        assert_ne!(s.ticket(), ticket);

        let stale = s.dispatch_if_current(ticket, ScanInput::Activate, &mut no_rules);
        assert!(stale.is_none());
        s.next();
        assert_eq!(current_id(&s), Some(4));
    }

    #[test]
    fn ticket_spans_moves_within_an_epoch() {
        let mut s = scanner(rows_pattern());
        s.refresh(&grid, &never);
        let ticket = s.ticket();
        s.next();
        s.activate(&mut no_rules);
        s.next();
        assert_eq!(s.ticket(), ticket);
        s.reset();
        assert_ne!(s.ticket(), ticket);
    }

    #[test]
    fn disabled_preservation_always_resets() {
        let config = ScanConfig {
            preserve_position: false,
            ..ScanConfig::default()
        };
        let mut s = Scanner::new(Pattern::default(), CueMarkers::new(), config);
        s.refresh(&flat(3), &never);
        s.next();
        assert_eq!(s.refresh(&flat(3), &never), RefreshOutcome::RESET);
        assert_eq!(s.frames()[0].index(), None);
    }

    #[test]
    fn singleton_policy_reaches_group_by() {
        let first_row = || grid().into_iter().take(3).collect::<Vec<_>>();
        let config = ScanConfig {
            singleton_groups: SingletonGroups::Keep,
            ..ScanConfig::default()
        };
        let mut s = Scanner::new(rows_pattern(), CueMarkers::new(), config);
        s.refresh(&first_row, &never);
        assert_eq!(s.targets().members.len(), 1);
        assert!(s.targets().members[0].as_group().is_some());
    }

    #[test]
    fn clear_cue_sweeps_foreign_markers() {
        let mut s = scanner(Pattern::default());
        s.highlighter_mut().set_cue(99, &Cue::Group);
        s.refresh(&flat(2), &never);
        assert!(s.highlighter().get(&99).is_none());
        s.next();
        s.highlighter_mut().set_cue(98, &Cue::Group);
        s.clear_cue();
        assert!(s.highlighter().is_empty());
    }

    #[test]
    fn reset_restarts_from_root() {
        let mut s = scanner(rows_pattern());
        s.refresh(&grid, &never);
        s.next();
        s.activate(&mut no_rules);
        let before = s.ticket();
        s.reset();
        assert_eq!(s.frames().len(), 1);
        assert_eq!(s.frames()[0].index(), None);
        assert_ne!(s.ticket(), before);
    }
}
