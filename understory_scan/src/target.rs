// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scan targets: leaves ([`Selectable`]) and composites ([`Group`]).

use alloc::string::String;
use alloc::vec::Vec;
use core::num::NonZeroU32;

use crate::access::AccessRecord;
use crate::cue::{Cue, Highlighter};

/// Default number of passes through a group before it is considered exhausted.
pub const DEFAULT_CYCLES: NonZeroU32 = match NonZeroU32::new(2) {
    Some(n) => n,
    None => unreachable!(),
};

/// A leaf target: an element handle plus its access record.
///
/// Identity is the handle `K`; two selectables with the same handle are the
/// same element even if their records differ.
#[derive(Clone, Debug)]
pub struct Selectable<K> {
    /// Handle of the interactive element in the host UI.
    pub element: K,
    /// Metadata consulted by operators and activation.
    pub access: AccessRecord,
}

impl<K> Selectable<K> {
    /// Wrap an element handle and its record.
    pub fn new(element: K, access: AccessRecord) -> Self {
        Self { element, access }
    }
}

/// Cycling and cueing properties of a [`Group`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupProps {
    /// Authored name, possibly empty.
    pub name: String,
    /// Passes through the members before the group is exhausted.
    pub cycles: NonZeroU32,
    /// Style applied to every leaf when the group as a whole is cued.
    pub cue: Cue,
}

impl Default for GroupProps {
    fn default() -> Self {
        Self {
            name: String::new(),
            cycles: DEFAULT_CYCLES,
            cue: Cue::Group,
        }
    }
}

/// Anything a scanner can position its cursor on.
#[derive(Clone, Debug)]
pub enum Target<K> {
    /// A single interactive element.
    Selectable(Selectable<K>),
    /// A nested group of targets.
    Group(Group<K>),
}

impl<K: Copy + Eq> Target<K> {
    /// Returns the group if this target is one.
    pub fn as_group(&self) -> Option<&Group<K>> {
        match self {
            Self::Group(g) => Some(g),
            Self::Selectable(_) => None,
        }
    }

    /// Returns the selectable if this target is one.
    pub fn as_selectable(&self) -> Option<&Selectable<K>> {
        match self {
            Self::Selectable(s) => Some(s),
            Self::Group(_) => None,
        }
    }

    /// Apply `cue` to this target: one mark for a leaf, one mark per leaf for a group.
    pub fn cue<H: Highlighter<K> + ?Sized>(&self, cue: &Cue, highlighter: &mut H) {
        match self {
            Self::Selectable(s) => highlighter.set_cue(s.element, cue),
            Self::Group(g) => g.cue(cue, highlighter),
        }
    }
}

impl<K> From<Selectable<K>> for Target<K> {
    fn from(value: Selectable<K>) -> Self {
        Self::Selectable(value)
    }
}

impl<K> From<Group<K>> for Target<K> {
    fn from(value: Group<K>) -> Self {
        Self::Group(value)
    }
}

/// An ordered list of targets scanned `cycles` times.
///
/// The logical [`length`](Group::len) is `members.len() * cycles`; indices
/// past the member count wrap back onto the members, so cycling changes how
/// long a group holds the cursor, not which members it offers.
///
/// ```rust
/// use core::num::NonZeroU32;
/// use understory_scan::{AccessRecord, Group, GroupProps, Selectable, Target};
///
/// let members: Vec<Target<u32>> = (1..=3)
///     .map(|id| Selectable::new(id, AccessRecord::new()).into())
///     .collect();
/// let props = GroupProps { cycles: NonZeroU32::new(2).unwrap(), ..GroupProps::default() };
/// let group = Group::new(members, props);
///
/// assert_eq!(group.len(), 6);
/// assert_eq!(group.member(4).and_then(|t| t.as_selectable()).map(|s| s.element), Some(2));
/// assert!(group.member(6).is_none());
/// ```
#[derive(Clone, Debug)]
pub struct Group<K> {
    /// Members in scan order.
    pub members: Vec<Target<K>>,
    /// Cycling and cueing properties.
    pub props: GroupProps,
}

impl<K> Default for Group<K> {
    fn default() -> Self {
        Self {
            members: Vec::new(),
            props: GroupProps::default(),
        }
    }
}

impl<K: Copy + Eq> Group<K> {
    /// Create a group.
    pub fn new(members: Vec<Target<K>>, props: GroupProps) -> Self {
        Self { members, props }
    }

    /// Logical length: member count times cycles.
    pub fn len(&self) -> usize {
        self.members
            .len()
            .saturating_mul(self.props.cycles.get() as usize)
    }

    /// Returns `true` if the group has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member at a logical index, or `None` outside `0..len()`.
    pub fn member(&self, index: usize) -> Option<&Target<K>> {
        if index >= self.len() {
            return None;
        }
        self.members.get(index % self.members.len())
    }

    /// Position of `element` among the direct members.
    ///
    /// Direct members are checked first. Otherwise each sub-group is searched
    /// left to right, and the index of the direct member that contains the
    /// element is returned.
    pub fn index_of(&self, element: &K) -> Option<usize> {
        let direct = self.members.iter().position(|m| match m {
            Target::Selectable(s) => s.element == *element,
            Target::Group(_) => false,
        });
        if direct.is_some() {
            return direct;
        }
        self.members.iter().position(|m| match m {
            Target::Group(g) => g.index_of(element).is_some(),
            Target::Selectable(_) => false,
        })
    }

    /// Every selectable reachable from this group, depth first.
    pub fn leaves(&self) -> Leaves<'_, K> {
        Leaves {
            stack: alloc::vec![self.members.iter()],
        }
    }

    /// Mark every leaf with `cue`.
    pub fn cue<H: Highlighter<K> + ?Sized>(&self, cue: &Cue, highlighter: &mut H) {
        for leaf in self.leaves() {
            highlighter.set_cue(leaf.element, cue);
        }
    }

    /// Follow a path of member indices down through nested groups.
    ///
    /// Returns `None` as soon as a step is out of range or lands on a leaf.
    pub fn descendant(&self, path: &[usize]) -> Option<&Self> {
        let mut group = self;
        for &i in path {
            group = group.members.get(i)?.as_group()?;
        }
        Some(group)
    }
}

/// Depth-first iterator over the leaves of a [`Group`].
#[derive(Debug)]
pub struct Leaves<'a, K> {
    stack: Vec<core::slice::Iter<'a, Target<K>>>,
}

impl<'a, K> Iterator for Leaves<'a, K> {
    type Item = &'a Selectable<K>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            match top.next() {
                Some(Target::Selectable(s)) => return Some(s),
                Some(Target::Group(g)) => self.stack.push(g.members.iter()),
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cue::CueMarkers;
    use alloc::vec;

    fn leaf(id: u32) -> Target<u32> {
        Selectable::new(id, AccessRecord::new()).into()
    }

    fn group(members: Vec<Target<u32>>, cycles: u32) -> Group<u32> {
        Group::new(
            members,
            GroupProps {
                cycles: NonZeroU32::new(cycles).unwrap(),
                ..GroupProps::default()
            },
        )
    }

    fn id(t: Option<&Target<u32>>) -> Option<u32> {
        t.and_then(Target::as_selectable).map(|s| s.element)
    }

    #[test]
    fn length_and_member_follow_cycles() {
        for cycles in 1..=4 {
            let g = group(vec![leaf(10), leaf(11), leaf(12)], cycles);
            assert_eq!(g.len(), 3 * cycles as usize);
            for i in 0..g.len() {
                assert_eq!(id(g.member(i)), Some(10 + (i % 3) as u32));
            }
            assert!(g.member(g.len()).is_none());
        }
    }

    #[test]
    fn empty_group_has_zero_length() {
        let g = group(vec![], 3);
        assert_eq!(g.len(), 0);
        assert!(g.is_empty());
        assert!(g.member(0).is_none());
    }

    #[test]
    fn index_of_prefers_direct_members_then_containing_child() {
        let inner = group(vec![leaf(3), leaf(4)], 1);
        let deeper = group(vec![group(vec![leaf(7)], 1).into()], 1);
        let g = group(vec![leaf(1), inner.into(), deeper.into(), leaf(5)], 2);

        assert_eq!(g.index_of(&1), Some(0));
        assert_eq!(g.index_of(&5), Some(3));
        assert_eq!(g.index_of(&4), Some(1));
        assert_eq!(g.index_of(&7), Some(2));
        assert_eq!(g.index_of(&99), None);
    }

    #[test]
    fn group_cue_reaches_every_leaf() {
        let g = group(
            vec![leaf(1), group(vec![leaf(2), leaf(3)], 1).into()],
            1,
        );
        let mut markers = CueMarkers::new();
        g.cue(&Cue::Group, &mut markers);
        assert_eq!(markers.len(), 3);
        assert_eq!(markers.get(&3), Some(&Cue::Group));
        let order: Vec<u32> = g.leaves().map(|s| s.element).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn descendant_stops_at_leaves() {
        let g = group(vec![leaf(1), group(vec![leaf(2)], 1).into()], 1);
        assert!(g.descendant(&[]).is_some());
        assert_eq!(g.descendant(&[1]).map(Group::len), Some(1));
        assert!(g.descendant(&[0]).is_none());
        assert!(g.descendant(&[5]).is_none());
    }
}
