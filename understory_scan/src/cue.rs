// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cue styles and the highlight registry seam.
//!
//! The scanner never draws anything. It marks elements through a
//! [`Highlighter`] supplied by the host, and clears every marker in the
//! interface before applying a new one. Only one scanner should drive a given
//! highlighter at a time.

use alloc::string::{String, ToString};
use core::fmt;
use core::hash::Hash;

use hashbrown::HashMap;

/// Key into the host's cue-style registry.
///
/// Two styles are always recognized: [`Cue::Button`] for single-leaf
/// highlighting and [`Cue::Group`] for "this whole group is a candidate".
/// Anything else is a host-defined [`Cue::Named`] style.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "String", into = "String"))]
pub enum Cue {
    /// Leaf-level highlight.
    Button,
    /// Group-level highlight.
    Group,
    /// A style registered by the host under this key.
    Named(String),
}

impl Cue {
    /// Parse a registry key.
    pub fn from_key(key: &str) -> Self {
        match key {
            "button" => Self::Button,
            "group" => Self::Group,
            other => Self::Named(other.to_string()),
        }
    }

    /// The registry key for this style.
    pub fn key(&self) -> &str {
        match self {
            Self::Button => "button",
            Self::Group => "group",
            Self::Named(k) => k,
        }
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl From<String> for Cue {
    fn from(value: String) -> Self {
        Self::from_key(&value)
    }
}

impl From<Cue> for String {
    fn from(value: Cue) -> Self {
        match value {
            Cue::Named(k) => k,
            other => other.key().to_string(),
        }
    }
}

/// UI-wide highlight registry.
///
/// `clear_cues` is a global sweep: it must remove the marker from every
/// element in the interface, not only from elements this scanner marked.
pub trait Highlighter<K> {
    /// Mark `element` with `cue`.
    fn set_cue(&mut self, element: K, cue: &Cue);

    /// Remove every marker.
    fn clear_cues(&mut self);
}

impl<K, H: Highlighter<K> + ?Sized> Highlighter<K> for &mut H {
    fn set_cue(&mut self, element: K, cue: &Cue) {
        (**self).set_cue(element, cue);
    }

    fn clear_cues(&mut self) {
        (**self).clear_cues();
    }
}

/// A [`Highlighter`] that records markers in a map.
///
/// Useful as the marker store of a retained UI, and in tests.
#[derive(Clone, Debug)]
pub struct CueMarkers<K> {
    marks: HashMap<K, Cue>,
}

impl<K> Default for CueMarkers<K> {
    fn default() -> Self {
        Self {
            marks: HashMap::new(),
        }
    }
}

impl<K: Copy + Eq + Hash> CueMarkers<K> {
    /// Create an empty marker set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cue currently set on `element`.
    pub fn get(&self, element: &K) -> Option<&Cue> {
        self.marks.get(element)
    }

    /// Number of marked elements.
    pub fn len(&self) -> usize {
        self.marks.len()
    }

    /// Returns `true` when nothing is marked.
    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Iterate over marked elements in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &Cue)> + '_ {
        self.marks.iter().map(|(k, c)| (*k, c))
    }
}

impl<K: Copy + Eq + Hash> Highlighter<K> for CueMarkers<K> {
    fn set_cue(&mut self, element: K, cue: &Cue) {
        self.marks.insert(element, cue.clone());
    }

    fn clear_cues(&mut self) {
        self.marks.clear();
    }
}
