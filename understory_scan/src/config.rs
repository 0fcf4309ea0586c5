// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host-tunable scanning policies.

/// What `GroupBy` returns when its input yields exactly one group.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SingletonGroups {
    /// Return the members of the only group directly, saving the user a
    /// pointless "select the only group" step.
    #[default]
    Flatten,
    /// Always return the list of groups, even when it has one entry.
    Keep,
}

/// Policies for a [`Scanner`](crate::Scanner) and the patterns it applies.
///
/// ```rust
/// use understory_scan::{ScanConfig, SingletonGroups};
///
/// let config = ScanConfig {
///     singleton_groups: SingletonGroups::Keep,
///     ..ScanConfig::default()
/// };
/// assert!(config.preserve_position);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ScanConfig {
    /// `GroupBy` behavior for a single resulting group.
    pub singleton_groups: SingletonGroups,
    /// Keep the cursor across refreshes while the pattern structure is
    /// unchanged. When `false`, every refresh restarts the scan.
    pub preserve_position: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            singleton_groups: SingletonGroups::Flatten,
            preserve_position: true,
        }
    }
}
