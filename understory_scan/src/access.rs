// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Access records: the metadata a host attaches to each scannable element.
//!
//! An [`AccessRecord`] is a string-keyed map of [`Value`]s. Operators read
//! fields from it by name (see [`FieldRef`](crate::FieldRef)), and activation
//! consults it for a direct [`Action`] or forwards it to a
//! [`RuleEngine`](crate::RuleEngine).

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use core::fmt;

/// Conventional field names understood by hosts and patterns.
pub mod keys {
    /// Display name of the element.
    pub const NAME: &str = "name";
    /// Visible label.
    pub const LABEL: &str = "label";
    /// Grid row, when the element lives in a grid.
    pub const ROW: &str = "row";
    /// Grid column, when the element lives in a grid.
    pub const COLUMN: &str = "column";
    /// Page or tab the element belongs to.
    pub const PAGE: &str = "page";
    /// Set on elements that control the interface rather than content.
    pub const CONTROLS: &str = "controls";
    /// Name of the component forwarded to the rule engine on activation.
    pub const COMPONENT_NAME: &str = "ComponentName";
}

/// A single field value in an [`AccessRecord`].
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Text.
    Str(String),
    /// Integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Boolean.
    Bool(bool),
}

impl Value {
    /// Whether the value counts as present for grouping.
    ///
    /// `false`, zero, `NaN` and the empty string are falsy. The string `"0"` is
    /// truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Str(s) => !s.is_empty(),
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0 && !f.is_nan(),
            Self::Bool(b) => *b,
        }
    }

    /// Borrow the text of a [`Value::Str`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Zero-argument callback fired when a leaf is activated.
pub type Action = Rc<dyn Fn()>;

/// Metadata attached to a [`Selectable`](crate::Selectable).
///
/// Records are cheap to clone: the optional [`Action`] is reference counted.
#[derive(Clone, Default)]
pub struct AccessRecord {
    fields: BTreeMap<String, Value>,
    action: Option<Action>,
}

impl fmt::Debug for AccessRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessRecord")
            .field("fields", &self.fields)
            .field("action", &self.action.is_some())
            .finish()
    }
}

impl AccessRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Builder-style callback attachment.
    #[must_use]
    pub fn with_action(mut self, action: impl Fn() + 'static) -> Self {
        self.action = Some(Rc::new(action));
        self
    }

    /// Insert or replace a field, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    /// Remove a field.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Look up a field. Unknown keys are simply absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Iterate over all fields in key order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The direct activation callback, if any.
    pub fn action(&self) -> Option<&Action> {
        self.action.as_ref()
    }

    /// Name forwarded to the rule engine: `ComponentName`, then `name`, then empty.
    pub fn component_name(&self) -> &str {
        self.get(keys::COMPONENT_NAME)
            .or_else(|| self.get(keys::NAME))
            .and_then(Value::as_str)
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn truthiness_matches_hide_incomplete_policy() {
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("0").is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(Value::from(-3).is_truthy());
        assert!(!Value::from(0.0).is_truthy());
        assert!(!Value::from(f64::NAN).is_truthy());
        assert!(!Value::from(false).is_truthy());
        assert!(Value::from(true).is_truthy());
    }

    #[test]
    fn display_uses_plain_forms() {
        assert_eq!(format!("{}", Value::from(12)), "12");
        assert_eq!(format!("{}", Value::from(1.0)), "1");
        assert_eq!(format!("{}", Value::from(2.5)), "2.5");
        assert_eq!(format!("{}", Value::from(true)), "true");
        assert_eq!(format!("{}", Value::from("abc")), "abc");
    }

    #[test]
    fn component_name_falls_back_to_name() {
        let r = AccessRecord::new().with(keys::NAME, "speak");
        assert_eq!(r.component_name(), "speak");
        let r = r.with(keys::COMPONENT_NAME, "grid");
        assert_eq!(r.component_name(), "grid");
        assert_eq!(AccessRecord::new().component_name(), "");
    }

    #[test]
    fn debug_hides_callback_body() {
        let r = AccessRecord::new().with_action(|| {});
        let s = format!("{r:?}");
        assert!(s.contains("action: true"), "unexpected debug output {s}");
    }
}
