//! Condition expressions for conditional writes.

use crate::item::{AttributeValue, Item};
use std::cmp::Ordering;

/// Comparison operator between a stored attribute and a literal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

/// A predicate over the currently stored item.
///
/// Backends evaluate the condition and apply the write as one atomic step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    /// No item is stored under the key.
    NotExists,
    /// `stored.attribute <op> value`. False when there is no stored item,
    /// the attribute is missing, or the types differ.
    Compare {
        attribute: String,
        op: CompareOp,
        value: AttributeValue,
    },
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

impl Condition {
    /// Shorthand for [`Condition::Compare`].
    pub fn compare(attribute: impl Into<String>, op: CompareOp, value: AttributeValue) -> Self {
        Self::Compare {
            attribute: attribute.into(),
            op,
            value,
        }
    }

    /// Both conditions hold.
    pub fn and(self, other: Condition) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    /// Either condition holds.
    pub fn or(self, other: Condition) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    /// Evaluate against the stored item, if any.
    pub fn evaluate(&self, stored: Option<&Item>) -> bool {
        match self {
            Self::NotExists => stored.is_none(),
            Self::Compare {
                attribute,
                op,
                value,
            } => stored
                .and_then(|item| item.get(attribute))
                .and_then(|current| compare_values(current, value))
                .is_some_and(|ordering| op.holds(ordering)),
            Self::And(a, b) => a.evaluate(stored) && b.evaluate(stored),
            Self::Or(a, b) => a.evaluate(stored) || b.evaluate(stored),
        }
    }
}

fn compare_values(stored: &AttributeValue, literal: &AttributeValue) -> Option<Ordering> {
    match (stored, literal) {
        (AttributeValue::N(a), AttributeValue::N(b)) => Some(a.cmp(b)),
        (AttributeValue::S(a), AttributeValue::S(b)) => Some(a.cmp(b)),
        (AttributeValue::B(a), AttributeValue::B(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(time: i64) -> Item {
        Item::new("r").with("UpdateTime", AttributeValue::N(time))
    }

    fn not_newer_than(time: i64) -> Condition {
        Condition::NotExists.or(Condition::compare(
            "UpdateTime",
            CompareOp::Le,
            AttributeValue::N(time),
        ))
    }

    #[test]
    fn test_not_exists() {
        assert!(Condition::NotExists.evaluate(None));
        assert!(!Condition::NotExists.evaluate(Some(&stored(1))));
    }

    #[test]
    fn test_not_exists_or_not_newer() {
        let condition = not_newer_than(200);
        assert!(condition.evaluate(None));
        assert!(condition.evaluate(Some(&stored(100))));
        assert!(condition.evaluate(Some(&stored(200))));
        assert!(!condition.evaluate(Some(&stored(300))));
    }

    #[test]
    fn test_compare_on_missing_or_mistyped_attribute_is_false() {
        let condition = Condition::compare("UpdateTime", CompareOp::Le, AttributeValue::N(5));
        assert!(!condition.evaluate(None));
        assert!(!condition.evaluate(Some(&Item::new("r"))));

        let mistyped = Item::new("r").with("UpdateTime", AttributeValue::S("5".to_string()));
        assert!(!condition.evaluate(Some(&mistyped)));
    }

    #[test]
    fn test_and_requires_both() {
        let condition = Condition::compare("UpdateTime", CompareOp::Eq, AttributeValue::N(1)).and(
            Condition::compare("Version", CompareOp::Le, AttributeValue::S("b".to_string())),
        );
        let item = stored(1).with("Version", AttributeValue::S("a".to_string()));
        assert!(condition.evaluate(Some(&item)));
        let item = stored(1).with("Version", AttributeValue::S("c".to_string()));
        assert!(!condition.evaluate(Some(&item)));
    }
}
