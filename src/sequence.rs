//! Ordered double-ended sequence.

use std::collections::VecDeque;
use std::fmt;
use std::iter::Rev;

use crate::{PoolError, Result};

/// A sequence with defined first and last elements that grows at either end.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sequenced<T> {
    items: VecDeque<T>,
}

impl<T> Sequenced<T> {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::collections::vec_deque::Iter<'_, T> {
        self.items.iter()
    }

    /// Last-to-first view, no copying.
    pub fn reversed(&self) -> Rev<std::collections::vec_deque::Iter<'_, T>> {
        self.items.iter().rev()
    }

    pub fn first(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn get_first(&self) -> Result<&T> {
        self.first().ok_or(PoolError::EmptySequence)
    }

    pub fn get_last(&self) -> Result<&T> {
        self.last().ok_or(PoolError::EmptySequence)
    }

    pub fn add_first(&mut self, value: T) {
        self.items.push_front(value);
    }

    pub fn add_last(&mut self, value: T) {
        self.items.push_back(value);
    }

    pub fn remove_first(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn remove_last(&mut self) -> Option<T> {
        self.items.pop_back()
    }
}

impl<T: Clone> Sequenced<T> {
    pub fn to_reversed(&self) -> Sequenced<T> {
        self.reversed().cloned().collect()
    }
}

impl<T> FromIterator<T> for Sequenced<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T> IntoIterator for Sequenced<T> {
    type Item = T;
    type IntoIter = std::collections::vec_deque::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Sequenced<T> {
    type Item = &'a T;
    type IntoIter = std::collections::vec_deque::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Renders as `[a, b, c]`.
impl<T: fmt::Display> fmt::Display for Sequenced<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", item)?;
        }
        f.write_str("]")
    }
}

/// The demo walk-through: initial, reversed, first, last, then both ends extended.
pub fn demo() -> Result<Vec<String>> {
    let mut list: Sequenced<String> = ["Alpha", "Bravo", "Charlie", "Delta"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut lines = vec![
        format!("Initial list: {}", list),
        format!("Reversed list: {}", list.to_reversed()),
        format!("First item: {}", list.get_first()?),
        format!("Last item: {}", list.get_last()?),
    ];

    list.add_first("Before Alpha".to_string());
    list.add_last("After Delta".to_string());
    lines.push(format!("Added new first and last item: {}", list));
    Ok(lines)
}
