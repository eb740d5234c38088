// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Listener registry keyed by a message's tag.
//!
//! Both the WebSocket transport and the lesson action log fan values out to
//! callbacks registered per tag. Delivery is synchronous and follows
//! registration order; there is no prioritization or deduplication.

use std::collections::HashMap;
use std::hash::Hash;

/// A value that carries a payload-free discriminant usable as a listener key.
pub trait Tagged {
    /// The discriminant type.
    type Kind: Copy + Eq + Hash + std::fmt::Debug;

    /// Returns the discriminant of this value.
    fn kind(&self) -> Self::Kind;
}

/// Callback invoked with a borrowed value.
pub type Listener<M> = Box<dyn FnMut(&M) + Send>;

/// Callbacks grouped by tag, kept in registration order.
pub struct Listeners<M: Tagged> {
    by_kind: HashMap<M::Kind, Vec<Listener<M>>>,
}

impl<M: Tagged> Default for Listeners<M> {
    fn default() -> Self {
        Self {
            by_kind: HashMap::new(),
        }
    }
}

impl<M: Tagged> std::fmt::Debug for Listeners<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<&M::Kind, usize> =
            self.by_kind.iter().map(|(k, v)| (k, v.len())).collect();
        f.debug_struct("Listeners").field("by_kind", &counts).finish()
    }
}

impl<M: Tagged> Listeners<M> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for values tagged `kind`.
    pub fn add<F>(&mut self, kind: M::Kind, listener: F)
    where
        F: FnMut(&M) + Send + 'static,
    {
        self.by_kind.entry(kind).or_default().push(Box::new(listener));
    }

    /// Invokes every listener registered under `value.kind()`.
    ///
    /// Returns the number of listeners that ran.
    pub fn dispatch(&mut self, value: &M) -> usize {
        let Some(listeners) = self.by_kind.get_mut(&value.kind()) else {
            return 0;
        };

        for listener in listeners.iter_mut() {
            listener(value);
        }
        listeners.len()
    }

    /// Number of listeners registered for `kind`.
    #[must_use]
    pub fn count(&self, kind: M::Kind) -> usize {
        self.by_kind.get(&kind).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Color {
        Red,
        Blue,
        Green,
    }

    struct Paint(Color, u32);

    impl Tagged for Paint {
        type Kind = Color;

        fn kind(&self) -> Color {
            self.0
        }
    }

    #[test]
    fn test_dispatch_runs_only_matching_listeners_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::<Paint>::new();

        for label in ["first", "second", "third"] {
            let seen = seen.clone();
            listeners.add(Color::Red, move |p: &Paint| {
                if let Ok(mut seen) = seen.lock() {
                    seen.push(format!("{label}:{}", p.1));
                }
            });
        }
        let blue_seen = seen.clone();
        listeners.add(Color::Blue, move |_: &Paint| {
            if let Ok(mut seen) = blue_seen.lock() {
                seen.push("blue".to_string());
            }
        });

        assert_eq!(listeners.dispatch(&Paint(Color::Red, 7)), 3);

        let seen = seen.lock().map(|s| s.clone()).unwrap_or_default();
        assert_eq!(seen, vec!["first:7", "second:7", "third:7"]);
    }

    #[test]
    fn test_dispatch_without_listeners_is_a_no_op() {
        let mut listeners = Listeners::<Paint>::new();
        listeners.add(Color::Red, |_: &Paint| {});

        assert_eq!(listeners.dispatch(&Paint(Color::Green, 1)), 0);
        assert_eq!(listeners.count(Color::Green), 0);
        assert_eq!(listeners.count(Color::Red), 1);
    }
}
