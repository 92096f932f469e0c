// SPDX-License-Identifier: MIT

//! Graph building blocks: nodes, routing keys and edges

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use crate::adk::error::Result;
use crate::gateway::state::{AgentState, Intent, OutputQuality, StateUpdate};

/// Marker for the virtual node a run starts from
pub const START: &str = "__start__";
/// Marker for the virtual node that ends a run
pub const END: &str = "__end__";

/// A named processing step.
///
/// Nodes read the current state and return a partial update. Backend
/// failures are handled inside the node; an `Err` aborts the whole run.
#[async_trait]
pub trait Node: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, state: &AgentState) -> Result<StateUpdate>;
}

/// A closed set of keys a routing function can return.
///
/// Listing every variant lets the builder prove at compile time that each
/// possible key has a declared successor.
pub trait Branch: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    fn variants() -> &'static [Self];
}

impl Branch for Intent {
    fn variants() -> &'static [Self] {
        &Intent::ALL
    }
}

impl Branch for OutputQuality {
    fn variants() -> &'static [Self] {
        &OutputQuality::ALL
    }
}

/// Type-erased routing function
pub(crate) type RouteFn = Arc<dyn Fn(&AgentState) -> Option<String> + Send + Sync>;

/// Outgoing edge of a node
#[derive(Clone)]
pub(crate) enum Edge {
    /// Always continue with the named node
    Direct(String),
    /// Evaluate a routing function against the merged state
    Conditional(ConditionalEdge),
}

#[derive(Clone)]
pub(crate) struct ConditionalEdge {
    pub route: RouteFn,
    /// Every successor the routing function can select
    pub targets: Vec<String>,
    /// Branch variants with no declared successor
    pub unmapped: Vec<String>,
}

impl ConditionalEdge {
    pub fn new<B, F>(router: F, paths: &[(B, &str)]) -> Self
    where
        B: Branch,
        F: Fn(&AgentState) -> B + Send + Sync + 'static,
    {
        let table: HashMap<B, String> = paths
            .iter()
            .map(|(key, target)| (*key, target.to_string()))
            .collect();

        let unmapped = B::variants()
            .iter()
            .filter(|key| !table.contains_key(*key))
            .map(|key| format!("{:?}", key))
            .collect();

        let mut targets: Vec<String> = Vec::new();
        for (_, target) in paths {
            if !targets.iter().any(|t| t == target) {
                targets.push(target.to_string());
            }
        }

        let route: RouteFn = Arc::new(move |state: &AgentState| table.get(&router(state)).cloned());

        Self {
            route,
            targets,
            unmapped,
        }
    }
}

impl Edge {
    /// All successors this edge can lead to
    pub fn targets(&self) -> Vec<&str> {
        match self {
            Edge::Direct(to) => vec![to.as_str()],
            Edge::Conditional(cond) => cond.targets.iter().map(|t| t.as_str()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Coin {
        Heads,
        Tails,
    }

    impl Branch for Coin {
        fn variants() -> &'static [Self] {
            &[Coin::Heads, Coin::Tails]
        }
    }

    #[test]
    fn test_conditional_edge_routes_through_table() {
        let edge = ConditionalEdge::new(
            |state: &AgentState| {
                if state.is_blocked {
                    Coin::Heads
                } else {
                    Coin::Tails
                }
            },
            &[(Coin::Heads, "a"), (Coin::Tails, "b")],
        );

        let mut state = AgentState::new("q");
        assert_eq!((edge.route)(&state), Some("b".to_string()));
        state.is_blocked = true;
        assert_eq!((edge.route)(&state), Some("a".to_string()));
        assert!(edge.unmapped.is_empty());
    }

    #[test]
    fn test_conditional_edge_reports_unmapped_variants() {
        let edge = ConditionalEdge::new(|_: &AgentState| Coin::Heads, &[(Coin::Heads, "a")]);
        assert_eq!(edge.unmapped, vec!["Tails".to_string()]);
    }

    #[test]
    fn test_targets_are_deduplicated() {
        let edge = Edge::Conditional(ConditionalEdge::new(
            |_: &AgentState| Coin::Heads,
            &[(Coin::Heads, "same"), (Coin::Tails, "same")],
        ));
        assert_eq!(edge.targets(), vec!["same"]);
    }

    #[test]
    fn test_intent_variants_are_complete() {
        assert_eq!(Intent::variants().len(), 4);
        assert_eq!(OutputQuality::variants().len(), 3);
    }
}
