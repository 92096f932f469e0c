// SPDX-License-Identifier: MIT

//! State-graph orchestration engine
//!
//! Nodes are registered by name; each node has exactly one outgoing edge,
//! either a fixed successor or a routing function over the merged state.
//! Execution starts at the entry point and follows edges until one leads
//! to [`END`]. Cycles are allowed; they are bounded by counters kept in the
//! state and, as a last resort, by the graph's recursion limit.

mod builder;
pub mod executor;
pub mod types;

pub use builder::{StateGraph, DEFAULT_RECURSION_LIMIT};
pub use executor::{CompiledGraph, SubgraphNode};
pub use types::{Branch, Node, END, START};
