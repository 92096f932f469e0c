// SPDX-License-Identifier: MIT

//! State management for the gateway graph
//!
//! This module provides:
//! - `AgentState` - the record threaded through every node
//! - `StateUpdate` - the partial update a node returns
//! - `Intent`, `Complexity`, `OutputQuality` - the closed value sets

mod schema;
mod store;

pub use schema::{Complexity, Intent, OutputQuality};
pub use store::{AgentState, StateUpdate};
