// SPDX-License-Identifier: MIT

//! The gateway: guards, intent classification, specialised pipelines and a
//! bounded retry loop, wired together as a state graph.

pub mod agent;
pub mod config;
pub mod graph;
pub mod nodes;
pub mod pipelines;
pub mod state;
pub mod tools;

pub use agent::{create_graph, create_model, Gateway};
pub use config::{GatewaySettings, GuardConfig, Provider};
pub use state::{AgentState, StateUpdate};
