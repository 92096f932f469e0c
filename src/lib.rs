// SPDX-License-Identifier: MIT

//! Intent-routing agent gateway.
//!
//! [`adk`] holds the model and tool contracts with their provider clients;
//! [`gateway`] holds the state-graph engine and the gateway graph built on it.

pub mod adk;
pub mod gateway;
