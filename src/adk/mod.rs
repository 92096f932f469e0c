// SPDX-License-Identifier: MIT

//! Agent development kit: model clients, the tool contract and error types.

pub mod error;
pub mod model;
pub mod tool;
