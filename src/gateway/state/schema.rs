// SPDX-License-Identifier: MIT

//! Closed value sets carried by the agent state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category assigned to a request by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Search,
    Analysis,
    Creative,
    #[default]
    General,
}

impl Intent {
    pub const ALL: [Intent; 4] = [
        Intent::Search,
        Intent::Analysis,
        Intent::Creative,
        Intent::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Search => "search",
            Intent::Analysis => "analysis",
            Intent::Creative => "creative",
            Intent::General => "general",
        }
    }

    /// Everything except small talk is routed to a specialised branch
    pub fn complexity(&self) -> Complexity {
        match self {
            Intent::General => Complexity::Simple,
            _ => Complexity::Complex,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    #[default]
    Simple,
    Complex,
}

/// Output guard verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputQuality {
    #[default]
    Pass,
    Retry,
    Fallback,
}

impl OutputQuality {
    pub const ALL: [OutputQuality; 3] = [
        OutputQuality::Pass,
        OutputQuality::Retry,
        OutputQuality::Fallback,
    ];
}
