// SPDX-License-Identifier: MIT

use crate::adk::error::Result;
use crate::adk::tool::Tool;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::{json, Value};

pub const DEFAULT_OFFSET_HOURS: i32 = 9;

static DATETIME_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "timezone_offset": {
                "type": "integer",
                "description": "Hours from UTC, between -12 and 14 (default 9, Korea)"
            }
        }
    })
});

#[derive(Debug, Default, Deserialize)]
struct DateTimeArgs {
    #[serde(default)]
    timezone_offset: Option<i32>,
}

/// Render `now` in the given UTC offset
pub fn format_datetime(now: DateTime<Utc>, offset_hours: i32) -> Option<String> {
    if !(-12..=14).contains(&offset_hours) {
        return None;
    }
    let tz = FixedOffset::east_opt(offset_hours * 3600)?;
    let local = now.with_timezone(&tz);

    Some(format!(
        "Current time (UTC{:+})\nDate: {} {}\nTime: {}",
        offset_hours,
        local.format("%Y-%m-%d"),
        local.format("%A"),
        local.format("%H:%M:%S")
    ))
}

pub struct DateTimeTool;

#[async_trait]
impl Tool for DateTimeTool {
    fn name(&self) -> &str {
        "get_datetime"
    }

    fn description(&self) -> &str {
        "Returns the current date, weekday and time for a UTC offset in hours (default 9)."
    }

    fn schema(&self) -> &Value {
        &DATETIME_SCHEMA
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let args: DateTimeArgs = if input.is_null() {
            DateTimeArgs::default()
        } else {
            serde_json::from_value(input)?
        };
        let offset = args.timezone_offset.unwrap_or(DEFAULT_OFFSET_HOURS);

        Ok(format_datetime(Utc::now(), offset).unwrap_or_else(|| {
            format!("Invalid timezone offset {}: expected -12 to 14", offset)
        }))
    }
}
