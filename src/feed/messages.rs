//! Live-score provider message types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::errors::{EngineError, Result};
use crate::common::types::RawMatchUpdate;

/// One match entry in a live-events push
///
/// The provider sends a JSON array of these on every update. `event_key` is
/// sometimes a number and sometimes a string, so it is kept as a raw value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveEventRecord {
    #[serde(default)]
    pub event_key: Option<serde_json::Value>,
    #[serde(default)]
    pub event_home_team: Option<String>,
    #[serde(default)]
    pub event_away_team: Option<String>,
    #[serde(default)]
    pub event_final_result: Option<String>,
    #[serde(default)]
    pub event_status: Option<String>,
}

impl LiveEventRecord {
    /// Match key as a string, if present and scalar
    pub fn match_id(&self) -> Option<String> {
        match self.event_key.as_ref()? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Convert into a raw update; records without a key or score are malformed
    pub fn into_update(self, observed_at: DateTime<Utc>) -> Result<RawMatchUpdate> {
        let match_id = self
            .match_id()
            .ok_or_else(|| EngineError::MalformedSnapshot("missing event_key".to_string()))?;
        let score = self.event_final_result.ok_or_else(|| {
            EngineError::MalformedSnapshot(format!("match {} has no event_final_result", match_id))
        })?;

        Ok(RawMatchUpdate {
            match_id,
            home_team: self.event_home_team.unwrap_or_else(|| "Unknown".to_string()),
            away_team: self.event_away_team.unwrap_or_else(|| "Unknown".to_string()),
            score,
            status: self.event_status.unwrap_or_default(),
            observed_at,
        })
    }
}

/// Decode one websocket text frame into per-match results
///
/// A frame that is not JSON at all is an error. Inside a valid frame each
/// record is decoded independently so one bad entry does not drop the rest.
/// A single object is accepted as a one-element batch.
pub fn parse_live_events(
    text: &str,
    observed_at: DateTime<Utc>,
) -> Result<Vec<Result<RawMatchUpdate>>> {
    let value: serde_json::Value = serde_json::from_str(text)?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(_) => vec![value],
        other => {
            return Err(EngineError::InvalidResponse(format!(
                "unexpected live events payload: {}",
                other
            )))
        }
    };

    Ok(items
        .into_iter()
        .map(|item| {
            serde_json::from_value::<LiveEventRecord>(item)
                .map_err(EngineError::from)
                .and_then(|record| record.into_update(observed_at))
        })
        .collect())
}
