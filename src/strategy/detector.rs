//! Goal detection over successive match snapshots

use chrono::Utc;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::common::errors::{EngineError, Result};
use crate::common::types::{GoalEvent, MatchState, RawMatchUpdate, ScoringSide};

/// Parse provider score text such as `2 - 1` or `2-1`
pub fn parse_score(text: &str) -> Result<(u32, u32)> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let mut parts = compact.split('-');

    match (parts.next(), parts.next(), parts.next()) {
        (Some(home), Some(away), None) => {
            let home = home.parse().map_err(|_| bad_score(text))?;
            let away = away.parse().map_err(|_| bad_score(text))?;
            Ok((home, away))
        }
        _ => Err(bad_score(text)),
    }
}

fn bad_score(text: &str) -> EngineError {
    EngineError::MalformedSnapshot(format!("unparseable score {:?}", text))
}

/// Match minute from the provider status text
///
/// Uses the leading digits: `67'` → 67, `45+2'` → 45. Anything without a
/// leading number (`Half Time`, `Finished`, empty) is 0.
pub fn parse_minute(status: &str) -> u32 {
    let digits: String = status
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

/// Emits a [`GoalEvent`] whenever a match's score tuple changes
///
/// Holds the last seen score per match. Processing takes `&mut self`, so one
/// owner task serializes every snapshot, and with it every match.
#[derive(Debug, Default)]
pub struct SignalDetector {
    last_scores: HashMap<String, (u32, u32)>,
}

impl SignalDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw feed record and process it
    ///
    /// An unparseable score drops the record without touching stored state.
    pub fn process_raw(&mut self, update: &RawMatchUpdate) -> Option<GoalEvent> {
        let (home_score, away_score) = match parse_score(&update.score) {
            Ok(score) => score,
            Err(e) => {
                debug!("Skipping snapshot for match {}: {}", update.match_id, e);
                return None;
            }
        };

        self.process(&MatchState {
            match_id: update.match_id.clone(),
            home_team: update.home_team.clone(),
            away_team: update.away_team.clone(),
            home_score,
            away_score,
            status: update.status.clone(),
            observed_at: update.observed_at,
        })
    }

    /// Process a snapshot, returning a goal if the score changed
    pub fn process(&mut self, snapshot: &MatchState) -> Option<GoalEvent> {
        let current = snapshot.score();
        let previous = self
            .last_scores
            .insert(snapshot.match_id.clone(), current)?;

        if previous == current {
            return None;
        }

        let (prev_home, prev_away) = previous;
        let scoring_side = if current.0 > prev_home {
            ScoringSide::Home
        } else {
            if current.1 <= prev_away {
                warn!(
                    "Anomalous score change for match {}: {:?} -> {:?}, attributing to AWAY",
                    snapshot.match_id, previous, current
                );
            }
            ScoringSide::Away
        };

        let scorer = match scoring_side {
            ScoringSide::Home => snapshot.home_team.clone(),
            ScoringSide::Away => snapshot.away_team.clone(),
        };

        Some(GoalEvent {
            match_id: snapshot.match_id.clone(),
            scoring_side,
            scorer,
            score_after: current,
            detected_at: Utc::now(),
            minute: parse_minute(&snapshot.status),
        })
    }

    /// Last stored score for a match
    pub fn last_score(&self, match_id: &str) -> Option<(u32, u32)> {
        self.last_scores.get(match_id).copied()
    }

    /// Number of matches seen so far
    pub fn tracked_matches(&self) -> usize {
        self.last_scores.len()
    }
}
