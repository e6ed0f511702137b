use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// One measurable sub-goal carrying a weighted share of the day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyResult {
    pub content: String,
    /// Percentage share, 0-100.  Weights of a goal sum to exactly 100
    /// whenever at least one key result exists.
    pub weight: u8,
    #[serde(default)]
    pub completed: bool,
    /// `HH:MM` stamp, present only while `completed` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<String>,
}

impl KeyResult {
    pub fn new(content: impl Into<String>, weight: u8) -> Self {
        Self {
            content: content.into(),
            weight,
            completed: false,
            completion_time: None,
        }
    }
}

/// A single day's objective plus its ordered key results.
///
/// The order of `key_results` is meaningful: it is the display and storage
/// order, `KR<n>` numbering follows it, and the rebalancing remainder lands
/// on whichever entry is last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    /// Day key, `YYYY-MM-DD`.  Doubles as the file stem on disk.
    pub date: String,
    pub objective: String,
    pub key_results: Vec<KeyResult>,
}

impl Goal {
    /// Share of the day already done: the summed weight of completed KRs.
    pub fn progress(&self) -> u8 {
        let done: u32 = self
            .key_results
            .iter()
            .filter(|kr| kr.completed)
            .map(|kr| u32::from(kr.weight))
            .sum();
        done.min(100) as u8
    }
}

/// Caller-supplied replacement fields for a single key result.
///
/// Used by the one mutation that does not rebalance: the weight here is
/// written as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KrPatch {
    pub content: String,
    pub weight: u8,
    pub completed: bool,
    #[serde(default)]
    pub completion_time: Option<String>,
}

/// Even weight split for `n` key results: every entry gets ⌊100/n⌋ and the
/// last also takes the remainder, so the sum is exactly 100.
///
/// The remainder landing on whichever KR is currently last is deliberate
/// and order-sensitive.  Create, add, delete, and reorder all funnel
/// through this one rule.
pub fn rebalance(n: usize) -> Vec<u8> {
    if n == 0 {
        return Vec::new();
    }
    let base = (100 / n) as u8;
    let remainder = (100 % n) as u8;
    let mut weights = vec![base; n];
    if let Some(last) = weights.last_mut() {
        *last += remainder;
    }
    weights
}

/// Apply [`rebalance`] onto an existing KR sequence in place.
pub fn rebalance_weights(key_results: &mut [KeyResult]) {
    let mut weights = rebalance(key_results.len()).into_iter();
    for kr in key_results {
        if let Some(weight) = weights.next() {
            kr.weight = weight;
        }
    }
}

/// Reject a goal that is not fit to persist as a new file: blank objective,
/// zero key results, or any key result without content.
pub fn validate_new(objective: &str, key_results: &[KeyResult]) -> Result<()> {
    if objective.trim().is_empty() {
        return Err(StoreError::EmptyObjective);
    }
    if key_results.is_empty() {
        return Err(StoreError::NoKeyResults);
    }
    if key_results.iter().any(|kr| kr.content.trim().is_empty()) {
        return Err(StoreError::BlankKeyResult);
    }
    Ok(())
}

/// Today's day key in local time, `YYYY-MM-DD`.
pub fn today_key() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

/// Current wall-clock time as an `HH:MM` completion stamp.
pub fn now_hhmm() -> String {
    chrono::Local::now().format("%H:%M").to_string()
}
