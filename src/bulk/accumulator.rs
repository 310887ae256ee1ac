//! Result accumulators
//!
//! An accumulator is owned by exactly one orchestrator run. The same merge
//! rule applies in ordered and unordered mode: a response contributes its
//! counters, and ids are keyed by the index of the operation in the caller's
//! input.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::executor::RawResponse;

/// Merges the effects of individual responses into a run-wide result
pub(crate) trait Accumulator: Default + Send {
    /// Add the counters reported in `response` for the unit at `index`
    ///
    /// Also called with the raw response of a failed unit, which may report
    /// partial effects.
    fn merge_status(&mut self, index: usize, upsert: bool, response: &RawResponse);

    /// Keep the raw response of a successful unit
    fn record_response(&mut self, _response: RawResponse) {}
}

/// Totals of a bulk write
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkWriteResult {
    pub inserted_count: u64,
    pub matched_count: u64,
    pub modified_count: u64,
    pub deleted_count: u64,
    pub upserted_count: u64,

    /// Operation index → id of the inserted document
    pub inserted_ids: BTreeMap<usize, Value>,

    /// Operation index → id of the upserted document
    pub upserted_ids: BTreeMap<usize, Value>,

    /// Raw responses of successful operations, in arrival (ordered) or
    /// completion (unordered) order
    pub responses: Vec<RawResponse>,
}

impl Accumulator for BulkWriteResult {
    fn merge_status(&mut self, index: usize, upsert: bool, response: &RawResponse) {
        let Some(status) = &response.status else {
            return;
        };

        if let Some(ids) = &status.inserted_ids {
            self.inserted_count += ids.len() as u64;
            if let Some(id) = ids.first() {
                self.inserted_ids.insert(index, id.clone());
            }
        }
        self.matched_count += status.matched_count.unwrap_or(0);
        self.modified_count += status.modified_count.unwrap_or(0);
        self.deleted_count += status.deleted_count.unwrap_or(0).max(0) as u64;

        if upsert && let Some(id) = &status.upserted_id {
            self.upserted_count += 1;
            self.upserted_ids.insert(index, id.clone());
        }
    }

    fn record_response(&mut self, response: RawResponse) {
        self.responses.push(response);
    }
}

/// Outcome of an insert-many
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertManyResult {
    /// Ids of inserted documents, chunk by chunk in arrival order
    pub inserted_ids: Vec<Value>,
    pub inserted_count: u64,
}

impl Accumulator for InsertManyResult {
    fn merge_status(&mut self, _index: usize, _upsert: bool, response: &RawResponse) {
        if let Some(ids) = response
            .status
            .as_ref()
            .and_then(|status| status.inserted_ids.as_ref())
        {
            self.inserted_count += ids.len() as u64;
            self.inserted_ids.extend(ids.iter().cloned());
        }
    }
}
