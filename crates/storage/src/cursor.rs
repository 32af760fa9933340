//! Cursor positioning for [`crate::MemoryStore`]

use linger_core::{CursorRecord, CursorStep, Direction, Key, KeyRange, Value};
use std::collections::BTreeMap;

use crate::request::RequestHandle;

/// Server-side state of an open cursor
///
/// The store owns the cursor's request for as long as the cursor is open;
/// callers only hold weak references to it.
pub(crate) struct HostCursor {
    pub(crate) resource: String,
    range: KeyRange,
    direction: Direction,
    position: Option<Key>,
    // Keeps the request alive between steps.
    _request: RequestHandle,
}

impl HostCursor {
    pub(crate) fn new(
        resource: impl Into<String>,
        range: KeyRange,
        direction: Direction,
        request: RequestHandle,
    ) -> Self {
        Self {
            resource: resource.into(),
            range,
            direction,
            position: None,
            _request: request,
        }
    }

    /// Move according to `step`; `None` once the range is exhausted
    pub(crate) fn advance(
        &mut self,
        data: &BTreeMap<Key, Value>,
        step: &CursorStep,
    ) -> Option<CursorRecord> {
        let in_range = data.range((self.range.lower(), self.range.upper()));
        let position = self.position.clone();

        let found = match self.direction {
            Direction::Next => {
                let mut ahead =
                    in_range.filter(move |(k, _)| position.as_ref().map_or(true, |p| *k > p));
                match step {
                    CursorStep::Advance(n) => ahead.nth((*n as usize).saturating_sub(1)),
                    CursorStep::ContinueTo(target) => ahead.find(|(k, _)| *k >= target),
                }
            }
            Direction::Prev => {
                let mut ahead = in_range
                    .rev()
                    .filter(move |(k, _)| position.as_ref().map_or(true, |p| *k < p));
                match step {
                    CursorStep::Advance(n) => ahead.nth((*n as usize).saturating_sub(1)),
                    CursorStep::ContinueTo(target) => ahead.find(|(k, _)| *k <= target),
                }
            }
        };

        let record = found.map(|(k, v)| CursorRecord {
            key: k.clone(),
            value: v.clone(),
        });
        self.position = record.as_ref().map(|r| r.key.clone());
        record
    }
}
