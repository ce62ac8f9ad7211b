//! Per-call state map shared by every in-flight call of a scheduler.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;
use toolgate_domain::{CallId, InvalidTransition, ToolCallRecord, ToolCallState};

struct CallEntry {
    record: ToolCallRecord,
    cancel: CancellationToken,
}

/// Call id -> lifecycle record and cancellation token.
///
/// All transitions go through [`ToolCallRecord::transition`], so a call that
/// is already terminal rejects every further transition.
#[derive(Default)]
pub(crate) struct CallTable {
    entries: Mutex<HashMap<CallId, CallEntry>>,
}

impl CallTable {
    /// Track a new call. Returns `false` if the id is already in flight.
    pub fn insert(&self, record: ToolCallRecord, cancel: CancellationToken) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.contains_key(&record.call_id) {
            return false;
        }
        entries.insert(record.call_id.clone(), CallEntry { record, cancel });
        true
    }

    pub fn transition(&self, call_id: &CallId, next: ToolCallState) -> Result<(), InvalidTransition> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get_mut(call_id) {
            Some(entry) => entry.record.transition(next),
            None => Err(InvalidTransition {
                call_id: call_id.clone(),
                from: "untracked",
                to: next.as_str(),
            }),
        }
    }

    /// Rename the record once the requested name resolves to a canonical tool.
    pub fn set_tool_name(&self, call_id: &CallId, tool_name: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get_mut(call_id) {
            entry.record.tool_name = tool_name.to_string();
        }
    }

    /// Apply the terminal transition and stop tracking the call.
    ///
    /// Returns the final record, or the rejection if the call was already
    /// terminal or unknown. The call is untracked either way.
    pub fn finish(
        &self,
        call_id: &CallId,
        terminal: ToolCallState,
    ) -> Result<ToolCallRecord, InvalidTransition> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let Some(entry) = entries.get_mut(call_id) else {
            return Err(InvalidTransition {
                call_id: call_id.clone(),
                from: "untracked",
                to: terminal.as_str(),
            });
        };
        let result = entry.record.transition(terminal);
        let record = entry.record.clone();
        entries.remove(call_id);
        result.map(|()| record)
    }

    pub fn state(&self, call_id: &CallId) -> Option<ToolCallState> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(call_id).map(|e| e.record.state.clone())
    }

    pub fn snapshot(&self) -> Vec<ToolCallRecord> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.values().map(|e| e.record.clone()).collect()
    }

    /// Fire the call's cancellation token.
    ///
    /// Returns `true` only the first time for a tracked, non-terminal call.
    pub fn cancel(&self, call_id: &CallId) -> bool {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(call_id) {
            Some(entry) if !entry.record.is_terminal() && !entry.cancel.is_cancelled() => {
                entry.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
