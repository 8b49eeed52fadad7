//! Call recording for mock sessions and factories.

use std::sync::Arc;

use parking_lot::Mutex;

/// A call observed by a [`CallRecorder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// The factory produced a session.
    Create {
        /// Id of the new session.
        session_id: String,
    },
    /// The factory failed.
    CreateFailed {
        /// Error message returned.
        message: String,
    },
    /// A session served a request.
    Request {
        /// Session that served it.
        session_id: String,
    },
    /// A session was torn down.
    Teardown {
        /// Session that was torn down.
        session_id: String,
    },
}

/// Shared, cloneable log of mock calls.
///
/// Pass one recorder to every mock a test builds; clones share the log.
#[derive(Debug, Clone, Default)]
pub struct CallRecorder {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallRecorder {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a call.
    pub fn record(&self, call: Call) {
        tracing::trace!(?call, "mock call");
        self.calls.lock().push(call);
    }

    /// Snapshot of every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Number of successful factory calls.
    #[must_use]
    pub fn creates(&self) -> usize {
        self.count(|call| matches!(call, Call::Create { .. }))
    }

    /// Number of failed factory calls.
    #[must_use]
    pub fn create_failures(&self) -> usize {
        self.count(|call| matches!(call, Call::CreateFailed { .. }))
    }

    /// Ids of torn-down sessions, in teardown order.
    #[must_use]
    pub fn teardowns(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::Teardown { session_id } => Some(session_id.clone()),
                _ => None,
            })
            .collect()
    }

    /// How many times the given session was torn down.
    #[must_use]
    pub fn teardowns_of(&self, session_id: &str) -> usize {
        self.count(|call| matches!(call, Call::Teardown { session_id: id } if id == session_id))
    }

    /// Forget every recorded call.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(call)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_log() {
        let recorder = CallRecorder::new();
        let clone = recorder.clone();

        clone.record(Call::Create {
            session_id: "a".to_string(),
        });
        clone.record(Call::Teardown {
            session_id: "a".to_string(),
        });

        assert_eq!(recorder.creates(), 1);
        assert_eq!(recorder.teardowns(), vec!["a".to_string()]);
        assert_eq!(recorder.teardowns_of("a"), 1);
        assert_eq!(recorder.teardowns_of("b"), 0);

        recorder.clear();
        assert!(clone.calls().is_empty());
    }
}
