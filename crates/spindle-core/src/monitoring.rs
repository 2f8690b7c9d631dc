//! Process-wide monitoring session.
//!
//! `initialize_monitoring` opens the session at most once per process;
//! `close_monitoring` ends it and returns a report. Closing without an open
//! session does nothing.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

static STATE: Mutex<MonitorState> = Mutex::new(MonitorState::new());

struct MonitorState {
    initialized: bool,
    session: Option<Session>,
}

impl MonitorState {
    const fn new() -> Self {
        Self {
            initialized: false,
            session: None,
        }
    }
}

struct Session {
    started: Instant,
    events: BTreeMap<String, u64>,
}

/// Summary of a closed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitoringReport {
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    pub events: BTreeMap<String, u64>,
}

/// Open the process-wide session.
///
/// Returns `false` if a session was already opened in this process.
pub fn initialize_monitoring() -> bool {
    let mut state = STATE.lock().unwrap();
    if state.initialized {
        return false;
    }
    state.initialized = true;
    state.session = Some(Session {
        started: Instant::now(),
        events: BTreeMap::new(),
    });
    true
}

/// Close the session and report on it; `None` if no session is open.
pub fn close_monitoring() -> Option<MonitoringReport> {
    let session = STATE.lock().unwrap().session.take()?;
    Some(MonitoringReport {
        duration: session.started.elapsed(),
        events: session.events,
    })
}

/// Whether a session is currently open.
#[must_use]
pub fn is_monitoring() -> bool {
    STATE.lock().unwrap().session.is_some()
}

/// Count one occurrence of `event`. Ignored without an open session.
pub fn record_event(event: &str) {
    record_events(event, 1);
}

/// Count `count` occurrences of `event`.
pub fn record_events(event: &str, count: u64) {
    if let Some(session) = STATE.lock().unwrap().session.as_mut() {
        *session.events.entry(event.to_string()).or_insert(0) += count;
    }
}

/// Current counters without closing the session.
#[must_use]
pub fn snapshot() -> Option<MonitoringReport> {
    let state = STATE.lock().unwrap();
    state.session.as_ref().map(|s| MonitoringReport {
        duration: s.started.elapsed(),
        events: s.events.clone(),
    })
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
fn reset() {
    *STATE.lock().unwrap() = MonitorState::new();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_close_without_init_is_noop() {
        reset();
        assert!(close_monitoring().is_none());
        assert!(!is_monitoring());
        record_event("ignored");
        assert!(snapshot().is_none());
    }

    #[test]
    #[serial]
    fn test_initialize_at_most_once() {
        reset();
        assert!(initialize_monitoring());
        assert!(!initialize_monitoring());
        assert!(close_monitoring().is_some());

        // still once per process after closing
        assert!(!initialize_monitoring());
        assert!(!is_monitoring());
    }

    #[test]
    #[serial]
    fn test_events_are_counted() {
        reset();
        initialize_monitoring();
        record_event("resolve");
        record_event("resolve");
        record_events("asset", 3);

        let snap = snapshot().unwrap();
        assert_eq!(snap.events.get("resolve"), Some(&2));

        let report = close_monitoring().unwrap();
        assert_eq!(report.events.get("resolve"), Some(&2));
        assert_eq!(report.events.get("asset"), Some(&3));
        assert!(close_monitoring().is_none());
    }

    #[test]
    #[serial]
    fn test_report_serializes_millis() {
        let report = MonitoringReport {
            duration: Duration::from_millis(1500),
            events: BTreeMap::new(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["duration"], 1500);
    }
}
