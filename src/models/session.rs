//! Session lifecycle state machine
//!
//! A session progresses through four compute stages:
//! CREATED → PARSING → SIZING → PRICING → COMPLETED
//!
//! ERROR is reachable from any non-terminal state; EXPIRED is reachable
//! only from COMPLETED or ERROR. Transitions are monotonic: no state is
//! ever revisited, and `transition_to` refuses anything the state machine
//! does not allow.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::assessment::AssessmentResult;
use crate::reports::ReportFormat;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionState {
    /// Upload accepted, pipeline not started yet
    Created,
    /// Decoding the archive into VM records
    Parsing,
    /// Mapping VM records onto catalog shapes
    Sizing,
    /// Computing cost breakdowns
    Pricing,
    /// Result and artifacts ready
    Completed,
    /// A batch-fatal failure; stage and message kept on the session
    Error,
    /// Past its time-to-live; artifacts deleted
    Expired,
}

impl SessionState {
    /// Whether the state machine permits `self` -> `next`
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Created, Parsing) => true,
            (Parsing, Sizing) => true,
            (Sizing, Pricing) => true,
            (Pricing, Completed) => true,
            (Created | Parsing | Sizing | Pricing, Error) => true,
            (Completed | Error, Expired) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Error | SessionState::Expired
        )
    }

    /// Completion percentage reported when a stage begins
    pub fn entry_percent(self) -> u8 {
        match self {
            SessionState::Created => 0,
            SessionState::Parsing => 10,
            SessionState::Sizing => 40,
            SessionState::Pricing => 60,
            SessionState::Completed => 100,
            // Error/Expired keep the last reported percentage
            SessionState::Error | SessionState::Expired => 0,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Created => "CREATED",
            SessionState::Parsing => "PARSING",
            SessionState::Sizing => "SIZING",
            SessionState::Pricing => "PRICING",
            SessionState::Completed => "COMPLETED",
            SessionState::Error => "ERROR",
            SessionState::Expired => "EXPIRED",
        };
        write!(f, "{name}")
    }
}

/// State transition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub session_id: Uuid,
    pub old_state: SessionState,
    pub new_state: SessionState,
    pub transitioned_at: DateTime<Utc>,
}

/// Progress snapshot read by the status-polling collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionProgress {
    /// Completion percentage (0-100)
    pub percent: u8,
    /// Human-readable description of the current operation
    pub message: String,
    pub updated_at: DateTime<Utc>,
}

impl Default for SessionProgress {
    fn default() -> Self {
        Self {
            percent: 0,
            message: String::from("Upload accepted"),
            updated_at: Utc::now(),
        }
    }
}

/// Batch-fatal failure details kept on an errored session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionError {
    /// Stage that was running when the failure happened
    pub stage: SessionState,
    pub message: String,
}

/// One user-initiated pipeline run (in-memory state)
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: Uuid,
    pub state: SessionState,
    /// Upload filename, kept as result metadata
    pub source_name: String,
    pub upload_bytes: u64,
    /// Formats to render on completion, deduplicated, in request order
    pub requested_formats: Vec<ReportFormat>,
    pub progress: SessionProgress,
    pub error: Option<SessionError>,
    /// Completed result; shared with concurrently running renderers
    pub result: Option<Arc<AssessmentResult>>,
    /// Format -> artifact file name, filled in on completion
    pub artifacts: BTreeMap<ReportFormat, String>,
    pub created_at: DateTime<Utc>,
    /// Set when the session reaches a terminal state
    pub ended_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        source_name: impl Into<String>,
        upload_bytes: u64,
        requested_formats: Vec<ReportFormat>,
        ttl: chrono::Duration,
    ) -> Self {
        let created_at = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            state: SessionState::Created,
            source_name: source_name.into(),
            upload_bytes,
            requested_formats,
            progress: SessionProgress::default(),
            error: None,
            result: None,
            artifacts: BTreeMap::new(),
            created_at,
            ended_at: None,
            expires_at: created_at + ttl,
        }
    }

    /// Transition to a new state, recording the stage's entry progress.
    /// Returns `None` (and leaves the session untouched) when the state
    /// machine does not allow the transition.
    pub fn transition_to(
        &mut self,
        new_state: SessionState,
        message: impl Into<String>,
    ) -> Option<StateTransition> {
        if !self.state.can_transition_to(new_state) {
            return None;
        }
        let transition = StateTransition {
            session_id: self.session_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;
        match new_state {
            SessionState::Error | SessionState::Expired => {
                // Keep the last reported percentage for post-mortem reads
                self.update_progress(self.progress.percent, message);
            }
            _ => self.update_progress(new_state.entry_percent(), message),
        }
        if new_state.is_terminal() {
            self.ended_at = Some(transition.transitioned_at);
        }
        Some(transition)
    }

    /// Update the progress snapshot without changing state
    pub fn update_progress(&mut self, percent: u8, message: impl Into<String>) {
        self.progress.percent = percent.min(100);
        self.progress.message = message.into();
        self.progress.updated_at = Utc::now();
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Whether the sweeper may expire this session
    pub fn expirable_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.state, SessionState::Completed | SessionState::Error)
            && now >= self.expires_at
    }

    /// Condensed view for administrative listing
    pub fn summarize(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id,
            state: self.state,
            source_name: self.source_name.clone(),
            upload_bytes: self.upload_bytes,
            percent: self.progress.percent,
            message: self.progress.message.clone(),
            requested_formats: self.requested_formats.clone(),
            vm_count: self.result.as_ref().map(|r| r.totals.vm_count),
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }

    /// Status snapshot for the polling interface
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.session_id,
            state: self.state,
            percent: self.progress.percent,
            message: self.progress.message.clone(),
            error: self
                .error
                .as_ref()
                .map(|e| format!("{} failed: {}", e.stage, e.message)),
        }
    }
}

/// Snapshot returned by the status-polling interface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: Uuid,
    pub state: SessionState,
    pub percent: u8,
    pub message: String,
    /// Present when the session is in ERROR; names the failed stage
    pub error: Option<String>,
}

/// Entry in the administrative session listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub state: SessionState,
    pub source_name: String,
    pub upload_bytes: u64,
    pub percent: u8,
    pub message: String,
    pub requested_formats: Vec<ReportFormat>,
    /// Present once the session has a completed result
    pub vm_count: Option<usize>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(
            "inventory.zip",
            2048,
            vec![ReportFormat::Spreadsheet],
            chrono::Duration::hours(24),
        )
    }

    #[test]
    fn happy_path_walks_all_stages() {
        let mut s = session();
        for (state, percent) in [
            (SessionState::Parsing, 10),
            (SessionState::Sizing, 40),
            (SessionState::Pricing, 60),
            (SessionState::Completed, 100),
        ] {
            let t = s.transition_to(state, state.to_string());
            assert!(t.is_some(), "transition to {state} refused");
            assert_eq!(s.state, state);
            assert_eq!(s.progress.percent, percent);
        }
        assert!(s.is_terminal());
        assert!(s.ended_at.is_some());
    }

    #[test]
    fn states_are_never_revisited() {
        let mut s = session();
        s.transition_to(SessionState::Parsing, "parse");
        s.transition_to(SessionState::Sizing, "size");
        // Backwards and skipping transitions are refused
        assert!(s.transition_to(SessionState::Parsing, "again").is_none());
        assert!(s.transition_to(SessionState::Completed, "skip").is_none());
        assert_eq!(s.state, SessionState::Sizing);
    }

    #[test]
    fn error_reachable_from_any_in_progress_state() {
        for stage in [
            SessionState::Created,
            SessionState::Parsing,
            SessionState::Sizing,
            SessionState::Pricing,
        ] {
            assert!(stage.can_transition_to(SessionState::Error), "{stage}");
        }
        assert!(!SessionState::Completed.can_transition_to(SessionState::Error));
        assert!(!SessionState::Expired.can_transition_to(SessionState::Error));
    }

    #[test]
    fn error_keeps_last_percent() {
        let mut s = session();
        s.transition_to(SessionState::Parsing, "parse");
        s.transition_to(SessionState::Sizing, "size");
        s.update_progress(45, "sizing 12 of 40 VMs");
        s.transition_to(SessionState::Error, "sizing failed");
        assert_eq!(s.progress.percent, 45);
        assert!(s.is_terminal());
    }

    #[test]
    fn expired_only_from_terminal() {
        assert!(SessionState::Completed.can_transition_to(SessionState::Expired));
        assert!(SessionState::Error.can_transition_to(SessionState::Expired));
        assert!(!SessionState::Parsing.can_transition_to(SessionState::Expired));
        assert!(!SessionState::Created.can_transition_to(SessionState::Expired));
    }

    #[test]
    fn expirable_requires_terminal_and_ttl_elapsed() {
        let mut s = Session::new(
            "inventory.zip",
            2048,
            vec![ReportFormat::Summary],
            chrono::Duration::zero(),
        );
        // In-progress sessions are never expirable, even past their TTL
        assert!(!s.expirable_at(Utc::now()));
        s.transition_to(SessionState::Parsing, "parse");
        assert!(!s.expirable_at(Utc::now()));
        s.transition_to(SessionState::Error, "boom");
        assert!(s.expirable_at(Utc::now()));
    }

    #[test]
    fn progress_percent_clamped() {
        let mut s = session();
        s.update_progress(250, "overshoot");
        assert_eq!(s.progress.percent, 100);
    }
}
