//! Session manager
//!
//! Owns the session registry and every caller-facing operation. Each
//! submitted upload runs as its own tokio task; status reads only take a
//! short read lock, so polling never blocks on a running pipeline.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::artifacts::ArtifactStore;
use crate::catalog::{validate_catalogs, PricingCatalog, ShapeCatalog};
use crate::config::PipelineConfig;
use crate::error::{Error, FormatError, Result};
use crate::events::{EventBus, PipelineEvent};
use crate::models::{
    AssessmentResult, AssessmentSummary, Session, SessionError, SessionState, SessionStatus,
    SessionSummary, StateTransition,
};
use crate::reports::ReportFormat;
use crate::sessions::runner::PipelineRunner;

/// Coordinates assessment sessions end to end: accepts uploads, runs the
/// pipeline stages, serves status and artifacts, and expires old sessions.
pub struct SessionManager {
    config: PipelineConfig,
    shapes: Arc<ShapeCatalog>,
    pricing: Arc<PricingCatalog>,
    registry: RwLock<HashMap<Uuid, Session>>,
    artifacts: Arc<dyn ArtifactStore>,
    event_bus: EventBus,
    cancel_tokens: RwLock<HashMap<Uuid, CancellationToken>>,
}

impl SessionManager {
    /// Build a manager over validated catalogs. Catalog problems surface
    /// here, never mid-pipeline.
    pub fn new(
        config: PipelineConfig,
        shapes: ShapeCatalog,
        pricing: PricingCatalog,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Result<Self> {
        config.validate()?;
        shapes.validate()?;
        pricing.validate()?;
        validate_catalogs(&shapes, &pricing)?;

        let event_bus = EventBus::new(config.event_capacity);
        info!(
            shape_catalog = %shapes.version,
            pricing_catalog = %pricing.version,
            currency = %pricing.currency,
            "session manager ready"
        );
        Ok(Self {
            config,
            shapes: Arc::new(shapes),
            pricing: Arc::new(pricing),
            registry: RwLock::new(HashMap::new()),
            artifacts,
            event_bus,
            cancel_tokens: RwLock::new(HashMap::new()),
        })
    }

    /// Accept an upload and start its pipeline in a background task.
    ///
    /// Duplicate formats in the request collapse to one; an empty request
    /// is rejected, as is an upload outside the configured size bounds.
    pub async fn submit(
        self: &Arc<Self>,
        source_name: impl Into<String>,
        upload: Vec<u8>,
        formats: &[ReportFormat],
    ) -> Result<Uuid> {
        let source_name = source_name.into();
        let mut requested: Vec<ReportFormat> = Vec::new();
        for format in formats {
            if !requested.contains(format) {
                requested.push(*format);
            }
        }
        if requested.is_empty() {
            return Err(Error::InvalidRequest(
                "at least one report format must be requested".into(),
            ));
        }

        let actual = upload.len() as u64;
        if actual < self.config.min_upload_bytes || actual > self.config.max_upload_bytes {
            return Err(FormatError::SizeOutOfBounds {
                actual,
                min: self.config.min_upload_bytes,
                max: self.config.max_upload_bytes,
            }
            .into());
        }

        let session = Session::new(
            source_name.clone(),
            actual,
            requested,
            self.config.session_ttl(),
        );
        let session_id = session.session_id;
        let token = CancellationToken::new();
        self.registry.write().await.insert(session_id, session);
        self.cancel_tokens
            .write()
            .await
            .insert(session_id, token.clone());

        info!(
            session_id = %session_id,
            source = %source_name,
            bytes = actual,
            "session accepted"
        );

        let manager = Arc::clone(self);
        let runner = PipelineRunner::new(Arc::clone(self), session_id, token);
        tokio::spawn(async move {
            // Run the pipeline in its own task so a panic is contained and
            // becomes the session's ERROR state
            let outcome = tokio::spawn(runner.run(upload)).await;
            if let Err(join_err) = outcome {
                if join_err.is_panic() {
                    error!(session_id = %session_id, "pipeline task panicked");
                    manager
                        .fail_session(session_id, "internal pipeline failure")
                        .await;
                }
            }
        });

        Ok(session_id)
    }

    /// Current state, percent, and message of a session
    pub async fn get_status(&self, session_id: Uuid) -> Result<SessionStatus> {
        let registry = self.registry.read().await;
        registry
            .get(&session_id)
            .map(Session::status)
            .ok_or_else(|| Error::NotFound(format!("session {session_id}")))
    }

    /// Result summary of a COMPLETED session
    pub async fn get_result_summary(&self, session_id: Uuid) -> Result<AssessmentSummary> {
        let registry = self.registry.read().await;
        let session = registry
            .get(&session_id)
            .ok_or_else(|| Error::NotFound(format!("session {session_id}")))?;
        match (&session.state, &session.result) {
            (SessionState::Completed, Some(result)) => Ok(result.summary()),
            _ => Err(Error::NotFound(format!(
                "no result for session {session_id} in state {}",
                session.state
            ))),
        }
    }

    /// Full result of a COMPLETED session, shared without copying
    pub async fn get_result(&self, session_id: Uuid) -> Result<Arc<AssessmentResult>> {
        let registry = self.registry.read().await;
        let session = registry
            .get(&session_id)
            .ok_or_else(|| Error::NotFound(format!("session {session_id}")))?;
        match (&session.state, &session.result) {
            (SessionState::Completed, Some(result)) => Ok(Arc::clone(result)),
            _ => Err(Error::NotFound(format!(
                "no result for session {session_id} in state {}",
                session.state
            ))),
        }
    }

    /// Bytes of one rendered artifact. Available only once the session is
    /// COMPLETED, and only for formats the submission requested.
    pub async fn get_artifact(&self, session_id: Uuid, format: ReportFormat) -> Result<Vec<u8>> {
        {
            let registry = self.registry.read().await;
            let session = registry
                .get(&session_id)
                .ok_or_else(|| Error::NotFound(format!("session {session_id}")))?;
            if session.state != SessionState::Completed {
                return Err(Error::NotFound(format!(
                    "no artifacts for session {session_id} in state {}",
                    session.state
                )));
            }
            if !session.artifacts.contains_key(&format) {
                return Err(Error::NotFound(format!(
                    "format '{format}' was not requested for session {session_id}"
                )));
            }
        }
        self.artifacts.get(session_id, format.file_name())
    }

    /// All live sessions, oldest first
    pub async fn list_active_sessions(&self) -> Vec<SessionSummary> {
        let registry = self.registry.read().await;
        let mut sessions: Vec<SessionSummary> =
            registry.values().map(Session::summarize).collect();
        sessions.sort_by_key(|s| s.created_at);
        sessions
    }

    /// Request cancellation of a running session. The pipeline honors the
    /// request at the next stage boundary and moves the session to ERROR.
    pub async fn cancel_session(&self, session_id: Uuid) -> Result<()> {
        {
            let registry = self.registry.read().await;
            let session = registry
                .get(&session_id)
                .ok_or_else(|| Error::NotFound(format!("session {session_id}")))?;
            if session.is_terminal() {
                return Err(Error::InvalidRequest(format!(
                    "session {session_id} is already {}",
                    session.state
                )));
            }
        }
        let tokens = self.cancel_tokens.read().await;
        if let Some(token) = tokens.get(&session_id) {
            token.cancel();
            info!(session_id = %session_id, "cancellation requested");
        }
        Ok(())
    }

    /// Delete a terminal session together with its artifacts. In-progress
    /// sessions must be cancelled first.
    pub async fn delete_session(&self, session_id: Uuid) -> Result<()> {
        {
            let mut registry = self.registry.write().await;
            let session = registry
                .get(&session_id)
                .ok_or_else(|| Error::NotFound(format!("session {session_id}")))?;
            if !session.is_terminal() {
                return Err(Error::InvalidRequest(format!(
                    "session {session_id} is {}; cancel it before deleting",
                    session.state
                )));
            }
            registry.remove(&session_id);
        }
        self.cancel_tokens.write().await.remove(&session_id);
        self.artifacts.delete_session(session_id)?;
        info!(session_id = %session_id, "session deleted");
        Ok(())
    }

    /// Subscribe to pipeline events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PipelineEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub(crate) fn shapes(&self) -> Arc<ShapeCatalog> {
        Arc::clone(&self.shapes)
    }

    pub(crate) fn pricing(&self) -> Arc<PricingCatalog> {
        Arc::clone(&self.pricing)
    }

    pub(crate) fn artifact_store(&self) -> &dyn ArtifactStore {
        self.artifacts.as_ref()
    }

    /// Source name and requested formats of a session
    pub(crate) async fn session_request(
        &self,
        session_id: Uuid,
    ) -> Option<(String, Vec<ReportFormat>)> {
        let registry = self.registry.read().await;
        registry
            .get(&session_id)
            .map(|s| (s.source_name.clone(), s.requested_formats.clone()))
    }

    /// Move a session to the next stage and broadcast the transition.
    /// Returns false when the session is gone or the transition is refused.
    pub(crate) async fn advance_stage(
        &self,
        session_id: Uuid,
        new_state: SessionState,
        message: &str,
    ) -> bool {
        let mut registry = self.registry.write().await;
        let Some(session) = registry.get_mut(&session_id) else {
            return false;
        };
        match session.transition_to(new_state, message) {
            Some(transition) => {
                let percent = session.progress.percent;
                drop(registry);
                self.emit_transition(transition, percent, message.to_string());
                true
            }
            None => {
                warn!(
                    session_id = %session_id,
                    state = %new_state,
                    "stage transition refused"
                );
                false
            }
        }
    }

    /// Update progress within the current stage and broadcast it
    pub(crate) async fn report_progress(&self, session_id: Uuid, percent: u8, message: String) {
        let mut registry = self.registry.write().await;
        let Some(session) = registry.get_mut(&session_id) else {
            return;
        };
        session.update_progress(percent, message.clone());
        let state = session.state;
        let percent = session.progress.percent;
        drop(registry);
        self.event_bus.emit_lossy(PipelineEvent::SessionProgress {
            session_id,
            state,
            percent,
            message,
            timestamp: Utc::now(),
        });
    }

    /// Record the result and artifacts, then move the session to COMPLETED
    pub(crate) async fn complete_session(
        &self,
        session_id: Uuid,
        result: Arc<AssessmentResult>,
        artifacts: BTreeMap<ReportFormat, String>,
    ) {
        let mut registry = self.registry.write().await;
        let Some(session) = registry.get_mut(&session_id) else {
            return;
        };
        session.result = Some(result);
        session.artifacts = artifacts;
        if let Some(transition) =
            session.transition_to(SessionState::Completed, "Assessment complete")
        {
            drop(registry);
            self.emit_transition(transition, 100, "Assessment complete".to_string());
        }
    }

    /// Move a session to ERROR, recording the stage it failed in. A no-op
    /// for sessions already terminal or deleted.
    pub(crate) async fn fail_session(&self, session_id: Uuid, message: impl Into<String>) {
        let message = message.into();
        let mut registry = self.registry.write().await;
        let Some(session) = registry.get_mut(&session_id) else {
            return;
        };
        if session.is_terminal() {
            return;
        }
        let stage = session.state;
        session.error = Some(SessionError {
            stage,
            message: message.clone(),
        });
        if let Some(transition) = session.transition_to(SessionState::Error, message.clone()) {
            let percent = session.progress.percent;
            drop(registry);
            warn!(session_id = %session_id, stage = %stage, error = %message, "session failed");
            self.emit_transition(transition, percent, message);
        }
    }

    /// Expire terminal sessions past their TTL: remove them from the
    /// registry, delete their artifacts, and broadcast the expiry.
    pub(crate) async fn expire_due_sessions(&self) -> usize {
        let now = Utc::now();
        let mut expired = Vec::new();
        {
            let mut registry = self.registry.write().await;
            let due: Vec<Uuid> = registry
                .values()
                .filter(|s| s.expirable_at(now))
                .map(|s| s.session_id)
                .collect();
            for session_id in due {
                if let Some(session) = registry.get_mut(&session_id) {
                    if session
                        .transition_to(SessionState::Expired, "Session expired")
                        .is_some()
                    {
                        registry.remove(&session_id);
                        expired.push(session_id);
                    }
                }
            }
        }
        for session_id in &expired {
            if let Err(e) = self.artifacts.delete_session(*session_id) {
                warn!(session_id = %session_id, error = %e, "expired artifact cleanup failed");
            }
            self.cancel_tokens.write().await.remove(session_id);
            self.event_bus.emit_lossy(PipelineEvent::SessionExpired {
                session_id: *session_id,
                timestamp: now,
            });
            info!(session_id = %session_id, "session expired");
        }
        expired.len()
    }

    fn emit_transition(&self, transition: StateTransition, percent: u8, message: String) {
        self.event_bus
            .emit_lossy(PipelineEvent::SessionStateChanged {
                session_id: transition.session_id,
                old_state: transition.old_state,
                new_state: transition.new_state,
                timestamp: transition.transitioned_at,
            });
        self.event_bus.emit_lossy(PipelineEvent::SessionProgress {
            session_id: transition.session_id,
            state: transition.new_state,
            percent,
            message,
            timestamp: transition.transitioned_at,
        });
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .field("shape_catalog", &self.shapes.version)
            .field("pricing_catalog", &self.pricing.version)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::MemoryArtifactStore;

    fn manager() -> Arc<SessionManager> {
        Arc::new(
            SessionManager::new(
                PipelineConfig::default(),
                ShapeCatalog::default(),
                PricingCatalog::default(),
                Arc::new(MemoryArtifactStore::new()),
            )
            .unwrap(),
        )
    }

    /// Insert a session directly, bypassing submit, for state-dependent
    /// operation tests
    async fn seed_session(manager: &SessionManager, state: SessionState) -> Uuid {
        let mut session = Session::new(
            "inventory.zip",
            2048,
            vec![ReportFormat::Summary],
            chrono::Duration::hours(24),
        );
        let session_id = session.session_id;
        match state {
            SessionState::Created => {}
            SessionState::Completed => {
                session.transition_to(SessionState::Parsing, "parse");
                session.transition_to(SessionState::Sizing, "size");
                session.transition_to(SessionState::Pricing, "price");
                session.transition_to(SessionState::Completed, "done");
            }
            SessionState::Error => {
                session.transition_to(SessionState::Parsing, "parse");
                session.transition_to(SessionState::Error, "boom");
            }
            other => {
                panic!("seed_session does not support {other}");
            }
        }
        manager.registry.write().await.insert(session_id, session);
        session_id
    }

    #[tokio::test]
    async fn submit_rejects_empty_format_list() {
        let manager = manager();
        let result = manager.submit("inv.zip", vec![0u8; 2048], &[]).await;
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn submit_rejects_undersized_and_oversized_uploads() {
        let manager = manager();
        let too_small = manager
            .submit("inv.zip", vec![0u8; 16], &[ReportFormat::Summary])
            .await;
        assert!(matches!(
            too_small,
            Err(Error::Format(FormatError::SizeOutOfBounds { .. }))
        ));

        let config = PipelineConfig {
            max_upload_bytes: 4096,
            ..PipelineConfig::default()
        };
        let small_manager = Arc::new(
            SessionManager::new(
                config,
                ShapeCatalog::default(),
                PricingCatalog::default(),
                Arc::new(MemoryArtifactStore::new()),
            )
            .unwrap(),
        );
        let too_big = small_manager
            .submit("inv.zip", vec![0u8; 8192], &[ReportFormat::Summary])
            .await;
        assert!(matches!(
            too_big,
            Err(Error::Format(FormatError::SizeOutOfBounds { .. }))
        ));
    }

    #[tokio::test]
    async fn submit_deduplicates_requested_formats() {
        let manager = manager();
        let session_id = manager
            .submit(
                "inv.zip",
                vec![0u8; 2048],
                &[
                    ReportFormat::Summary,
                    ReportFormat::Summary,
                    ReportFormat::StructuredData,
                ],
            )
            .await
            .unwrap();
        let sessions = manager.list_active_sessions().await;
        let session = sessions
            .iter()
            .find(|s| s.session_id == session_id)
            .unwrap();
        assert_eq!(
            session.requested_formats,
            vec![ReportFormat::Summary, ReportFormat::StructuredData]
        );
    }

    #[tokio::test]
    async fn unknown_session_is_not_found_everywhere() {
        let manager = manager();
        let missing = Uuid::new_v4();
        assert!(matches!(
            manager.get_status(missing).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            manager.get_result_summary(missing).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            manager.get_artifact(missing, ReportFormat::Summary).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            manager.cancel_session(missing).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            manager.delete_session(missing).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn artifacts_unavailable_before_completion() {
        let manager = manager();
        let session_id = seed_session(&manager, SessionState::Created).await;
        assert!(matches!(
            manager
                .get_artifact(session_id, ReportFormat::Summary)
                .await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn unrequested_format_is_not_found_even_when_completed() {
        let manager = manager();
        let session_id = seed_session(&manager, SessionState::Completed).await;
        // Completed, but only Summary was requested and no artifacts were
        // registered for this hand-built session
        assert!(matches!(
            manager
                .get_artifact(session_id, ReportFormat::Spreadsheet)
                .await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn cancel_refused_for_terminal_sessions() {
        let manager = manager();
        let session_id = seed_session(&manager, SessionState::Completed).await;
        assert!(matches!(
            manager.cancel_session(session_id).await,
            Err(Error::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn delete_refused_while_in_progress() {
        let manager = manager();
        let session_id = seed_session(&manager, SessionState::Created).await;
        assert!(matches!(
            manager.delete_session(session_id).await,
            Err(Error::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn delete_removes_session_and_artifacts() {
        let manager = manager();
        let session_id = seed_session(&manager, SessionState::Error).await;
        manager
            .artifacts
            .put(session_id, "assessment_report.txt", b"stale")
            .unwrap();

        manager.delete_session(session_id).await.unwrap();
        assert!(matches!(
            manager.get_status(session_id).await,
            Err(Error::NotFound(_))
        ));
        assert!(manager
            .artifacts
            .list_session(session_id)
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn expire_due_sessions_sweeps_terminal_past_ttl() {
        let config = PipelineConfig {
            session_ttl_secs: 0,
            ..PipelineConfig::default()
        };
        let manager = Arc::new(
            SessionManager::new(
                config,
                ShapeCatalog::default(),
                PricingCatalog::default(),
                Arc::new(MemoryArtifactStore::new()),
            )
            .unwrap(),
        );
        let mut events = manager.subscribe();

        let expired_id = {
            let mut session = Session::new(
                "inventory.zip",
                2048,
                vec![ReportFormat::Summary],
                chrono::Duration::zero(),
            );
            session.transition_to(SessionState::Parsing, "parse");
            session.transition_to(SessionState::Error, "boom");
            let id = session.session_id;
            manager.registry.write().await.insert(id, session);
            id
        };
        let live_id = seed_session(&manager, SessionState::Created).await;
        manager
            .artifacts
            .put(expired_id, "assessment_report.txt", b"old")
            .unwrap();

        assert_eq!(manager.expire_due_sessions().await, 1);
        assert!(matches!(
            manager.get_status(expired_id).await,
            Err(Error::NotFound(_))
        ));
        // In-progress sessions are never expired
        assert!(manager.get_status(live_id).await.is_ok());
        assert!(manager
            .artifacts
            .list_session(expired_id)
            .unwrap()
            .is_empty());

        let event = events.try_recv().unwrap();
        assert!(matches!(
            event,
            PipelineEvent::SessionExpired { session_id, .. } if session_id == expired_id
        ));
    }

    #[tokio::test]
    async fn advance_stage_refuses_illegal_transitions() {
        let manager = manager();
        let session_id = seed_session(&manager, SessionState::Created).await;
        // Skipping PARSING is refused and leaves the session untouched
        assert!(
            !manager
                .advance_stage(session_id, SessionState::Sizing, "skip")
                .await
        );
        let status = manager.get_status(session_id).await.unwrap();
        assert_eq!(status.state, SessionState::Created);
    }
}
