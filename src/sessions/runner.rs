//! Pipeline runner
//!
//! Executes one session's stages in order: parse, size, price, render.
//! Per-VM failures are absorbed into the result; anything batch-fatal
//! moves the session to ERROR. Cancellation is honored at stage
//! boundaries only, so a stage never stops half-way through a VM.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::events::PipelineEvent;
use crate::inventory::InventoryParser;
use crate::models::{
    AssessmentFailure, AssessmentResult, FailureStage, SessionState, VmAssessment,
};
use crate::pricing::PricingEngine;
use crate::reports::{self, ReportFormat};
use crate::sessions::manager::SessionManager;
use crate::sizing::SizingEngine;

pub(crate) struct PipelineRunner {
    manager: Arc<SessionManager>,
    session_id: Uuid,
    cancel: CancellationToken,
}

impl PipelineRunner {
    pub(crate) fn new(
        manager: Arc<SessionManager>,
        session_id: Uuid,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            manager,
            session_id,
            cancel,
        }
    }

    pub(crate) async fn run(self, upload: Vec<u8>) {
        if let Err(err) = self.execute(upload).await {
            // Partially written artifacts must not outlive a failed run
            if let Err(cleanup) = self.manager.artifact_store().delete_session(self.session_id) {
                warn!(
                    session_id = %self.session_id,
                    error = %cleanup,
                    "artifact cleanup after pipeline failure"
                );
            }
            self.manager
                .fail_session(self.session_id, err.to_string())
                .await;
        }
    }

    async fn execute(&self, upload: Vec<u8>) -> Result<()> {
        let manager = &self.manager;
        let session_id = self.session_id;
        let Some((source_name, formats)) = manager.session_request(session_id).await else {
            return Ok(());
        };

        if self.cancelled_between_stages().await {
            return Ok(());
        }
        if !manager
            .advance_stage(session_id, SessionState::Parsing, "Parsing inventory archive")
            .await
        {
            return Ok(());
        }
        let parsed = InventoryParser::new().parse(&upload)?;
        drop(upload);
        let total = parsed.records.len();
        info!(
            session_id = %session_id,
            vms = total,
            warnings = parsed.warnings.len(),
            "inventory parsed"
        );

        if self.cancelled_between_stages().await {
            return Ok(());
        }
        if !manager
            .advance_stage(
                session_id,
                SessionState::Sizing,
                &format!("Sizing {total} VMs"),
            )
            .await
        {
            return Ok(());
        }
        let sizing_engine = SizingEngine::new(manager.shapes(), manager.pricing());
        let mut failures: Vec<AssessmentFailure> = Vec::new();
        let mut sizings = Vec::with_capacity(total);
        let mut last_percent = SessionState::Sizing.entry_percent();
        for (i, record) in parsed.records.iter().enumerate() {
            match sizing_engine.size(record) {
                Ok(recommendation) => sizings.push(Some(recommendation)),
                Err(err) => {
                    failures.push(AssessmentFailure {
                        vm_id: record.id.clone(),
                        vm_name: record.name.clone(),
                        stage: FailureStage::Sizing,
                        reason: err.to_string(),
                    });
                    sizings.push(None);
                }
            }
            let percent = (40 + ((i + 1) * 20) / total) as u8;
            if percent != last_percent {
                manager
                    .report_progress(
                        session_id,
                        percent,
                        format!("Sized {} of {total} VMs", i + 1),
                    )
                    .await;
                last_percent = percent;
            }
        }

        if self.cancelled_between_stages().await {
            return Ok(());
        }
        if !manager
            .advance_stage(
                session_id,
                SessionState::Pricing,
                &format!("Pricing {total} VMs"),
            )
            .await
        {
            return Ok(());
        }
        let pricing_engine = PricingEngine::new(manager.pricing());
        let mut vms: Vec<VmAssessment> = Vec::with_capacity(total);
        last_percent = SessionState::Pricing.entry_percent();
        for (i, (record, sizing)) in parsed.records.into_iter().zip(sizings).enumerate() {
            let assessment = match sizing {
                Some(sizing) => match pricing_engine.price(&record, &sizing) {
                    Ok(cost) => VmAssessment {
                        record,
                        sizing: Some(sizing),
                        cost: Some(cost),
                    },
                    Err(err) => {
                        failures.push(AssessmentFailure {
                            vm_id: record.id.clone(),
                            vm_name: record.name.clone(),
                            stage: FailureStage::Pricing,
                            reason: err.to_string(),
                        });
                        VmAssessment {
                            record,
                            sizing: Some(sizing),
                            cost: None,
                        }
                    }
                },
                None => VmAssessment {
                    record,
                    sizing: None,
                    cost: None,
                },
            };
            vms.push(assessment);
            let percent = (60 + ((i + 1) * 20) / total) as u8;
            if percent != last_percent {
                manager
                    .report_progress(
                        session_id,
                        percent,
                        format!("Priced {} of {total} VMs", i + 1),
                    )
                    .await;
                last_percent = percent;
            }
        }

        if self.cancelled_between_stages().await {
            return Ok(());
        }
        let result = Arc::new(AssessmentResult::new(
            source_name,
            manager.shapes().version.clone(),
            manager.pricing().version.clone(),
            manager.pricing().currency.clone(),
            vms,
            parsed.warnings,
            failures,
        ));
        info!(
            session_id = %session_id,
            assessed = result.totals.assessed,
            failed = result.totals.failed,
            monthly_cost = %result.totals.monthly_cost,
            "assessment computed"
        );

        manager
            .report_progress(
                session_id,
                80,
                format!("Rendering {} report formats", formats.len()),
            )
            .await;
        let artifacts = self.render_all(&result, &formats).await?;
        manager
            .complete_session(session_id, result, artifacts)
            .await;
        info!(session_id = %session_id, "session completed");
        Ok(())
    }

    /// Render every requested format concurrently over the shared result
    /// and store the artifacts
    async fn render_all(
        &self,
        result: &Arc<AssessmentResult>,
        formats: &[ReportFormat],
    ) -> Result<BTreeMap<ReportFormat, String>> {
        let mut handles = Vec::with_capacity(formats.len());
        for format in formats {
            let format = *format;
            let result = Arc::clone(result);
            handles.push((
                format,
                tokio::spawn(async move { reports::render(&result, format) }),
            ));
        }

        let mut artifacts = BTreeMap::new();
        for (format, handle) in handles {
            let rendered = handle
                .await
                .map_err(|e| Error::Internal(format!("render task for {format} failed: {e}")))?;
            let bytes = rendered?;
            let file_name = format.file_name();
            self.manager
                .artifact_store()
                .put(self.session_id, file_name, &bytes)?;
            self.manager
                .event_bus()
                .emit_lossy(PipelineEvent::ArtifactWritten {
                    session_id: self.session_id,
                    format,
                    file_name: file_name.to_string(),
                    size_bytes: bytes.len() as u64,
                    timestamp: Utc::now(),
                });
            artifacts.insert(format, file_name.to_string());
        }
        Ok(artifacts)
    }

    /// Cancellation is checked only here, between stages. A cancelled
    /// session moves to ERROR with a cancellation message.
    async fn cancelled_between_stages(&self) -> bool {
        if !self.cancel.is_cancelled() {
            return false;
        }
        info!(session_id = %self.session_id, "session cancelled");
        self.manager
            .fail_session(self.session_id, "Cancelled by caller")
            .await;
        true
    }
}
