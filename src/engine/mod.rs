pub mod axl;
pub mod ris;
pub mod soap;
pub mod xml;

use crate::mail::MailError;
use crate::model::{
    InfoEvent, Phase, QueryOutcome, RestartOutcome, RunConfig, SelectionCriteria, SweepEvent,
    SweepResult,
};
use crate::text_summary;
use anyhow::{Context, Result};
use async_trait::async_trait;
use soap::SoapError;
use tokio::sync::mpsc;

/// Source of device registration status.
#[async_trait]
pub trait DeviceStatusSource: Send + Sync {
    async fn select_devices(&self, criteria: &SelectionCriteria) -> Result<QueryOutcome, SoapError>;

    /// Log the most recent request/response exchange for diagnostics.
    fn dump_history(&self);
}

#[async_trait]
pub trait PhoneRestarter: Send + Sync {
    async fn restart_phone(&self, name: &str) -> Result<String, SoapError>;
}

#[async_trait]
pub trait ReportMailer: Send + Sync {
    async fn send_report(&self, body: &str) -> Result<(), MailError>;

    fn recipients(&self) -> String;
}

/// One sweep: query, report, optional restarts, optional email.
///
/// Restarts happen only when a restarter is supplied; the CLI builds one
/// only when restarts are enabled, so the AXL endpoint is never touched
/// otherwise.
pub struct SweepEngine {
    cfg: RunConfig,
    source: Box<dyn DeviceStatusSource>,
    restarter: Option<Box<dyn PhoneRestarter>>,
    mailer: Option<Box<dyn ReportMailer>>,
}

impl SweepEngine {
    pub fn new(
        cfg: RunConfig,
        source: Box<dyn DeviceStatusSource>,
        restarter: Option<Box<dyn PhoneRestarter>>,
        mailer: Option<Box<dyn ReportMailer>>,
    ) -> Self {
        Self {
            cfg,
            source,
            restarter,
            mailer,
        }
    }

    pub async fn run(self, event_tx: mpsc::UnboundedSender<SweepEvent>) -> Result<SweepResult> {
        let _ = event_tx.send(SweepEvent::PhaseStarted {
            phase: Phase::Query,
        });
        tracing::info!(
            server = %self.cfg.server,
            target_ip = %self.cfg.target_ip,
            "querying device registrations"
        );

        let criteria = self.cfg.selection_criteria();
        let outcome = match self.source.select_devices(&criteria).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.source.dump_history();
                return Err(e).context("device status query failed");
            }
        };

        let returned = outcome.items_returned;
        tracing::info!(devices = outcome.devices.len(), returned, "status query complete");
        if let Some(state) = outcome.state_info.as_deref() {
            tracing::debug!(state_info = state, "query state token");
        }
        if let Some(total) = outcome.total_devices_found {
            if total as usize > returned {
                tracing::warn!(returned, total, "status query result truncated");
                let _ = event_tx.send(SweepEvent::Info(InfoEvent::Truncated { returned, total }));
            }
        }
        for device in &outcome.devices {
            let _ = event_tx.send(SweepEvent::DeviceFound {
                device: device.clone(),
            });
        }

        let mut restarts = Vec::new();
        if let Some(restarter) = self.restarter.as_deref() {
            let _ = event_tx.send(SweepEvent::PhaseStarted {
                phase: Phase::Restart,
            });
            for device in &outcome.devices {
                let restart = match restarter.restart_phone(&device.name).await {
                    Ok(uuid) => {
                        tracing::info!(device = %device.name, "restart requested");
                        RestartOutcome {
                            name: device.name.clone(),
                            ok: true,
                            detail: uuid,
                        }
                    }
                    Err(e) => {
                        tracing::warn!(device = %device.name, error = %e, "restart failed");
                        RestartOutcome {
                            name: device.name.clone(),
                            ok: false,
                            detail: e.to_string(),
                        }
                    }
                };
                let _ = event_tx.send(SweepEvent::RestartIssued {
                    outcome: restart.clone(),
                });
                restarts.push(restart);
            }
        }

        let mut result = SweepResult {
            timestamp_utc: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "now".into()),
            server: self.cfg.server.clone(),
            target_ip: self.cfg.target_ip.clone(),
            restart_enabled: self.restarter.is_some(),
            total_devices_found: outcome.total_devices_found,
            devices: outcome.devices,
            restarts,
            emailed: false,
        };

        let summary = text_summary::build_text_summary(&result);
        let _ = event_tx.send(SweepEvent::ReportReady {
            lines: summary.lines.clone(),
        });

        match self.mailer.as_deref() {
            Some(mailer) => {
                let _ = event_tx.send(SweepEvent::PhaseStarted { phase: Phase::Mail });
                mailer
                    .send_report(&summary.body())
                    .await
                    .context("failed to email report")?;
                result.emailed = true;
                let _ = event_tx.send(SweepEvent::Info(InfoEvent::MailSent {
                    recipients: mailer.recipients(),
                }));
            }
            None => {
                let _ = event_tx.send(SweepEvent::Info(InfoEvent::MailSkipped));
            }
        }

        Ok(result)
    }
}
