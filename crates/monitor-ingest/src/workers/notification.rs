//! Notification worker (spec.md §4.9): renders an HTML template per action
//! channel and dispatches it, respecting per-recipient pacing and guarding
//! the SMTP transport with a circuit breaker (spec.md §3 ambient stack).

use super::alert::FiredAlert;
use crate::config::NotificationConfig;
use crate::error::IngestError;
use crate::metrics::{self, WorkerTimer};
use crate::repository::AlertHistoryRepository;
use handlebars::Handlebars;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use monitor_core::error::{CircuitBreaker, CircuitBreakerConfig, CircuitError};
use monitor_core::model::{AlertHistoryStatus, ProjectConfig};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, warn};

const TEMPLATE_NAME: &str = "alert_email";
const TEMPLATE_SRC: &str = r#"
<h2>Alert: {{rule_type}}</h2>
<p>Project <strong>{{project_id}}</strong> crossed its threshold.</p>
<ul>
  <li>Error: {{message}}</li>
  <li>Observed value: {{triggered_value}}</li>
  <li>Threshold: {{threshold}}</li>
  <li>Occurrence count: {{occurrence_count}}</li>
</ul>
"#;

pub struct NotificationWorker {
    config: NotificationConfig,
    renderer: Handlebars<'static>,
    transport: AsyncSmtpTransport<Tokio1Executor>,
    breaker: CircuitBreaker,
    history: Arc<dyn AlertHistoryRepository>,
    /// Guards the ≥1s per-recipient pacing requirement (spec.md §4.9).
    last_send: Mutex<std::collections::HashMap<String, tokio::time::Instant>>,
}

impl NotificationWorker {
    pub fn new(
        config: NotificationConfig,
        history: Arc<dyn AlertHistoryRepository>,
    ) -> Result<Self, IngestError> {
        let mut renderer = Handlebars::new();
        renderer
            .register_template_string(TEMPLATE_NAME, TEMPLATE_SRC)
            .map_err(|e| IngestError::Internal {
                worker: "notification".to_string(),
                message: e.to_string(),
            })?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
            .port(config.smtp_port);
        if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        let transport = builder.build();

        Ok(Self {
            config,
            renderer,
            transport,
            breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
            history,
            last_send: Mutex::new(std::collections::HashMap::new()),
        })
    }

    pub async fn dispatch(&self, project: &ProjectConfig, alert: FiredAlert) -> Result<(), IngestError> {
        let _timer = WorkerTimer::start("notification");
        let Some(recipient) = &project.alert_email else {
            warn!(project_id = %project.project_id, "alert fired with no configured recipient");
            return Ok(());
        };

        self.pace(recipient).await;

        let body = self
            .renderer
            .render(
                TEMPLATE_NAME,
                &json!({
                    "rule_type": format!("{:?}", alert.rule.rule_type),
                    "project_id": project.project_id,
                    "message": alert.aggregation.message,
                    "triggered_value": alert.triggered_value,
                    "threshold": alert.rule.threshold,
                    "occurrence_count": alert.aggregation.occurrence_count,
                }),
            )
            .map_err(|e| IngestError::Internal {
                worker: "notification".to_string(),
                message: e.to_string(),
            })?;

        let message = Message::builder()
            .from(self.config.from_address.parse::<Mailbox>().map_err(|e| {
                IngestError::Internal {
                    worker: "notification".to_string(),
                    message: e.to_string(),
                }
            })?)
            .to(recipient.parse::<Mailbox>().map_err(|e| IngestError::Internal {
                worker: "notification".to_string(),
                message: e.to_string(),
            })?)
            .subject(format!("[monitor] {} alert fired", project.name))
            .header(lettre::message::header::ContentType::TEXT_HTML)
            .body(body)
            .map_err(|e| IngestError::Internal {
                worker: "notification".to_string(),
                message: e.to_string(),
            })?;

        let send_result = self
            .breaker
            .call(move || async move {
                tokio::time::timeout(self.config.timeout(), self.transport.send(message))
                    .await
                    .map_err(|_| IngestError::Transient {
                        component: "smtp".to_string(),
                        message: "send timed out".to_string(),
                    })?
                    .map_err(|e| IngestError::Transient {
                        component: "smtp".to_string(),
                        message: e.to_string(),
                    })
            })
            .await;

        match send_result {
            Ok(()) => {
                metrics::record_notification("email", "sent");
                self.mark_history(&alert, AlertHistoryStatus::Sent).await;
                Ok(())
            }
            Err(CircuitError::Open) => {
                metrics::record_notification("email", "circuit_open");
                self.mark_history(&alert, AlertHistoryStatus::Failed).await;
                Err(IngestError::Transient {
                    component: "smtp".to_string(),
                    message: "circuit open".to_string(),
                })
            }
            Err(CircuitError::Inner(e)) => {
                metrics::record_notification("email", "failed");
                error!(error = %e, "permanent notification failure");
                self.mark_history(&alert, AlertHistoryStatus::Failed).await;
                Err(e)
            }
        }
    }

    async fn pace(&self, recipient: &str) {
        let mut last_send = self.last_send.lock().await;
        if let Some(last) = last_send.get(recipient) {
            let elapsed = last.elapsed();
            if elapsed < self.config.pacing() {
                tokio::time::sleep(self.config.pacing() - elapsed).await;
            }
        }
        last_send.insert(recipient.to_string(), tokio::time::Instant::now());
    }

    /// Updates the `Pending` row the alert evaluator already inserted for
    /// this firing (spec.md §4, "one record per firing") rather than
    /// appending a second row for the same firing.
    async fn mark_history(&self, alert: &FiredAlert, status: AlertHistoryStatus) {
        if let Err(e) = self.history.update_status(&alert.history_id, status).await {
            error!(error = %e, "failed to record notification outcome");
        }
    }
}
