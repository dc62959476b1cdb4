//! Live validation over a server subscription
//!
//! Architecture: Event Adapter - SubscriptionListener turns server events into framework updates
//! - Opening the channel seeds the results with one validation request
//! - `validationResult` pushes replace the raw results without a round trip
//! - Failures are reported per event and never end the subscription

use crate::client::{ModelServerNotification, SubscriptionEvent, VALIDATION_RESULT_KIND};
use crate::domain::results::{ValidationError, ValidationResult};
use crate::ValidationFramework;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Feeds subscription events for one model into its framework
#[derive(Debug, Clone)]
pub struct SubscriptionListener {
    id: Uuid,
    framework: Arc<ValidationFramework>,
}

/// What happened over the lifetime of a subscription
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSummary {
    pub notifications: usize,
    pub updates: usize,
    pub failures: usize,
}

impl SubscriptionListener {
    pub fn new(framework: Arc<ValidationFramework>) -> Self {
        Self {
            id: Uuid::new_v4(),
            framework,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Seed the results once the channel is established
    pub async fn on_open(&self) -> ValidationResult<()> {
        info!(
            subscription = %self.id,
            model_uri = %self.framework.model_uri(),
            "Subscription opened"
        );

        self.framework
            .validate()
            .await
            .map_err(|e| ValidationError::subscription_open(e.to_string()))
    }

    /// Handle one pushed notification
    ///
    /// Returns whether the results were replaced. Notifications of other
    /// kinds are ignored.
    pub fn on_notification(&self, notification: &ModelServerNotification) -> ValidationResult<bool> {
        if notification.kind != VALIDATION_RESULT_KIND {
            trace!(subscription = %self.id, kind = %notification.kind, "Ignoring notification");
            return Ok(false);
        }

        let count = self.framework.apply_diagnostic(notification.payload.as_deref())?;
        debug!(subscription = %self.id, issues = count, "Validation result pushed");
        Ok(true)
    }

    /// Process events until the channel closes
    pub async fn run(&self, mut events: mpsc::Receiver<SubscriptionEvent>) -> SubscriptionSummary {
        let mut summary = SubscriptionSummary::default();

        while let Some(event) = events.recv().await {
            match event {
                SubscriptionEvent::Open => {
                    if let Err(e) = self.on_open().await {
                        warn!(subscription = %self.id, error = %e, "Initial validation failed");
                        summary.failures += 1;
                    } else {
                        summary.updates += 1;
                    }
                }
                SubscriptionEvent::Notification(notification) => {
                    summary.notifications += 1;
                    match self.on_notification(&notification) {
                        Ok(true) => summary.updates += 1,
                        Ok(false) => {}
                        Err(e) => {
                            warn!(subscription = %self.id, error = %e, "Dropping pushed result");
                            summary.failures += 1;
                        }
                    }
                }
                SubscriptionEvent::Error(message) => {
                    warn!(subscription = %self.id, error = %message, "Subscription transport error");
                    summary.failures += 1;
                }
                SubscriptionEvent::Closed => break,
            }
        }

        info!(
            subscription = %self.id,
            notifications = summary.notifications,
            failures = summary.failures,
            "Subscription closed"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{self, MockModelServer, SOURCE};
    use crate::domain::results::{ValidationFilter, ValidationResultItem};

    fn listener() -> (SubscriptionListener, Arc<MockModelServer>) {
        let server = Arc::new(MockModelServer::new());
        let framework = ValidationFramework::new(
            "test",
            Arc::clone(&server) as Arc<dyn crate::ModelServerApi>,
            |_: &[ValidationResultItem]| {},
        );
        (SubscriptionListener::new(Arc::new(framework)), server)
    }

    #[tokio::test]
    async fn test_subscription() -> ValidationResult<()> {
        let (listener, _) = listener();

        listener.on_open().await?;
        assert_eq!(listener.framework.recent_validation_result().len(), 2);

        let notification =
            ModelServerNotification::validation_result(mock::empty_diagnostic().to_string());
        assert!(listener.on_notification(&notification)?);
        assert_eq!(listener.framework.recent_validation_result().len(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_absent_payload_clears_results() -> ValidationResult<()> {
        let (listener, _) = listener();
        listener.on_open().await?;

        listener.on_notification(&ModelServerNotification::new(VALIDATION_RESULT_KIND, None))?;
        assert!(listener.framework.raw_validation_result().is_empty());

        listener.on_open().await?;
        listener.on_notification(&ModelServerNotification::validation_result(""))?;
        assert!(listener.framework.raw_validation_result().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_pushed_result_respects_filters() -> ValidationResult<()> {
        let (listener, _) = listener();
        listener
            .framework
            .add_validation_filter(vec![ValidationFilter::new(29, SOURCE)]);

        let notification =
            ModelServerNotification::validation_result(mock::two_issue_diagnostic().to_string());
        listener.on_notification(&notification)?;

        assert_eq!(listener.framework.raw_validation_result().len(), 2);
        assert_eq!(listener.framework.recent_validation_result().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_other_kinds_are_ignored() -> ValidationResult<()> {
        let (listener, _) = listener();
        listener.on_open().await?;

        let notification = ModelServerNotification::new("dirtyState", Some("true".to_string()));
        assert!(!listener.on_notification(&notification)?);
        assert_eq!(listener.framework.recent_validation_result().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_open_failure_is_reported() {
        let (listener, server) = listener();
        server.set_validation(None);

        let result = listener.on_open().await;
        assert!(matches!(result, Err(ValidationError::SubscriptionOpen { .. })));
    }

    #[tokio::test]
    async fn test_run_survives_failures() {
        let (listener, server) = listener();
        server.set_validation(None);
        let tx = server.prepare_subscription();
        let events = listener.framework.subscribe().await.unwrap();

        let two = mock::two_issue_diagnostic().to_string();
        for event in [
            SubscriptionEvent::Open,
            SubscriptionEvent::Notification(ModelServerNotification::validation_result("{oops")),
            SubscriptionEvent::Notification(ModelServerNotification::new("keepAlive", None)),
            SubscriptionEvent::Notification(ModelServerNotification::validation_result(two)),
            SubscriptionEvent::Closed,
        ] {
            tx.send(event).await.unwrap();
        }

        let summary = listener.run(events).await;

        assert_eq!(
            summary,
            SubscriptionSummary {
                notifications: 3,
                updates: 1,
                failures: 2,
            }
        );
        assert_eq!(listener.framework.recent_validation_result().len(), 2);
    }
}
