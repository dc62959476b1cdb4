//! In-memory model server used by unit tests

use super::{ModelServerApi, SubscriptionEvent};
use crate::domain::results::{ValidationError, ValidationResult};
use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};

pub(crate) const SOURCE: &str = "org.eclipse.emf.ecore.model";

/// Constraint map with classifier 1 / feature 5 carrying a white space facet
pub(crate) fn constraint_payload() -> JsonValue {
    json!({
        "1": {
            "5": {
                "whiteSpace": 2,
                "enumeration": [],
                "pattern": [],
                "totalDigits": -1,
                "fractionDigits": -1,
                "length": -1,
                "minLength": -1,
                "maxLength": -1,
                "minExclusive": null,
                "maxExclusive": null,
                "minInclusive": null,
                "maxInclusive": null
            }
        }
    })
}

/// Diagnostic with two issues, severities 29 and 6 from the same source
pub(crate) fn two_issue_diagnostic() -> JsonValue {
    json!({
        "severity": 4,
        "source": "org.eclipse.emf.ecore",
        "code": 0,
        "message": "Diagnosis of test",
        "data": [],
        "children": [
            {
                "severity": 29,
                "source": SOURCE,
                "code": 1,
                "message": "The name 'my-class' is not well formed",
                "data": [{ "id": "//MyClass" }]
            },
            {
                "severity": 6,
                "source": SOURCE,
                "code": 2,
                "message": "The typed element must have a type",
                "data": [{ "id": "//MyClass/title" }]
            }
        ]
    })
}

/// Diagnostic of a model without issues
pub(crate) fn empty_diagnostic() -> JsonValue {
    json!({
        "severity": 0,
        "source": "org.eclipse.emf.ecore",
        "code": 0,
        "message": "Diagnosis of empty",
        "data": [],
        "children": []
    })
}

#[derive(Default)]
pub(crate) struct MockModelServer {
    constraints: Mutex<Option<JsonValue>>,
    validation: Mutex<Option<JsonValue>>,
    subscription: Mutex<Option<mpsc::Receiver<SubscriptionEvent>>>,
    /// When set, `fetch_validation` waits for a permit before returning
    gate: Option<Arc<Notify>>,
    /// Signalled once `fetch_validation` has captured its response
    pub(crate) entered: Arc<Notify>,
    pub(crate) validation_calls: AtomicUsize,
}

impl MockModelServer {
    /// Server answering with the standard fixtures
    pub(crate) fn new() -> Self {
        let server = Self::default();
        server.set_constraints(Some(constraint_payload()));
        server.set_validation(Some(two_issue_diagnostic()));
        server
    }

    /// Hold every validation response until `gate` is notified
    pub(crate) fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    /// `None` makes the next constraint fetches fail
    pub(crate) fn set_constraints(&self, payload: Option<JsonValue>) {
        *self.constraints.lock().unwrap() = payload;
    }

    /// `None` makes the next validation fetches fail
    pub(crate) fn set_validation(&self, payload: Option<JsonValue>) {
        *self.validation.lock().unwrap() = payload;
    }

    /// Prepare the channel handed out by the next `subscribe`
    pub(crate) fn prepare_subscription(&self) -> mpsc::Sender<SubscriptionEvent> {
        let (tx, rx) = mpsc::channel(16);
        *self.subscription.lock().unwrap() = Some(rx);
        tx
    }
}

#[async_trait]
impl ModelServerApi for MockModelServer {
    async fn fetch_constraints(&self, _model_uri: &str) -> ValidationResult<JsonValue> {
        self.constraints
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ValidationError::fetch("HTTP 500 Internal Server Error: mock"))
    }

    async fn fetch_validation(&self, _model_uri: &str) -> ValidationResult<JsonValue> {
        self.validation_calls.fetch_add(1, Ordering::SeqCst);
        let response = self.validation.lock().unwrap().clone();
        self.entered.notify_one();

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        response.ok_or_else(|| ValidationError::fetch("connection refused"))
    }

    async fn subscribe(
        &self,
        _model_uri: &str,
    ) -> ValidationResult<mpsc::Receiver<SubscriptionEvent>> {
        self.subscription
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| ValidationError::subscription("no subscription prepared"))
    }
}
