#![allow(dead_code)]
use super::{
    CheckoutSession, CreateSessionRequest, GatewayError, GatewayEvent, PaymentGateway,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Default)]
pub struct MockGateway {
    pub created_sessions: Arc<Mutex<Vec<CheckoutSession>>>,
    pub create_requests: Arc<Mutex<Vec<CreateSessionRequest>>>,
    pub events: Arc<Mutex<Vec<GatewayEvent>>>,
    /// When set, the next session creation fails with an api error.
    pub fail_next_session: Arc<Mutex<bool>>,
    /// When set, every webhook verification fails as if the signature were bad.
    pub reject_signatures: Arc<Mutex<bool>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_next_session(self) -> Self {
        *self.fail_next_session.lock().unwrap() = true;
        self
    }

    pub fn rejecting_signatures(self) -> Self {
        *self.reject_signatures.lock().unwrap() = true;
        self
    }
}

fn make_id(prefix: &str) -> String {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    format!("{}_{}", prefix, ts)
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_checkout_session(
        &self,
        req: CreateSessionRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        {
            let mut fail = self.fail_next_session.lock().unwrap();
            if *fail {
                *fail = false;
                return Err(GatewayError::Api("simulated checkout failure".into()));
            }
        }

        self.create_requests.lock().unwrap().push(req.clone());

        let session = CheckoutSession {
            id: make_id("cs_test"),
            url: Some("https://example.test/checkout".into()),
        };
        self.created_sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        _signature_header: &str,
    ) -> Result<GatewayEvent, GatewayError> {
        if *self.reject_signatures.lock().unwrap() {
            return Err(GatewayError::Webhook("invalid signature".into()));
        }

        let val: serde_json::Value =
            serde_json::from_slice(payload).map_err(|e| GatewayError::Serde(e.to_string()))?;
        let id = match val.get("id").and_then(|v| v.as_str()) {
            Some(s) => s.to_string(),
            None => make_id("evt"),
        };
        let ty = val
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        let event = GatewayEvent {
            id,
            r#type: ty,
            payload: val,
        };
        self.events.lock().unwrap().push(event.clone());
        Ok(event)
    }
}
