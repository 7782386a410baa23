use super::{
    CheckoutSession, CreateSessionRequest, GatewayError, GatewayEvent, PaymentGateway,
    SessionLineItem,
};
use async_trait::async_trait;

pub struct LiveStripeGateway {
    client: stripe::Client,
    webhook_secret: String,
    currency: String,
}

impl LiveStripeGateway {
    pub fn new(
        secret_key: impl Into<String>,
        webhook_secret: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        let client = stripe::Client::new(secret_key);
        Self {
            client,
            webhook_secret: webhook_secret.into(),
            currency: currency.into(),
        }
    }

    pub fn from_settings(settings: &crate::config::StripeSettings) -> Self {
        Self::new(
            settings.secret_key.clone(),
            settings.webhook_secret.clone(),
            settings.currency.clone(),
        )
    }

    fn parse_currency(&self) -> Result<stripe::Currency, GatewayError> {
        serde_json::from_value(serde_json::Value::String(self.currency.to_lowercase()))
            .map_err(|_| GatewayError::Other(format!("unsupported currency: {}", self.currency)))
    }
}

fn map_line_items(
    items: &[SessionLineItem],
    currency: stripe::Currency,
) -> Vec<stripe::CreateCheckoutSessionLineItems> {
    items
        .iter()
        .map(|li| stripe::CreateCheckoutSessionLineItems {
            price_data: Some(stripe::CreateCheckoutSessionLineItemsPriceData {
                currency,
                unit_amount: Some(li.unit_amount_cents),
                product_data: Some(stripe::CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: li.name.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            quantity: Some(li.quantity),
            ..Default::default()
        })
        .collect()
}

#[async_trait]
impl PaymentGateway for LiveStripeGateway {
    async fn create_checkout_session(
        &self,
        req: CreateSessionRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let currency = self.parse_currency()?;

        let mut params = stripe::CreateCheckoutSession::new();
        params.mode = Some(stripe::CheckoutSessionMode::Payment);
        params.success_url = Some(&req.success_url);
        params.cancel_url = Some(&req.cancel_url);
        params.client_reference_id = Some(&req.reference);
        params.expires_at = Some(req.expires_at);
        params.payment_method_types = Some(vec![
            stripe::CreateCheckoutSessionPaymentMethodTypes::Card,
        ]);

        let mut metadata = std::collections::HashMap::new();
        metadata.insert(
            "transaction_id".to_string(),
            req.transaction_id.to_string(),
        );
        metadata.insert("user_id".to_string(), req.user_id.to_string());
        metadata.insert("reference".to_string(), req.reference.clone());
        params.metadata = Some(metadata);

        if !req.line_items.is_empty() {
            params.line_items = Some(map_line_items(&req.line_items, currency));
        }

        let session = stripe::CheckoutSession::create(&self.client, params).await?;
        Ok(CheckoutSession {
            id: session.id.to_string(),
            url: session.url.clone(),
        })
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<GatewayEvent, GatewayError> {
        let payload_str =
            std::str::from_utf8(payload).map_err(|e| GatewayError::Serde(e.to_string()))?;
        let event =
            stripe::Webhook::construct_event(payload_str, signature_header, &self.webhook_secret)?;
        let payload =
            serde_json::to_value(&event).map_err(|e| GatewayError::Serde(e.to_string()))?;
        Ok(GatewayEvent {
            id: event.id.to_string(),
            r#type: event.type_.to_string(),
            payload,
        })
    }
}
