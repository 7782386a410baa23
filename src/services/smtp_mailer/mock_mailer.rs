use super::{MailError, Mailer};
use async_trait::async_trait;
use std::sync::Mutex;

/// A mock mailer that records sent emails for testing purposes.
#[derive(Debug, Default)]
pub struct MockMailer {
    pub sent_confirmations: Mutex<Vec<(String, String, i64)>>,
    pub fail_send: bool,
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send_booking_confirmation(
        &self,
        to: &str,
        reference: &str,
        amount_cents: i64,
    ) -> Result<(), MailError> {
        if self.fail_send {
            return Err(MailError::Other("mock failure".into()));
        }
        self.sent_confirmations.lock().unwrap().push((
            to.to_string(),
            reference.to_string(),
            amount_cents,
        ));
        Ok(())
    }
}
