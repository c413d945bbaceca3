use async_trait::async_trait;
use vtc_core::{
    domain::value_objects::payments::NewPaymentIntent,
    payments::{
        errors::PaymentGatewayError,
        stripe_client::StripeClient,
        types::{PaymentIntent, StripeEvent},
    },
};

pub type GatewayResult<T> = std::result::Result<T, PaymentGatewayError>;

/// The only door to the payment provider. Stateless: every call stands alone.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_intent(&self, intent: &NewPaymentIntent) -> GatewayResult<PaymentIntent>;

    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
        expand: &[String],
    ) -> GatewayResult<PaymentIntent>;

    /// `WebhooksDisabled` means "no secret configured", never "verified".
    fn verify_webhook_event(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> GatewayResult<StripeEvent>;
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_payment_intent(&self, intent: &NewPaymentIntent) -> GatewayResult<PaymentIntent> {
        self.create_payment_intent(intent).await
    }

    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
        expand: &[String],
    ) -> GatewayResult<PaymentIntent> {
        self.retrieve_payment_intent(payment_intent_id, expand).await
    }

    fn verify_webhook_event(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> GatewayResult<StripeEvent> {
        self.verify_webhook_event(payload, signature_header)
    }
}
