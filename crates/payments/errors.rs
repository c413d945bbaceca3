use thiserror::Error;

/// Failures of the payment provider gateway.
#[derive(Debug, Error)]
pub enum PaymentGatewayError {
    #[error("payment intent not found: {0}")]
    NotFound(String),

    /// The provider rejected the call or could not be reached. `message` is the
    /// provider's own message whenever it sent one.
    #[error("{message}")]
    Provider {
        status: Option<u16>,
        code: Option<String>,
        message: String,
    },

    #[error("webhook signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("webhook secret is not configured")]
    WebhooksDisabled,

    #[error("invalid webhook payload: {0}")]
    MalformedEvent(String),
}

impl PaymentGatewayError {
    pub fn provider(message: impl Into<String>) -> Self {
        PaymentGatewayError::Provider {
            status: None,
            code: None,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for PaymentGatewayError {
    fn from(err: reqwest::Error) -> Self {
        PaymentGatewayError::Provider {
            status: err.status().map(|status| status.as_u16()),
            code: None,
            message: err.to_string(),
        }
    }
}
