use agentdeck_primitives::schemas::capability::Capability;
use agentdeck_primitives::schemas::provider::ProviderKind;
use std::fmt;

use super::providers::LlmOperation;

#[derive(Debug)]
pub enum LlmProviderError {
    UrlNotSet,
    ApiKeyNotSet,
    Reqwest(reqwest::Error),
    NetworkError(String),
    OperationNotSupported {
        operation: LlmOperation,
        provider: ProviderKind,
    },
    ProviderDisabled(ProviderKind),
    CapabilityNotPermitted {
        provider: ProviderKind,
        capability: Capability,
    },
    VendorError {
        status: u16,
        message: String,
    },
    UnexpectedResponseFormat(String),
    SerdeError(serde_json::Error),
    Timeout(String),
}

impl fmt::Display for LlmProviderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LlmProviderError::UrlNotSet => write!(f, "URL is not set"),
            LlmProviderError::ApiKeyNotSet => write!(f, "API Key not set"),
            LlmProviderError::Reqwest(err) => write!(f, "Reqwest error: {}", err),
            LlmProviderError::NetworkError(s) => write!(f, "Network error: {}", s),
            LlmProviderError::OperationNotSupported { operation, provider } => {
                write!(f, "{} is not supported by {}", operation, provider)
            }
            LlmProviderError::ProviderDisabled(provider) => {
                write!(f, "Provider {} is disabled in settings", provider)
            }
            LlmProviderError::CapabilityNotPermitted { provider, capability } => {
                write!(f, "Capability {} is not permitted for {}", capability, provider)
            }
            LlmProviderError::VendorError { status, message } => {
                write!(f, "Vendor API error ({}): {}", status, message)
            }
            LlmProviderError::UnexpectedResponseFormat(s) => {
                write!(f, "Unexpected response format: {}", s)
            }
            LlmProviderError::SerdeError(err) => write!(f, "Serde error: {}", err),
            LlmProviderError::Timeout(s) => write!(f, "Request timed out: {}", s),
        }
    }
}

impl std::error::Error for LlmProviderError {}

impl From<reqwest::Error> for LlmProviderError {
    fn from(err: reqwest::Error) -> LlmProviderError {
        if err.is_timeout() {
            LlmProviderError::Timeout(err.to_string())
        } else {
            LlmProviderError::Reqwest(err)
        }
    }
}

impl From<serde_json::Error> for LlmProviderError {
    fn from(err: serde_json::Error) -> LlmProviderError {
        LlmProviderError::SerdeError(err)
    }
}
