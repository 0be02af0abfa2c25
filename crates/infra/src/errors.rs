//! Conversions from external infrastructure errors into domain errors.

use deskbot_domain::DeskbotError;
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can
/// be converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub DeskbotError);

impl From<InfraError> for DeskbotError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<DeskbotError> for InfraError {
    fn from(value: DeskbotError) -> Self {
        InfraError(value)
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → DeskbotError */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        if value.is_timeout() {
            return InfraError(DeskbotError::Network("HTTP request timed out".into()));
        }

        if value.is_connect() {
            return InfraError(DeskbotError::Network("HTTP connection failure".into()));
        }

        if let Some(status) = value.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            let mapped = match code {
                401 | 403 => DeskbotError::Auth(message),
                404 => DeskbotError::NotFound(message),
                429 => DeskbotError::Network(message),
                400..=499 => DeskbotError::InvalidInput(message),
                _ => DeskbotError::Network(message),
            };
            return InfraError(mapped);
        }

        InfraError(DeskbotError::Network(value.to_string()))
    }
}
