use rust_decimal::Decimal;
use thiserror::Error;

use crate::ports::{CacheError, SourceError, StoreError};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("weight {weight} for code `{code}` is outside [0, 1]")]
    InvalidWeight { code: String, weight: Decimal },
    #[error("invalid period: {0}")]
    InvalidPeriod(String),
    #[error("invalid scenario: {0}")]
    InvalidScenario(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("crm source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("snapshot cache unavailable: {0}")]
    CacheUnavailable(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<SourceError> for ApplicationError {
    fn from(value: SourceError) -> Self {
        match value {
            SourceError::Configuration(message) => Self::Configuration(message),
            other => Self::SourceUnavailable(other.to_string()),
        }
    }
}

impl From<CacheError> for ApplicationError {
    fn from(value: CacheError) -> Self {
        Self::CacheUnavailable(value.to_string())
    }
}

impl From<StoreError> for ApplicationError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Domain(error) => Self::Domain(error),
            StoreError::Unavailable(message) => Self::Persistence(message),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id: "unassigned".into() }
            }
            ApplicationError::SourceUnavailable(message)
            | ApplicationError::CacheUnavailable(message)
            | ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::errors::{ApplicationError, DomainError, InterfaceError};
    use crate::ports::{SourceError, StoreError};

    #[test]
    fn invalid_weight_maps_to_bad_request_interface_error() {
        let interface = ApplicationError::from(DomainError::InvalidWeight {
            code: "2".to_owned(),
            weight: Decimal::new(12, 1),
        })
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn source_failure_maps_to_service_unavailable() {
        let interface = ApplicationError::from(SourceError::Unavailable {
            endpoint: "/orders".to_owned(),
            message: "status 502".to_owned(),
        })
        .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.correlation_id(), "req-2");
    }

    #[test]
    fn missing_token_maps_to_internal() {
        let interface =
            ApplicationError::from(SourceError::Configuration("crm.api_token is not set".into()))
                .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }

    #[test]
    fn store_domain_error_keeps_domain_classification() {
        let error = ApplicationError::from(StoreError::Domain(DomainError::InvalidWeight {
            code: "3".to_owned(),
            weight: Decimal::TWO,
        }));
        assert!(matches!(error, ApplicationError::Domain(DomainError::InvalidWeight { .. })));
    }
}
