//! Failure taxonomy for the check suite.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckError {
    /// A bounded wait never became true. Carries the expectation that failed.
    #[error("timed out after {timeout:?} waiting for {expectation}")]
    TimeoutExceeded {
        expectation: String,
        timeout: Duration,
    },

    /// A structural container expected to exist never appeared.
    #[error("region never appeared: {region}")]
    RegionNotFound { region: String },

    /// A recovered fact violated an expected invariant. The only failure kind
    /// that fails a scenario for a business reason rather than an
    /// infrastructure one.
    #[error("assertion failed: {0}")]
    AssertionFailed(String),

    /// Scenario input rejected at parse time.
    #[error("invalid scenario input: {0}")]
    InvalidScenario(String),

    /// Anything the browser driver reports.
    #[error(transparent)]
    Driver(#[from] anyhow::Error),
}

impl CheckError {
    pub fn assertion(msg: impl Into<String>) -> Self {
        Self::AssertionFailed(msg.into())
    }

    /// Infrastructure failures are recoverable per listing: the loop logs and
    /// moves on. Assertion and input failures always abort the scenario.
    pub fn is_per_listing_recoverable(&self) -> bool {
        matches!(
            self,
            Self::TimeoutExceeded { .. } | Self::RegionNotFound { .. } | Self::Driver(_)
        )
    }
}

pub type CheckResult<T> = Result<T, CheckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_the_expectation() {
        let err = CheckError::TimeoutExceeded {
            expectation: "results cards to appear".into(),
            timeout: Duration::from_secs(10),
        };
        let msg = err.to_string();
        assert!(msg.contains("results cards to appear"));
        assert!(msg.contains("10s"));
    }

    #[test]
    fn recoverability_split() {
        assert!(CheckError::RegionNotFound {
            region: "overview".into()
        }
        .is_per_listing_recoverable());
        assert!(CheckError::Driver(anyhow::anyhow!("tab crashed")).is_per_listing_recoverable());
        assert!(!CheckError::assertion("2 bedrooms < 3").is_per_listing_recoverable());
        assert!(!CheckError::InvalidScenario("bad row".into()).is_per_listing_recoverable());
    }
}
