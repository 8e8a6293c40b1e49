//! Error taxonomy for the benchmark driver.
//!
//! Three layers of failure exist here:
//!
//! - [`AdminError`] - raised by [`AdminGateway`](crate::admin::AdminGateway)
//!   implementations for individual administrative calls
//! - [`SetupError`] - fatal provisioning failure; wraps the admin error
//!   together with the provisioning stage that was executing
//! - [`DriverError`] - per-call runtime failures (topic administration,
//!   subscribe, produce) surfaced to the harness as-is, without retry

use thiserror::Error;

/// Errors raised by administrative gateway operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// The resource already exists. Benign for tenant creation, where
    /// concurrent benchmark workers race on the shared tenant.
    #[error("resource already exists: {0}")]
    Conflict(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("admin transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected admin response for {operation} (status {status}): {body}")]
    Unexpected {
        operation: String,
        status: u16,
        body: String,
    },

    /// Catch-all for gateway implementations that are not HTTP-backed.
    #[error("admin operation failed: {0}")]
    Operation(String),
}

pub type AdminResult<T> = std::result::Result<T, AdminError>;

/// The stage of the provisioning state machine that was executing when a
/// setup failure occurred. The machine is linear with no backward
/// transitions: tenant, then namespace, then policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStage {
    EnsuringTenant,
    CreatingNamespace,
    ApplyingPolicies,
}

impl std::fmt::Display for ProvisionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::EnsuringTenant => "ensuring tenant",
            Self::CreatingNamespace => "creating namespace",
            Self::ApplyingPolicies => "applying namespace policies",
        };
        write!(f, "{name}")
    }
}

/// Fatal initialization failure. Any admin failure during provisioning,
/// except the tolerated tenant-already-exists conflict, aborts
/// initialization with this error and the driver never becomes usable.
#[derive(Debug, Error)]
#[error("driver setup failed while {stage}: {source}")]
pub struct SetupError {
    pub stage: ProvisionStage,
    #[source]
    pub source: AdminError,
}

impl SetupError {
    pub(crate) fn at(stage: ProvisionStage) -> impl FnOnce(AdminError) -> SetupError {
        move |source| SetupError { stage, source }
    }
}

/// Errors raised by data-plane gateway operations (producer construction,
/// subscription, publish, receive, acknowledge).
#[derive(Debug, Clone, Error)]
pub enum DataPlaneError {
    #[error("client error: {0}")]
    Client(String),

    /// The underlying consumer or producer has been closed.
    #[error("connection closed")]
    Closed,
}

pub type DataPlaneResult<T> = std::result::Result<T, DataPlaneError>;

/// Runtime errors surfaced to the harness per call. No retry policy is
/// applied anywhere; handling these is the caller's responsibility.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The operation requires a provisioned namespace but `initialize` has
    /// not completed successfully.
    #[error("driver is not initialized")]
    NotInitialized,

    #[error("topic administration failed: {0}")]
    Admin(#[from] AdminError),

    #[error("subscribe failed on {topic}: {source}")]
    Subscribe {
        topic: String,
        #[source]
        source: DataPlaneError,
    },

    #[error("produce failed on {topic}: {source}")]
    Produce {
        topic: String,
        #[source]
        source: DataPlaneError,
    },
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;
