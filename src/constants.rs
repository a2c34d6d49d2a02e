//! # Constants
//!
//! Default values and well-known names used across the controller.

/// Finalizer guarding Aqua cleanup before an `AquaScannerAccount` is removed
pub const FINALIZER: &str = "mamoa.devops.gov.bc.ca/finalizer";

/// Field manager recorded on every patch issued by the controller
pub const FIELD_MANAGER: &str = "aqua-scanner-account-controller";

/// Namespace annotation holding the team contact list
pub const CONTACTS_ANNOTATION: &str = "contacts";

/// Contact role whose email owns the provisioned Aqua objects
pub const TECHNICAL_LEAD_ROLE: &str = "Technical Lead";

/// Prefix of the derived Aqua account name (`ScannerCLI_<namespace>`)
pub const DEFAULT_ACCOUNT_NAME_PREFIX: &str = "ScannerCLI_";

/// Namespaces an account may be created in must end with this suffix
pub const DEFAULT_REQUIRED_NAMESPACE_SUFFIX: &str = "-tools";

/// Generated user password length
pub const DEFAULT_PASSWORD_LENGTH: usize = 16;

/// Timeout for a single Aqua API request (seconds)
pub const DEFAULT_AQUA_HTTP_TIMEOUT_SECS: u64 = 30;

/// Minimum error backoff (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Maximum error backoff (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Interval between login checks while Aqua refuses the controller's credentials (seconds)
pub const DEFAULT_LOGIN_RECHECK_SECS: u64 = 300;

/// Requeue delay used when the backoff state cannot be read
pub const DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS: u64 = 60;

/// HTTP server port for metrics and health checks
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// How long to wait for the HTTP server to bind
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Poll interval while waiting for the HTTP server
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;
