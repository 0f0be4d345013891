// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// The finalizer that marks "remote cleanup still owed".
///
/// Renaming it strands every existing object behind a finalizer nobody removes.
pub const FINALIZER: &str = "appoptics.io";

/// The operator name used as event reporter.
pub const OPERATOR_NAME: &str = "appoptics";

/// Key inside the referenced Secret that holds the API token.
pub const TOKEN_KEY: &str = "token";

/// CRD group and polling configuration
pub mod crd {
    pub const GROUP: &str = "appoptics.io";
    pub const VERSION: &str = "v1";
    /// Initial polling interval in seconds when waiting for CRDs
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}

/// Remote API defaults
pub mod remote {
    pub const DEFAULT_BASE_URL: &str = "https://api.appoptics.com/v1/";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    /// Error message the remote API puts in `errors.request` for absent objects
    pub const NOT_FOUND_MARKER: &str = "Not Found";
}

/// Per-key retry backoff of the work queue
pub mod queue {
    pub const BASE_DELAY_MS: u64 = 5;
    pub const MAX_DELAY_SECS: u64 = 1000;
}

/// Event reasons attached to managed resources
pub mod reasons {
    pub const SUCCESS_UPDATE: &str = "SuccessUpdate";
    pub const ERR_UPDATE_STATUS: &str = "ErrUpdateStatus";
    pub const SYNC_FAILED: &str = "SyncFailed";
    pub const INVALID_SPEC: &str = "InvalidSpec";
    pub const DELETED: &str = "Deleted";
}
