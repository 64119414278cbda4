use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Platform-specific error: {0}")]
    PlatformError(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
}

impl AutomationError {
    /// True for the two outcomes a locator produces when nothing matched in time.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AutomationError::ElementNotFound(_) | AutomationError::Timeout(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in '{path}': {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid JSON in '{path}': {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing configuration value: {0}")]
    Missing(String),
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Failed to connect to {host}:{port}: {source}")]
    Connection {
        host: String,
        port: u16,
        #[source]
        source: sqlx::Error,
    },

    #[error("Query failed ({statement}): {source}")]
    Query {
        statement: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Cannot decode column '{column}': {message}")]
    Decode { column: String, message: String },

    #[error("Invalid SQL identifier: {0}")]
    InvalidIdentifier(String),
}

#[derive(Error, Debug)]
pub enum PickerError {
    #[error("Failed to access picker request '{path}': {source}")]
    RequestFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode picker request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to launch picker '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Picker exited with status {code:?}: {message}")]
    Exit { code: Option<i32>, message: String },

    #[error("Malformed picker response: {0}")]
    MalformedResponse(String),

    #[error("Picker schema version {found} is not supported (expected {expected})")]
    SchemaVersion { found: u32, expected: u32 },

    #[error("Picker reported an error: {0}")]
    Reported(String),
}

/// The single error a workflow driver ends with.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("{0} selection was cancelled")]
    Cancelled(String),

    #[error("No data available: {0}")]
    NoData(String),

    #[error(transparent)]
    Automation(#[from] AutomationError),

    #[error(transparent)]
    Picker(#[from] PickerError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Operator input failed: {0}")]
    OperatorInput(String),
}
