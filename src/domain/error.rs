//! Domain error types.

/// Top-level error type for alertsim.
///
/// `Data` means a collaborator could not be reached at all and the run
/// aborts. A ticker with an empty history is not an error: the simulator
/// skips it for the day. `MalformedData` means the collaborator returned
/// content it must never return (unparseable bar, negative volume) and the
/// run aborts rather than silently defaulting fields.
#[derive(Debug, thiserror::Error)]
pub enum AlertsimError {
    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("malformed data for {ticker}: {reason}")]
    MalformedData { ticker: String, reason: String },

    #[error("alert log error: {reason}")]
    AlertLog { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&AlertsimError> for std::process::ExitCode {
    fn from(err: &AlertsimError) -> Self {
        let code: u8 = match err {
            AlertsimError::Io(_) => 1,
            AlertsimError::ConfigParse { .. }
            | AlertsimError::ConfigMissing { .. }
            | AlertsimError::ConfigInvalid { .. } => 2,
            AlertsimError::Data { .. } | AlertsimError::MalformedData { .. } => 3,
            AlertsimError::AlertLog { .. } => 4,
            AlertsimError::Report { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
