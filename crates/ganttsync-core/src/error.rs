use std::fmt;

/// Machine-readable error codes for operator-friendly diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    TaskNotFound,
    DuplicateTaskId,
    CycleDetected,
    InvalidTimestamp,
    InvalidFormInput,
    NothingSelected,
    MalformedTable,
    TableLoadRejected,
    EndpointUnreachable,
    ServerRejected,
    MalformedResponse,
    PlaceholderNotPending,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1002",
            Self::TaskNotFound => "E2001",
            Self::DuplicateTaskId => "E2002",
            Self::CycleDetected => "E2003",
            Self::InvalidTimestamp => "E2005",
            Self::InvalidFormInput => "E2006",
            Self::NothingSelected => "E2007",
            Self::MalformedTable => "E3001",
            Self::TableLoadRejected => "E3002",
            Self::EndpointUnreachable => "E5001",
            Self::ServerRejected => "E5002",
            Self::MalformedResponse => "E5003",
            Self::PlaceholderNotPending => "E6001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::TaskNotFound => "Task not found",
            Self::DuplicateTaskId => "Task ID already in use",
            Self::CycleDetected => "Move would create a cycle",
            Self::InvalidTimestamp => "Invalid timestamp",
            Self::InvalidFormInput => "Invalid data, please recheck",
            Self::NothingSelected => "No task selected",
            Self::MalformedTable => "Malformed task table",
            Self::TableLoadRejected => "Server refused the task table",
            Self::EndpointUnreachable => "Persistence endpoint unreachable",
            Self::ServerRejected => "Persistence request rejected",
            Self::MalformedResponse => "Malformed persistence response",
            Self::PlaceholderNotPending => "Placeholder has no pending creation",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .ganttsync/config.toml and retry."),
            Self::TaskNotFound | Self::PlaceholderNotPending => None,
            Self::DuplicateTaskId => Some("Reload the task table; another row already has this ID."),
            Self::CycleDetected => Some("A task cannot be moved under itself or its descendants."),
            Self::InvalidTimestamp => Some("Use the `YYYY-MM-DD HH:MM:SS` format."),
            Self::InvalidFormInput => Some("Fill in name, actual start, and actual end."),
            Self::NothingSelected => Some("Select a task first with `select <id>`."),
            Self::MalformedTable => Some("Check the rows returned by the data endpoint."),
            Self::TableLoadRejected => Some("Check the server logs of the data endpoint."),
            Self::EndpointUnreachable => {
                Some("Check `endpoint.base_url` in .ganttsync/config.toml or GANTTSYNC_ENDPOINT.")
            }
            Self::ServerRejected => Some("The local tree may now differ from the server; reload."),
            Self::MalformedResponse => Some("The endpoint must answer with a JSON object."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
