#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("invalid month delta: {0} (expected one of -12, -1, 1, 12)")]
    InvalidDelta(i32),

    #[error("invalid first weekday: {0} (expected 0-6, 0 = Sunday)")]
    InvalidFirstWeekday(i64),

    #[error("no month has been loaded yet")]
    NotLoaded,

    #[error("month {year}-{month:02} is outside the supported calendar range")]
    OutOfRange { year: i32, month: u32 },

    #[error("invalid day key: {0}")]
    InvalidDayKey(String),

    #[error("invalid month: {0} (expected YYYY-MM)")]
    InvalidMonth(String),
}

/// Failure reported by a handler while fetching month data.
///
/// `Transport` covers I/O and malformed responses, `Endpoint` an error
/// payload returned by the data service itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataLoadError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("endpoint error: {0}")]
    Endpoint(String),
}

impl DataLoadError {
    pub fn transport(cause: impl std::fmt::Display) -> Self {
        Self::Transport(cause.to_string())
    }

    pub fn endpoint(cause: impl std::fmt::Display) -> Self {
        Self::Endpoint(cause.to_string())
    }

    pub fn cause(&self) -> &str {
        match self {
            Self::Transport(cause) | Self::Endpoint(cause) => cause,
        }
    }

    /// Translation key of the notice prefix for this failure.
    pub fn notice_key(&self) -> &'static str {
        match self {
            Self::Transport(_) => "TransportError",
            Self::Endpoint(_) => "EndPointError",
        }
    }
}
