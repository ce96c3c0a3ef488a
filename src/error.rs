use thiserror::Error;

/// A control operation the coordinator refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("tracking already in progress for user '{user_id}'")]
    AlreadyActive { user_id: String },

    #[error("no session for user '{user_id}'")]
    NoSession { user_id: String },

    #[error("could not open frame feed for user '{user_id}': {reason}")]
    FeedUnavailable { user_id: String, reason: String },

    #[error("could not spawn tracking worker: {0}")]
    WorkerSpawn(String),
}

/// Why a session ended on its own.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackingFailure {
    #[error("{consecutive} consecutive frame failures, last: {last_error}")]
    TooManyFrameFailures { consecutive: u32, last_error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_user() {
        let e = SessionError::AlreadyActive { user_id: "ada".into() };
        assert_eq!(e.to_string(), "tracking already in progress for user 'ada'");
        let e = SessionError::NoSession { user_id: "bob".into() };
        assert_eq!(e.to_string(), "no session for user 'bob'");
    }
}
