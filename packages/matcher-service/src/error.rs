use crate::round::RoundPhase;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Not enough participants to run a round: {waiting} waiting.")]
	InsufficientParticipants { waiting: usize },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Round timed out in phase {phase}.")]
	Timeout { phase: RoundPhase },
	#[error("Internal error: {message}")]
	Internal { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<matcher_storage::Error> for Error {
	fn from(err: matcher_storage::Error) -> Self {
		match err {
			matcher_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			matcher_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			matcher_storage::Error::NotFound(message) => Self::NotFound { message },
			matcher_storage::Error::Conflict(message) => Self::Storage { message },
		}
	}
}

impl From<matcher_domain::Error> for Error {
	fn from(err: matcher_domain::Error) -> Self {
		Self::Internal { message: err.to_string() }
	}
}
