pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Policy context is not initialized for this session.")]
	PolicyNotInitialized,
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Web search error: {message}")]
	WebSearch { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Qdrant error: {message}")]
	Qdrant { message: String },
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<nuri_storage::Error> for Error {
	fn from(err: nuri_storage::Error) -> Self {
		match err {
			nuri_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			nuri_storage::Error::Qdrant(inner) => Self::Qdrant { message: inner.to_string() },
			nuri_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			nuri_storage::Error::NotFound(message) => Self::NotFound { message },
		}
	}
}
