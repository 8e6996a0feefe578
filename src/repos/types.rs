use failure::Error as FailureError;

/// Repos layer result
pub type RepoResult<T> = Result<T, FailureError>;
