/// The error every caller of a flight receives when the operation failed.
///
/// The executor and each waiter get their own clone, carrying the same detail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The operation returned an error or panicked.
    #[error("{0}")]
    OperationFailed(String),
}

impl Error {
    /// Human readable description of the failure.
    pub fn detail(&self) -> &str {
        match self {
            Self::OperationFailed(detail) => detail,
        }
    }
}
