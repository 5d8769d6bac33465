use thiserror::Error;

/// Failures raised by the promise engine itself.
///
/// `Error` is also the default rejection reason of a [`Promise`](crate::Promise);
/// custom reason types only need `From<Error>` so the engine can report
/// self-resolution through them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// `Promise::try_new` was handed no resolver.
    #[error("Must pass resolver function")]
    NotCallable,
    /// A promise was resolved with itself.
    #[error("Cannot fulfill promise with itself")]
    SelfResolution,
    /// Free-form rejection reason.
    #[error("{0}")]
    Reason(String),
}

impl From<&str> for Error {
    fn from(reason: &str) -> Self {
        Error::Reason(reason.to_owned())
    }
}

impl From<String> for Error {
    fn from(reason: String) -> Self {
        Error::Reason(reason)
    }
}
