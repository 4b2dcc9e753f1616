use std::{
    any::Any,
    fmt::{Display, Write},
    panic::{self, AssertUnwindSafe},
};

use tracing::debug;

use crate::Error;

/// Detail reported when an operation failed without saying why.
pub const NON_DESCRIPTIVE_FAILURE: &str = "operation failed without a descriptive message";

fn describe<E: Display>(err: E) -> Option<String> {
    let mut detail = String::new();
    write!(detail, "{err}").ok()?;
    (!detail.is_empty()).then_some(detail)
}

/// Never panics: a `Display` impl that errors or panics counts as no message.
pub(crate) fn from_error<E: Display>(err: E) -> Error {
    let detail = panic::catch_unwind(AssertUnwindSafe(|| describe(err)))
        .ok()
        .flatten();
    Error::OperationFailed(detail.unwrap_or_else(|| NON_DESCRIPTIVE_FAILURE.to_string()))
}

pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Error {
    if let Some(s) = payload.downcast_ref::<&str>() {
        from_error(s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        from_error(s)
    } else {
        non_descriptive()
    }
}

pub(crate) fn non_descriptive() -> Error {
    Error::OperationFailed(NON_DESCRIPTIVE_FAILURE.to_string())
}

/// Fold the outcome of a `catch_unwind`-wrapped operation into what callers see.
pub(crate) fn settle<T, E: Display>(
    caught: Result<Result<T, E>, Box<dyn Any + Send>>,
) -> Result<T, Error> {
    match caught {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            let err = from_error(err);
            debug!(detail = err.detail(), "operation returned an error");
            Err(err)
        }
        Err(payload) => {
            let err = from_panic(payload);
            debug!(detail = err.detail(), "operation panicked");
            Err(err)
        }
    }
}
