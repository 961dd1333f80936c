use crate::core::CoreStatus;
use crate::error::Error;

/// Converts the result of an operation into the signed status of the handle interface.
///
/// Failures map to the negative code of their [`ErrorKind`](crate::ErrorKind).
/// Successes map to zero, or to the value they carry when it is a count, a flag or a status.
pub trait IntoStatus {
    /// The status code.
    fn into_status(self) -> i32;
}

fn status<T>(result: Result<T, Error>, value: impl FnOnce(T) -> i32) -> i32 {
    match result {
        Ok(v) => value(v),
        Err(e) => e.status_code(),
    }
}

impl IntoStatus for Result<(), Error> {
    fn into_status(self) -> i32 {
        status(self, |()| 0)
    }
}

impl IntoStatus for Result<bool, Error> {
    fn into_status(self) -> i32 {
        status(self, i32::from)
    }
}

impl IntoStatus for Result<u32, Error> {
    fn into_status(self) -> i32 {
        status(self, |v| i32::try_from(v).unwrap_or(i32::MAX))
    }
}

impl IntoStatus for Result<usize, Error> {
    fn into_status(self) -> i32 {
        status(self, |v| i32::try_from(v).unwrap_or(i32::MAX))
    }
}

impl IntoStatus for Result<CoreStatus, Error> {
    fn into_status(self) -> i32 {
        status(self, |s| s.code() as i32)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::HaltReason;

    #[test]
    fn successes() {
        assert_eq!(Ok::<(), Error>(()).into_status(), 0);
        assert_eq!(Ok::<bool, Error>(true).into_status(), 1);
        assert_eq!(Ok::<usize, Error>(3).into_status(), 3);
        assert_eq!(Ok::<u32, Error>(u32::MAX).into_status(), i32::MAX);
        assert_eq!(
            Ok::<CoreStatus, Error>(CoreStatus::Halted(HaltReason::Step)).into_status(),
            1
        );
    }

    #[test]
    fn failures() {
        assert_eq!(Err::<(), Error>(Error::Timeout).into_status(), -6);
        assert_eq!(Err::<usize, Error>(Error::InvalidSession(0)).into_status(), -2);
        assert_eq!(Err::<bool, Error>(Error::CoreNotFound(4)).into_status(), -3);
    }
}
