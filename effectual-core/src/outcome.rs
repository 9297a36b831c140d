//! Two-armed success/failure container used for handler returns and program results

use serde::{Deserialize, Serialize};

/// Success-or-failure value returned by handlers and by finished programs.
///
/// Unlike an exception, an `Outcome` is always returned, never thrown. Every
/// value is exactly one of the two arms, and pattern matches over it are
/// exhaustive.
///
/// `Outcome` converts losslessly to and from [`std::result::Result`] so that
/// embedder code can use `?` at its own boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome<T, E> {
    /// The operation succeeded with a value.
    Ok(T),
    /// The operation failed with an error.
    Err(E),
}

impl<T, E> Outcome<T, E> {
    /// Returns `true` if this is the `Ok` arm.
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    /// Returns `true` if this is the `Err` arm.
    pub fn is_err(&self) -> bool {
        matches!(self, Outcome::Err(_))
    }

    /// Transforms the success value; an `Err` flows through unchanged.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U, E> {
        match self {
            Outcome::Ok(value) => Outcome::Ok(f(value)),
            Outcome::Err(error) => Outcome::Err(error),
        }
    }

    /// Transforms the error value; an `Ok` flows through unchanged.
    pub fn map_err<F2, F: FnOnce(E) -> F2>(self, f: F) -> Outcome<T, F2> {
        match self {
            Outcome::Ok(value) => Outcome::Ok(value),
            Outcome::Err(error) => Outcome::Err(f(error)),
        }
    }

    /// Sequences a fallible continuation: `Ok(v)` becomes `f(v)`, an `Err`
    /// short-circuits without invoking `f`.
    pub fn and_then<U, F: FnOnce(T) -> Outcome<U, E>>(self, f: F) -> Outcome<U, E> {
        match self {
            Outcome::Ok(value) => f(value),
            Outcome::Err(error) => Outcome::Err(error),
        }
    }

    /// Borrows both arms.
    pub fn as_ref(&self) -> Outcome<&T, &E> {
        match self {
            Outcome::Ok(value) => Outcome::Ok(value),
            Outcome::Err(error) => Outcome::Err(error),
        }
    }

    /// Extracts the success value, discarding an error.
    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Ok(value) => Some(value),
            Outcome::Err(_) => None,
        }
    }

    /// Extracts the error value, discarding a success.
    pub fn err(self) -> Option<E> {
        match self {
            Outcome::Ok(_) => None,
            Outcome::Err(error) => Some(error),
        }
    }

    /// Converts into a [`std::result::Result`] for `?`-based composition.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Outcome::Ok(value) => Ok(value),
            Outcome::Err(error) => Err(error),
        }
    }
}

impl<T, E: std::fmt::Debug> Outcome<T, E> {
    /// Extracts the success value, panicking with a diagnostic on the `Err`
    /// arm. Test-only; production code pattern-matches instead.
    #[track_caller]
    pub fn unwrap_ok(self) -> T {
        match self {
            Outcome::Ok(value) => value,
            Outcome::Err(error) => panic!("expected Ok, got Err({error:?})"),
        }
    }
}

impl<T: std::fmt::Debug, E> Outcome<T, E> {
    /// Extracts the error value, panicking with a diagnostic on the `Ok`
    /// arm. Test-only; production code pattern-matches instead.
    #[track_caller]
    pub fn unwrap_err(self) -> E {
        match self {
            Outcome::Ok(value) => panic!("expected Err, got Ok({value:?})"),
            Outcome::Err(error) => error,
        }
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Outcome::Ok(value),
            Err(error) => Outcome::Err(error),
        }
    }
}

impl<T, E> From<Outcome<T, E>> for Result<T, E> {
    fn from(outcome: Outcome<T, E>) -> Self {
        outcome.into_result()
    }
}
