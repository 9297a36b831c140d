//! Programs as values: a cooperative producer of effects and consumer of replies
//!
//! A [`Program`] is a state machine with three observable states: it has
//! yielded an effect and is waiting for a reply, it has completed with a final
//! value, or it has stopped on an internal error. The continuation encoding
//! makes resuming a completed program unrepresentable: the only way to advance
//! past a yield is to consume the stored continuation with a reply.
//!
//! Programs describe; they never execute. All I/O happens inside handlers, so
//! a program must not hold sockets, locks, or other external resources across
//! a yield.
//!
//! # Domain errors vs runtime errors
//!
//! A program's final value is its own business: domain-level failures are
//! modelled by completing with `Outcome<T, AppError>` (the application's own
//! error type), while [`Program::errored`] and handler failures abort the run
//! with a runtime [`Error`]. Infrastructure fails the program; domain
//! failures are values.

use std::fmt;

use crate::effect::Effect;
use crate::error::Error;
use crate::reply::Reply;

/// Continuation resumed with the reply to a yielded effect.
pub type Continuation<R> = Box<dyn FnOnce(Reply) -> Program<R> + Send>;

/// A suspended computation that yields effects and consumes replies.
pub enum Program<R> {
    /// The program finished with a final value
    Completed(R),
    /// The program stopped on an internal error
    Errored(Error),
    /// The program yielded an effect and awaits a reply in its designated set
    Yielded(Effect, Continuation<R>),
}

impl<R> Program<R> {
    /// A program that immediately completes with `value`.
    pub fn completed(value: R) -> Self {
        Self::Completed(value)
    }

    /// A program that immediately stops with a runtime error.
    pub fn errored(error: Error) -> Self {
        Self::Errored(error)
    }

    /// Returns `true` when the program has yielded and awaits a reply.
    pub fn is_yielded(&self) -> bool {
        matches!(self, Self::Yielded(..))
    }
}

impl Program<Reply> {
    /// Yield a single effect; the program completes with the handler's reply.
    ///
    /// This is the primitive every other combinator builds on:
    ///
    /// ```
    /// use effectual_core::prelude::*;
    ///
    /// let program = Program::perform(Effect::ReceiveText).and_then(|reply| {
    ///     match reply {
    ///         Reply::Text { text } => Program::completed(text.len()),
    ///         _ => Program::completed(0),
    ///     }
    /// });
    /// assert!(program.is_yielded());
    /// ```
    pub fn perform(effect: Effect) -> Program<Reply> {
        Program::Yielded(effect, Box::new(Program::Completed))
    }
}

impl<R: Send + 'static> Program<R> {
    /// Sequence a continuation after this program completes.
    ///
    /// Yields flow through untouched; an error skips `f` entirely.
    pub fn and_then<U, F>(self, f: F) -> Program<U>
    where
        F: FnOnce(R) -> Program<U> + Send + 'static,
    {
        match self {
            Self::Completed(value) => f(value),
            Self::Errored(error) => Program::Errored(error),
            Self::Yielded(effect, resume) => {
                Program::Yielded(effect, Box::new(move |reply| resume(reply).and_then(f)))
            }
        }
    }

    /// Transform the final value without further effects.
    pub fn map<U, F>(self, f: F) -> Program<U>
    where
        F: FnOnce(R) -> U + Send + 'static,
    {
        self.and_then(move |value| Program::Completed(f(value)))
    }
}

/// Run a sub-program inline.
///
/// Every yield of `sub` flows to the outer driver unchanged, and its final
/// value becomes the expression value at the call site. A runtime error in
/// the sub-program aborts the outer program too.
///
/// With the continuation encoding a sub-program already composes by value;
/// `delegate` names the seam so call sites read as intent.
pub fn delegate<R>(sub: Program<R>) -> Program<R> {
    sub
}

impl<R: fmt::Debug> fmt::Debug for Program<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed(value) => f.debug_tuple("Completed").field(value).finish(),
            Self::Errored(error) => f.debug_tuple("Errored").field(error).finish(),
            Self::Yielded(effect, _) => f
                .debug_struct("Yielded")
                .field("effect", &effect.tag())
                .finish_non_exhaustive(),
        }
    }
}
