//! The loop that steps a program and dispatches its effects through a handler

use crate::error::Error;
use crate::handler::HandlerContract;
use crate::outcome::Outcome;
use crate::program::Program;

/// Drive `program` to completion against `handler`.
///
/// Each yielded effect is dispatched in program order; each `Ok` reply is
/// checked against the effect's designated reply set and fed back into the
/// program. The first handler `Err` terminates the run immediately: the
/// program is never resumed, no finalizer inside it runs, and no further
/// effect is dispatched.
///
/// The driver performs no retry, no timeout, and no parallelism. Exactly one
/// of `Ok(final_value)`, `Err(first_handler_error)`, or `Err(program_error)`
/// comes back.
pub async fn run_program<R, H>(mut program: Program<R>, handler: &H) -> Outcome<R, Error>
where
    H: HandlerContract + ?Sized,
{
    loop {
        match program {
            Program::Completed(value) => return Outcome::Ok(value),
            Program::Errored(error) => {
                tracing::warn!(effect = %error.effect().tag(), "program stopped on internal error");
                return Outcome::Err(error);
            }
            Program::Yielded(effect, resume) => {
                tracing::debug!(effect = %effect.tag(), family = %effect.family(), "dispatching effect");
                match handler.handle(effect.clone()).await {
                    Outcome::Ok(reply) => {
                        if !effect.accepts(&reply) {
                            tracing::error!(
                                effect = %effect.tag(),
                                reply = %reply.tag(),
                                "handler returned reply outside the effect's designated set"
                            );
                            return Outcome::Err(Error::IllTypedReply {
                                reply_tag: reply.tag(),
                                effect,
                            });
                        }
                        program = resume(reply);
                    }
                    Outcome::Err(error) => {
                        tracing::warn!(
                            effect = %effect.tag(),
                            retryable = error.is_retryable(),
                            "handler failed; aborting program"
                        );
                        return Outcome::Err(error);
                    }
                }
            }
        }
    }
}
