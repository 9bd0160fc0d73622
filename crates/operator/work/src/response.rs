//! Async response bridge
//!
//! Turns one outstanding API call into a step-chain suspension. When the
//! call completes, its outcome is normalized:
//!
//! - success goes to [`ResponseStep::on_success`] with the result;
//! - a 404 is a success with no result, so "does not exist" is an ordinary
//!   branch for reads and deletes;
//! - any other failure goes to the registered conflict step, or fails the
//!   fiber when there is none.

use crate::error::{ApiError, Result};
use crate::packet::Packet;
use crate::step::{NextAction, Resumption, StepRef};
use std::future::Future;
use tracing::{debug, warn};

/// Outcome of a remote API call
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Handler resumed by an external API call
pub trait ResponseStep<T>: Send + Sync + 'static {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Where [`NextAction::Continue`] returned by the handlers leads
    fn next(&self) -> Option<StepRef>;

    /// Step that receives failures other than 404
    fn conflict_step(&self) -> Option<StepRef> {
        None
    }

    /// `result` is `None` when the resource does not exist.
    fn on_success(&self, packet: &mut Packet, result: Option<T>) -> Result<NextAction>;

    fn on_failure(&self, packet: &mut Packet, error: ApiError) -> Result<NextAction> {
        if error.is_not_found() {
            debug!(step = self.name(), "Resource not found, continuing with no result");
            return self.on_success(packet, None);
        }

        match self.conflict_step() {
            Some(conflict) => {
                warn!(
                    step = self.name(),
                    status = error.status_code,
                    conflict_step = conflict.name(),
                    error = %error,
                    "API call failed, routing to conflict step"
                );
                Ok(NextAction::Goto(conflict))
            }
            None => Err(error.into()),
        }
    }
}

/// Suspend the chain on `call`, resuming through `response`.
pub fn await_response<T, F, R>(call: F, response: R) -> NextAction
where
    T: Send + 'static,
    F: Future<Output = ApiResult<T>> + Send + 'static,
    R: ResponseStep<T>,
{
    NextAction::suspend(async move {
        let outcome = call.await;
        let next = response.next();
        Resumption::new(next, move |packet| match outcome {
            Ok(value) => response.on_success(packet, Some(value)),
            Err(error) => response.on_failure(packet, error),
        })
    })
}
