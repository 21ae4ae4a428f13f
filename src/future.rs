use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::TryFuture;
use pin_project::pin_project;
use tokio::time::{sleep, Sleep};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::error::Error;

/// Produces a fresh `Future` for every attempt.
///
/// Has a blanket implementation for `FnMut` closures returning a
/// `TryFuture` with [Error] as its error type, so most callers pass a
/// closure such as `|| async { ... }`.
pub trait Operation {
    type Future: TryFuture<Error = Error>;

    fn call(&mut self) -> Self::Future;
}

impl<T, Fut> Operation for T
where
    T: FnMut() -> Fut,
    Fut: TryFuture<Error = Error>,
{
    type Future = Fut;

    fn call(&mut self) -> Fut {
        (self)()
    }
}

/// Delay between two attempts which resolves early with
/// [Interrupted](crate::ErrorKind::Interrupted) once its token is cancelled.
///
/// Cancellation is checked before the timer, so a token that is already
/// cancelled interrupts even a zero delay.
#[pin_project]
pub struct Wait {
    #[pin]
    delay: Sleep,
    #[pin]
    cancelled: WaitForCancellationFutureOwned,
}

impl Wait {
    pub fn new(duration: Duration, token: CancellationToken) -> Self {
        Self { delay: sleep(duration), cancelled: token.cancelled_owned() }
    }
}

impl Future for Wait {
    type Output = Result<(), Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        if this.cancelled.poll(cx).is_ready() {
            return Poll::Ready(Err(Error::interrupted()));
        }
        this.delay.poll(cx).map(Ok)
    }
}
