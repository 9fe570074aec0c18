//! Subscription Stream
//!
//! The consumer end of a multicast stream. Dropping a subscription detaches
//! it from the registry that feeds it.

use futures::Stream;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

type Detach = Box<dyn FnOnce() + Send + Sync>;

pub struct Subscription<T> {
    receiver: mpsc::UnboundedReceiver<T>,
    detach: Option<Detach>,
}

impl<T> Subscription<T> {
    pub(crate) fn new(
        receiver: mpsc::UnboundedReceiver<T>,
        detach: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            receiver,
            detach: Some(Box::new(detach)),
        }
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.receiver.poll_recv(cx)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
