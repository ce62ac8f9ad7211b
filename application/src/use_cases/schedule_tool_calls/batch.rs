//! Handle on one scheduled batch of tool calls.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use toolgate_domain::ToolCallResponse;

/// Responses of one [`schedule`](super::ToolCallScheduler::schedule) call,
/// in completion order.
///
/// Exactly one response arrives per request. The batch is also a
/// [`Stream`], so it can be driven with `StreamExt::next`.
///
/// Dropping the batch cancels every call still in flight.
pub struct ToolCallBatch {
    rx: mpsc::UnboundedReceiver<ToolCallResponse>,
    expected: usize,
    received: usize,
    cancel: CancellationToken,
}

impl ToolCallBatch {
    pub(crate) fn new(
        rx: mpsc::UnboundedReceiver<ToolCallResponse>,
        expected: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            rx,
            expected,
            received: 0,
            cancel,
        }
    }

    /// Number of requests in the batch.
    pub fn len(&self) -> usize {
        self.expected
    }

    pub fn is_empty(&self) -> bool {
        self.expected == 0
    }

    /// Responses not yet received.
    pub fn remaining(&self) -> usize {
        self.expected.saturating_sub(self.received)
    }

    /// Next completed response, or `None` once every call has reported.
    pub async fn next_response(&mut self) -> Option<ToolCallResponse> {
        let response = self.rx.recv().await?;
        self.received += 1;
        Some(response)
    }

    /// Wait for every response.
    pub async fn collect_all(mut self) -> Vec<ToolCallResponse> {
        let mut responses = Vec::with_capacity(self.remaining());
        while let Some(response) = self.next_response().await {
            responses.push(response);
        }
        responses
    }

    /// Cancel every call that has not finished yet.
    ///
    /// Each of them still delivers an `aborted` response.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl Stream for ToolCallBatch {
    type Item = ToolCallResponse;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(response)) => {
                this.received += 1;
                Poll::Ready(Some(response))
            }
            other => other,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl Drop for ToolCallBatch {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
