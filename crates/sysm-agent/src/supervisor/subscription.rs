use futures::stream::{self, Stream};
use sysm_types::{BackendId, StatusRecord};
use tokio::sync::watch;

/// Read side of a supervisor's record stream.
///
/// The first `next()` yields the current record immediately, every
/// later one waits for a change. Dropping the subscription cancels it.
pub struct Subscription {
    backend_id: BackendId,
    receiver: watch::Receiver<StatusRecord>,
    primed: bool,
}

impl Subscription {
    pub(crate) fn new(backend_id: BackendId, receiver: watch::Receiver<StatusRecord>) -> Self {
        Self {
            backend_id,
            receiver,
            primed: true,
        }
    }

    pub fn backend_id(&self) -> &BackendId {
        &self.backend_id
    }

    pub fn current(&self) -> StatusRecord {
        self.receiver.borrow().clone()
    }

    pub fn has_pending(&self) -> bool {
        self.primed || self.receiver.has_changed().unwrap_or(false)
    }

    /// Next record, or `None` once the supervisor is gone.
    pub async fn next(&mut self) -> Option<StatusRecord> {
        if self.primed {
            self.primed = false;
        } else {
            self.receiver.changed().await.ok()?;
        }
        let record = self.receiver.borrow_and_update().clone();
        Some(record)
    }

    pub fn into_stream(self) -> impl Stream<Item = StatusRecord> + Send + 'static {
        stream::unfold(self, |mut subscription| async move {
            let record = subscription.next().await?;
            Some((record, subscription))
        })
    }
}
