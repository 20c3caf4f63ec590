use std::time::Duration;
use tokio::sync::watch;

/// Owner side of a stop signal. Dropping it does not count as a stop.
pub struct StopHandle {
    sender: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct StopToken {
    receiver: watch::Receiver<bool>,
}

pub fn stop_pair() -> (StopHandle, StopToken) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { sender: tx }, StopToken { receiver: rx })
}

impl StopHandle {
    /// Returns true only for the call that actually flipped the signal.
    pub fn stop(&self) -> bool {
        self.sender.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                true
            }
        })
    }

    pub fn is_stopped(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn token(&self) -> StopToken {
        StopToken {
            receiver: self.sender.subscribe(),
        }
    }
}

impl StopToken {
    pub fn is_stopped(&self) -> bool {
        *self.receiver.borrow()
    }

    pub async fn stopped(&mut self) {
        while !*self.receiver.borrow_and_update() {
            if self.receiver.changed().await.is_err() {
                // handle gone without stopping: never resolves
                std::future::pending::<()>().await;
            }
        }
    }

    /// Sleeps for `duration` unless stopped first. Returns false when stopped.
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        if self.is_stopped() {
            return false;
        }
        tokio::select! {
            biased;
            _ = self.stopped() => false,
            _ = tokio::time::sleep(duration) => !self.is_stopped(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let (handle, token) = stop_pair();
        assert!(!token.is_stopped());
        assert!(handle.stop());
        assert!(!handle.stop());
        assert!(token.is_stopped());
        assert!(handle.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_interrupted_by_stop() {
        let (handle, mut token) = stop_pair();
        let sleeper = tokio::spawn(async move { token.sleep(Duration::from_secs(60)).await });

        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.stop();

        assert!(!sleeper.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes() {
        let (_handle, mut token) = stop_pair();
        assert!(token.sleep(Duration::from_millis(500)).await);
    }
}
