use std::future::Future;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::client::{Counter, CountersReport};
use crate::domain::CTVError;

/// Result of a request, delivered back to the table on the UI side.
#[derive(Debug)]
pub enum Completion {
    CountersLoaded {
        generation: u64,
        result: Result<CountersReport, CTVError>,
    },
    CounterReset {
        id: String,
        generation: u64,
        result: Result<Counter, CTVError>,
    },
}

/// Bookkeeping of a request that has not completed yet.
#[derive(Debug, Clone)]
pub struct InFlight {
    pub generation: u64,
    pub token: CancellationToken,
}

/// Handle to a spawned request. Await [`RequestHandle::join`] to run code after
/// its completion was queued.
pub struct RequestHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl RequestHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!("Request task failed: {e}");
        }
    }
}

/// Spawns `request` and sends its completion to `tx`. If `token` is cancelled
/// first, the completion carries [`CTVError::Cancelled`].
pub fn spawn_request<F, T>(
    token: CancellationToken,
    tx: UnboundedSender<Completion>,
    request: F,
    complete: impl FnOnce(Result<T, CTVError>) -> Completion + Send + 'static,
) -> RequestHandle
where
    F: Future<Output = Result<T, CTVError>> + Send + 'static,
    T: Send + 'static,
{
    let child = token.clone();
    let task = tokio::spawn(async move {
        let result = tokio::select! {
            biased;
            _ = child.cancelled() => {
                trace!("Request cancelled");
                Err(CTVError::Cancelled)
            }
            result = request => result,
        };
        if tx.send(complete(result)).is_err() {
            trace!("Completion dropped, table is gone");
        }
    });
    RequestHandle { token, task }
}
