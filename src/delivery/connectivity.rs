use tokio::sync::watch;
use tracing::info;

/// Online/offline signal shared by the pipeline.
///
/// The connectivity source (outside the core) reports discrete transitions;
/// the uploader holds a receiver and re-checks it before every delivery
/// attempt. Each offline→online edge wakes the uploader loop.
pub struct ConnectivityGate {
    tx: watch::Sender<bool>,
}

impl ConnectivityGate {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _) = watch::channel(initially_online);
        Self { tx }
    }

    /// Report the network as reachable. Returns whether this was a transition.
    ///
    /// Subscribers are only notified on actual transitions, so repeated
    /// reports of the same state are no-ops.
    pub fn set_online(&self) -> bool {
        let changed = self.tx.send_if_modified(|online| {
            if *online {
                false
            } else {
                *online = true;
                true
            }
        });
        if changed {
            info!("Connectivity restored");
        }
        changed
    }

    /// Report the network as unreachable. Returns whether this was a transition.
    pub fn set_offline(&self) -> bool {
        let changed = self.tx.send_if_modified(|online| {
            if *online {
                *online = false;
                true
            } else {
                false
            }
        });
        if changed {
            info!("Connectivity lost");
        }
        changed
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityGate {
    fn default() -> Self {
        Self::new(true)
    }
}
