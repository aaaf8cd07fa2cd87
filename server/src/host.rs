//! Start-up barrier for a server that also runs its own client
//!
//! In host mode the game must not be initialized before both the server loop
//! and the in-process client are up, otherwise the first broadcasts would miss
//! the local client. [`HostReadiness`] is signalled once by each side and
//! resolves [`HostReadiness::wait`] when both have.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Flags {
    server: bool,
    client: bool,
}

impl Flags {
    fn ready(&self) -> bool {
        self.server && self.client
    }
}

#[derive(Debug, Clone)]
pub struct HostReadiness {
    flags: Arc<watch::Sender<Flags>>,
}

impl HostReadiness {
    /// Waits for both the server and the local client.
    pub fn host() -> Self {
        let (flags, _) = watch::channel(Flags::default());
        Self {
            flags: Arc::new(flags),
        }
    }

    /// No local client: only the server side has to start.
    pub fn dedicated() -> Self {
        let readiness = Self::host();
        readiness.mark_client_started();
        readiness
    }

    pub fn mark_server_started(&self) {
        self.flags.send_modify(|flags| flags.server = true);
    }

    pub fn mark_client_started(&self) {
        self.flags.send_modify(|flags| flags.client = true);
    }

    pub fn is_ready(&self) -> bool {
        self.flags.borrow().ready()
    }

    /// Resolves once both sides have started.
    pub async fn wait(&self) {
        let mut flags = self.flags.subscribe();
        loop {
            if flags.borrow_and_update().ready() {
                return;
            }
            // The sender lives in `self`, so this only fails if it is dropped mid-wait.
            if flags.changed().await.is_err() {
                return;
            }
        }
    }
}
