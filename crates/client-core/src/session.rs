//! The live object for one connect-to-disconnect attempt

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use webphone_auth_core::{Credential, Identity};

use crate::transport::SessionTransport;
use crate::types::SessionId;

/// One authenticated connection attempt
///
/// Owned exclusively by the controller. Dropping it discards the credential,
/// releases the transport handle and aborts the session's pending timers.
pub struct CallSession {
    id: SessionId,
    identity: Identity,
    credential: Option<Credential>,
    transport: Option<Box<dyn SessionTransport>>,
    created_at: DateTime<Utc>,
    tasks: Vec<JoinHandle<()>>,
}

impl CallSession {
    pub fn new(identity: Identity) -> Self {
        Self {
            id: SessionId::new(),
            identity,
            credential: None,
            transport: None,
            created_at: Utc::now(),
            tasks: Vec::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn transport(&self) -> Option<&dyn SessionTransport> {
        self.transport.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn attach(&mut self, credential: Credential, transport: Box<dyn SessionTransport>) {
        self.credential = Some(credential);
        self.transport = Some(transport);
    }

    /// Tie a background task (timer, token request, event pump) to this session
    pub(crate) fn track(&mut self, task: JoinHandle<()>) {
        self.tasks.retain(|t| !t.is_finished());
        self.tasks.push(task);
    }
}

impl Drop for CallSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl std::fmt::Debug for CallSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSession")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("credential", &self.credential)
            .field("transport_attached", &self.transport.is_some())
            .field("created_at", &self.created_at)
            .field("tasks", &self.tasks.len())
            .finish()
    }
}
