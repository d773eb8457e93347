//! Attach seam for external redefinition agents.
//!
//! A host runtime that supports live code replacement plugs in here: the
//! provider attaches to a process once at startup, the handle loads the
//! redefinition agent into it and carries the actual redefinition calls.
//! No provider means no in-place redefinition, which degrades the
//! coordinator to generation swaps.

use std::path::Path;

use crate::core::QualifiedName;
use crate::loader::ReloadingClassLoader;
use crate::log;
use crate::model::ClassModel;
use crate::redefine::{RedefineError, RedefinitionGateway};

/// Live attach connection to a redefinition-capable process.
pub trait AgentHandle: Send + Sync {
    /// Inject the redefinition agent into the attached process.
    fn load_agent(&self, agent_path: &Path, params: &str) -> Result<(), RedefineError>;

    /// Apply one redefinition batch through the loaded agent.
    fn redefine(&self, updates: &[(QualifiedName, ClassModel)]) -> Result<(), RedefineError>;

    /// Release the attach connection. Called once, when the gateway drops.
    fn detach(&self) {}
}

/// Attempts to attach to a process. Attach is tried once; failure is normal
/// and simply leaves the handle absent.
pub trait AttachProvider: Send + Sync {
    fn attach(&self, pid: u32) -> Option<Box<dyn AgentHandle>>;
}

/// Provider for environments with no attach facility at all.
pub struct NoAttach;

impl AttachProvider for NoAttach {
    fn attach(&self, _pid: u32) -> Option<Box<dyn AgentHandle>> {
        None
    }
}

/// Gateway backed by an agent attached to the current process.
pub struct AgentGateway {
    handle: Option<Box<dyn AgentHandle>>,
}

impl AgentGateway {
    /// Attach to the current process and load the agent. A failed attach or
    /// agent load leaves the gateway incapable.
    pub fn new(provider: &dyn AttachProvider, agent_path: &Path, params: &str) -> Self {
        let handle = provider.attach(std::process::id()).and_then(|handle| {
            if let Err(e) = handle.load_agent(agent_path, params) {
                log!("redefine"; "agent load failed: {e}");
                handle.detach();
                return None;
            }
            Some(handle)
        });
        Self { handle }
    }
}

impl RedefinitionGateway for AgentGateway {
    fn capable(&self) -> bool {
        self.handle.is_some()
    }

    fn redefine(
        &self,
        _loader: &ReloadingClassLoader,
        updates: &[(QualifiedName, ClassModel)],
    ) -> Result<(), RedefineError> {
        match &self.handle {
            Some(handle) => handle.redefine(updates),
            None => Err(RedefineError::Unavailable),
        }
    }
}

impl Drop for AgentGateway {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.detach();
        }
    }
}
