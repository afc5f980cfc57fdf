//! Remote-side façade: what a UI host uses to drive the core and to serve
//! its capability calls.

pub mod capabilities;
pub mod client;

pub use capabilities::serve_capabilities;
pub use client::CoreClient;

use std::sync::Arc;

use crate::func::FuncRegistry;
use crate::server::providers::wire_toolbox;
use crate::tools::Toolbox;
use crate::transport::MessageConnection;

/// Identity stamped on errors raised by this side.
pub const REMOTE_SOURCE: &str = "scaffold-remote";

/// Outbound capability bundle for the remote side, with its own registry for
/// the closure-aware config path. The mirror of the serving side's toolbox:
/// a remote host that also embeds business logic can hand this to it.
pub struct RemoteToolbox {
    toolbox: Toolbox,
    registry: Arc<FuncRegistry>,
}

impl RemoteToolbox {
    pub fn new(conn: &Arc<MessageConnection>) -> Self {
        let registry = Arc::new(FuncRegistry::new());
        let toolbox = wire_toolbox(conn, &registry);
        Self { toolbox, registry }
    }

    pub fn toolbox(&self) -> &Toolbox {
        &self.toolbox
    }

    pub fn registry(&self) -> &Arc<FuncRegistry> {
        &self.registry
    }
}

impl std::fmt::Debug for RemoteToolbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteToolbox").finish_non_exhaustive()
    }
}
