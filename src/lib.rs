//! Bidirectional JSON-RPC bridge between a project-configuration core and
//! remote UI hosts.
//!
//! One connection carries traffic both ways: the remote host invokes
//! lifecycle operations (`server/*`), while the serving core reaches back
//! over the same connection for logging, telemetry, tokens, and interactive
//! prompts (`logger/*`, `telemetry/*`, `token/*`, `ui/*`).
//!
//! The tricky part is the question tree: it embeds live closures (dynamic
//! defaults, validators, selection reactions) that cannot cross a process
//! boundary. Before a tree is serialized, each closure is parked in a
//! per-connection registry and replaced by a `{kind, handle}` reference; the
//! far side invokes it later via the `func/*` methods.
//!
//! Layering, bottom up:
//! - [`transport`]: JSON Lines frames, cancellation, the multiplexed
//!   [`transport::MessageConnection`].
//! - [`func`]: closure registry, invoker, and the `func/*` wire facility.
//! - [`question`]: tree model, validation rules, traversal, serializer.
//! - [`tools`] / [`engine`]: capability traits and the business-logic seam.
//! - [`server`] / [`remote`]: the two façades over one connection.

pub mod config;
pub mod correlator;
pub mod engine;
pub mod error;
pub mod func;
pub mod inputs;
pub mod question;
pub mod remote;
pub mod server;
pub mod tools;
pub mod transport;

pub use engine::{Engine, NullEngine};
pub use error::{OpError, OpResult, SystemError, UserError};
pub use inputs::{Inputs, Platform, Stage};
pub use remote::{serve_capabilities, CoreClient, RemoteToolbox, REMOTE_SOURCE};
pub use server::{ServerConnection, SERVER_SOURCE};
pub use tools::Toolbox;
pub use transport::MessageConnection;
