//! Server-side façade: the operation table and its outbound capability
//! adapters.

pub mod connection;
pub mod providers;

pub use connection::{ServerConnection, SERVER_SOURCE};
pub use providers::wire_toolbox;
