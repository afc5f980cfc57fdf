//! Wire transport: JSON-RPC-shaped frames over JSON Lines, a cancellation
//! token, and the bidirectional multiplexed connection.

pub mod cancel;
pub mod connection;
pub mod frame;

pub use cancel::CancelToken;
pub use connection::{MessageConnection, CANCEL_METHOD};
pub use frame::{param, Message, NotificationFrame, RequestFrame, ResponseFrame, JSONRPC_VERSION};
