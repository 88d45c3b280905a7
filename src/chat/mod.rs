// Chat relay: session registry, relation store and message router
//
// Clients connect over TCP, claim a unique display name, then exchange
// newline-delimited lines. The router decides who receives each line,
// honoring per-sender block lists and private groups.

pub mod error;
pub mod session;
pub mod registry;
pub mod relations;
pub mod command;
pub mod codec;
pub mod router;
pub mod handler;
pub mod server;
pub mod config;
pub mod cli;

pub use error::{ChatError, ChatResult};
pub use session::{Session, SessionId};
pub use registry::Registry;
pub use relations::RelationStore;
pub use command::{Command, ServerLine};
pub use codec::LineCodec;
pub use router::{Dispatch, Router};
pub use handler::{handle_connection, ConnectionHandler, HandlerState};
pub use server::{Relay, RelayHandle, RelayServer};
pub use config::RelayConfig;
pub use cli::RelayCli;
