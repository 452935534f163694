//! Synchronization daemon: unit registry, watcher dispatch with debouncing,
//! and the HTTP + WebSocket control plane.

pub mod debounce;
mod error;
pub mod open;
pub mod orchestrator;
pub mod protocol;
pub mod registry;
mod runtime;
pub mod server;

pub use debounce::Debouncer;
pub use error::DaemonError;
pub use open::{resolve_tool, EditorPreferences, Launcher, SystemLauncher, Tool};
pub use orchestrator::{DispatchKey, Orchestrator, Reconcile};
pub use protocol::{ClientRequest, Command, OpenRequest, OpenResponse, ServerMessage};
pub use registry::{Registry, SharedUnit};
pub use runtime::{init_tracing, run, start_blocking, RunOptions};
pub use server::{create_router, AppState};
