//! Call supervisor, call state machine, and WebSocket/HTTP control plane.

pub mod error;
pub mod fsm;
pub mod http;
pub mod metrics;
pub mod state;
pub mod supervisor;
pub mod ws;

pub use error::ServerError;
pub use fsm::CallStateMachine;
pub use http::create_router;
pub use metrics::init_metrics;
pub use state::AppState;
pub use supervisor::{CallContext, CallSupervisor};
