//! Core traits for the voice agent system.
//!
//! Currently holds the call state machine's event/action vocabulary. Other
//! components (carrier, model session, analyzer, principle engine, hedge
//! selector) are concrete types rather than swappable trait objects, since
//! this system has exactly one implementation of each.

mod fsm;

pub use fsm::{
    CallGuards, CallState, ConversationEvent, ConversationFSM, FSMAction, FSMCheckpoint, FSMError,
    FSMMetrics,
};
