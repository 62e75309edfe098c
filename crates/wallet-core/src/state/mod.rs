//! State tracking for transaction flows.
//!
//! Every flow run walks the same lifecycle, validated against a static
//! transition table.

pub mod flow;

pub use flow::{FlowState, FlowStateMachine};
