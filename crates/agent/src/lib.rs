//! The conversational agent core.
//!
//! One inbound message becomes one turn: resolve who is speaking, bind the
//! workspace, load the durable session, and route through the confirmation
//! gate, the attachment intake, or intent classification. The agent never
//! executes a mutation from classification alone (an explicit confirmed
//! reply is always interposed) and never holds conversation state outside
//! the session row.

mod binder;
mod gate;
mod intake;
mod responses;
mod summary;

pub mod error;
pub mod turn;

pub use {
    error::{Error, Result},
    turn::{Agent, AgentDeps, ops},
};
