#![deny(unsafe_code)]
#![warn(missing_docs)]
//! enrich-orchestrator
//!
//! The orchestrator (C4), fan-out planner (C5), and aggregator/ticket
//! builder (C6), plus the `Broker`, `ObjectStore`, and `HelpDesk`
//! collaborator traits the core dispatches through.

/// `Broker`, `ObjectStore`, and `HelpDesk` traits and their in-memory
/// implementations.
pub mod collaborators;
/// Fan-out planner (C5).
pub mod fanout;
/// Orchestrator (C4).
pub mod orchestrator;
/// Deterministic task id construction.
pub mod task_id;
/// Aggregator / ticket builder (C6).
pub mod ticket;
/// Ticket storage.
pub mod tickets;

pub use collaborators::{Broker, HelpDesk, InMemoryBroker, InMemoryObjectStore, ObjectStore, SandboxHelpDesk};
pub use fanout::FanoutPlanner;
pub use orchestrator::Orchestrator;
pub use ticket::TicketBuilder;
pub use tickets::{InMemoryTicketStore, TicketStore};
