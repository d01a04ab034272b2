//! # homeguard-app
//!
//! Application layer — the request pipeline and **port definitions**
//! (traits).
//!
//! ## Responsibilities
//! - The **registry** of live items (arena of entities, sentinel lookups)
//! - The **request queue** — the single producer/consumer synchronization
//!   boundary of the pipeline
//! - The **rule engine** — default-deny filtering and rewriting of every
//!   inbound request
//! - The **controller** — command dispatch, detection accumulation, and
//!   the dwelling mode machine driver (`tick`/`run`)
//! - The **watchdog** checks — periodic element sweep, aggregates, and
//!   mode/detection timeouts
//! - Define **port traits** that adapters implement:
//!   - [`ports::Outbound`] — fire-and-forget per-node message delivery
//!   - [`ports::SettingsStore`] — settings persistence on explicit command
//!
//! ## Dependency rule
//! Depends on `homeguard-domain` only. Never imports adapter crates;
//! adapters depend on *this* crate, not the reverse.

pub mod controller;
pub mod element;
pub mod engine;
pub mod group;
pub mod item;
pub mod machine;
pub mod ports;
pub mod queue;
pub mod registry;
pub mod request;
pub mod watchdog;

pub use controller::Controller;
pub use element::ElementService;
pub use engine::RuleEngine;
pub use item::{Item, ItemRef};
pub use machine::Machine;
pub use queue::RequestQueue;
pub use registry::Registry;
pub use request::Request;
pub use watchdog::Watchdog;
