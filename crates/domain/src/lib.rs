//! # homeguard-domain
//!
//! Pure domain model for the homeguard home-automation controller.
//!
//! ## Responsibilities
//! - Foundational types: identifiers, error conventions, timestamps
//! - Define **Values** and **Messages** (the open key→value vocabulary
//!   exchanged with device adapters)
//! - Define **Commands** (the closed set of actions items can execute,
//!   with an explicit fallback arm for unknown names)
//! - Define **Rules** (sender filter → conditions → request rewrite)
//! - Define the dwelling **Mode** machine (states, transition signals, and
//!   the pure transition function)
//! - Per-kind item settings and the configuration triple format
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO
//! crates. All IO boundaries are expressed as traits in the `app` crate
//! (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod command;
pub mod item;
pub mod message;
pub mod mode;
pub mod rule;
pub mod value;
