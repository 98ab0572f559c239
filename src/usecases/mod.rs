//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement
//! the crawler's workflows.
//!
//! Use cases:
//! - `PollLoop`: Poll sources, build the snapshot, publish, sleep
//! - `Supervisor`: Run the poll loop and file server under one shutdown

pub mod poll_loop;
pub mod supervisor;

pub use poll_loop::{CycleReport, LoopState, PollLoop, PollLoopConfig};
pub use supervisor::Supervisor;
