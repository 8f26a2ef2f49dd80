//! # Systems
//!
//! Per-frame logic units and the scheduler that orders them.
//!
//! ## Scheduling Rules
//!
//! - An explicit dependency always wins: a system runs after the systems it
//!   depends on
//! - Systems with no path between them fall into independent groups, ordered
//!   by the highest priority of each group
//! - The order is recomputed only on request and is stable for an unchanged
//!   registration sequence

mod dependency;
mod interface;
mod manager;
pub mod schedule;

pub use dependency::DependencyMatrix;
pub use interface::{System, SystemPriority, SystemTypeId};
pub use manager::{SystemManager, SystemWorkStateMask, SYSTEM_MEMORY_TAG};
pub use schedule::{Schedule, SystemGroup};
