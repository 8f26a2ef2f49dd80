//! # TESSERA
//!
//! The engine context: one [`EntityManager`], one [`SystemManager`] and the
//! [`GlobalMemory`] they share.
//!
//! ## Frame
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ 1. PRE UPDATE    timers, PreUpdate           │
//! │ 2. UPDATE        Update, in work order       │
//! │ 3. POST UPDATE   PostUpdate, timers reset    │
//! │ 4. CLEANUP       entities marked for removal │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `engine`: Engine context and frame orchestration

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod engine;

// Re-export the core
pub use tessera_core as core;

pub use engine::{Engine, FrameStats, FrameStatsAccumulator};
pub use tessera_core::{
    CyclePolicy, EcsError, EcsResult, EngineConfig, Entity, EntityId, EntityManager,
    EntityTypeId, GlobalMemory, System, SystemManager, SystemPriority,
};
