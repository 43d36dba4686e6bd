// src/core/recovery/mod.rs

pub mod coordinator;

pub use coordinator::{RecoveryCoordinator, ResyncTask};
