//! The toy activities driven by [`crate::model::SpacecraftModel`].
//!
//! Each activity is a small explicit state machine implementing
//! [`kestrel::Task`] -- there is no language-level coroutine to lean on, so
//! "where was I" is just a field on the struct, advanced one stage per call
//! to `advance` (see kestrel's own design notes on re-architecting away from
//! generators).

pub mod callee_activity;
pub mod caller_activity;
pub mod my_activity;
pub mod my_child_activity;
pub mod my_decomposing_activity;
pub mod my_other_activity;
