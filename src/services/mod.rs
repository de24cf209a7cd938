//! Board services invoked by the host UI.
//!
//! ARCHITECTURE
//! ============
//! Service functions take a [`crate::state::BoardContext`], do their record
//! store I/O, and publish results by dispatching actions. None of them hold
//! a mutable reference to board state.

pub mod buttons;
pub mod follow;
pub mod refresh;
pub mod transition;
