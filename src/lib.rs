//! laneboard: Kanban board state and transition engine.
//!
//! ARCHITECTURE
//! ============
//! Records fetched from a [`record_store::RecordStore`] are partitioned into
//! lanes by an option-set attribute and published through the single-writer
//! [`store::BoardStore`]. Dropping a tile onto another lane runs the
//! transition engine, which patches the record and refreshes the board.

pub mod config;
pub mod error;
pub mod gate;
pub mod hooks;
pub mod lanes;
pub mod metadata;
pub mod record;
pub mod record_store;
pub mod services;
pub mod settings;
pub mod state;
pub mod store;
pub mod view;
