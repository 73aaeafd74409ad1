//! Database access for the sync engine

pub mod initiatives;

pub use initiatives::SqliteInitiativeStore;
