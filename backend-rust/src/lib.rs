//! # louvor-backend
//!
//! Core of the worship-team suite: yearly duty-roster generation, weekly
//! repertoire assembly, and the store collaborators they read and write.

pub mod cache;
pub mod calendar;
pub mod combinations;
pub mod config;
pub mod error;
pub mod repertoire;
pub mod roster;
pub mod store;

pub use error::{RepertoireError, RosterError, StoreError};
pub use repertoire::{RepertoireAssembler, RepertoireIssue, RepertoireService};
pub use roster::{RosterConfig, RosterScheduler, RosterService};
pub use store::{LocalStore, RepertoireStore, RosterStore, SongCatalog, SongLibrary};
