//! Repository acquisition and entry-point resolution.
//!
//! A run starts from a clonable repository reference. This module produces an
//! ephemeral [`Checkout`] via a shallow clone and selects the file the
//! measurement agent will execute.

mod acquire;
mod entry;

pub use acquire::{acquire, Checkout};
pub use entry::resolve_entry_point;
