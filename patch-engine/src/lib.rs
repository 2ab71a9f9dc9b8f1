//! Composition and derivation of Talos machine-config patches.
//!
//! The builders here only produce document trees; writing them out and
//! driving `talosctl` happens in [`generate`] and [`appender`] through the
//! [`common::provider::Provisioner`] seam.

pub mod appender;
pub mod base_patch;
pub mod document;
pub mod endpoints;
pub mod error;
pub mod generate;
pub mod layout;
pub mod node_patch;
pub mod registry;
pub mod transcript;
pub mod version;

pub use error::{PatchError, Result};
