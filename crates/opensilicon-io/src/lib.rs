//! # OpenSilicon I/O
//!
//! The OpenSilicon project document: a board, its DRC settings and the
//! violation markers stored with it, persisted as human-readable JSON.

pub mod project;

pub use project::{ProjectDocument, ProjectError, ProjectMeta, PROJECT_FORMAT_VERSION};
