use std::fs;
use std::path::Path;

use opensilicon_core::Board;
use opensilicon_drc::{DrcSettings, MarkerList};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Version written into new project documents.
pub const PROJECT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid project document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported project format version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// Descriptive metadata of an OpenSilicon project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMeta {
    pub name: String,
    pub format_version: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub modified: String,
}

impl ProjectMeta {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            format_version: PROJECT_FORMAT_VERSION,
            description: String::new(),
            created: String::new(),
            modified: String::new(),
        }
    }
}

/// A board together with its DRC settings and stored violation markers.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub meta: ProjectMeta,
    pub board: Board,
    #[serde(default)]
    pub drc_settings: DrcSettings,
    #[serde(default)]
    pub markers: MarkerList,
}

impl ProjectDocument {
    pub fn new(board: Board) -> Self {
        Self {
            meta: ProjectMeta::new(&board.name),
            board,
            drc_settings: DrcSettings::default(),
            markers: MarkerList::new(),
        }
    }

    pub fn to_json(&self) -> Result<String, ProjectError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ProjectError> {
        let mut doc: ProjectDocument = serde_json::from_str(json)?;
        if doc.meta.format_version > PROJECT_FORMAT_VERSION {
            return Err(ProjectError::UnsupportedVersion {
                found: doc.meta.format_version,
                supported: PROJECT_FORMAT_VERSION,
            });
        }
        doc.board.rebuild_index();
        Ok(doc)
    }

    /// Write the document as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), ProjectError> {
        fs::write(path, self.to_json()?)?;
        log::info!(
            "Saved project '{}' to {} ({} items, {} markers)",
            self.meta.name,
            path.display(),
            self.board.item_count(),
            self.markers.len()
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        let doc = Self::from_json(&fs::read_to_string(path)?)?;
        log::info!(
            "Loaded project '{}' from {} ({} items, {} markers)",
            doc.meta.name,
            path.display(),
            doc.board.item_count(),
            doc.markers.len()
        );
        Ok(doc)
    }
}
