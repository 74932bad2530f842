//! Submarine cable subsystem: the static catalog and the hop-pair matcher.

pub mod catalog;
pub mod matcher;

pub use catalog::{Cable, CableCatalog};
pub use matcher::{CableMatch, CableMatcher, DEFAULT_TOLERANCE_KM};

use thiserror::Error;

/// Malformed or unreadable cable dataset. Fatal at startup.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Cannot read cable dataset {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cable dataset is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cable dataset has no 'features' array")]
    MissingFeatures,

    #[error("Feature #{index} has no 'properties.id'")]
    MissingId { index: usize },

    #[error("Cable '{id}' has no 'geometry.coordinates'")]
    MissingGeometry { id: String },

    #[error("Cable '{id}' has no subpaths")]
    EmptyGeometry { id: String },

    #[error("Cable '{id}' has a subpath without a valid [lon, lat] position")]
    InvalidSubpath { id: String },
}
