//! Submarine cable catalog loaded from a GeoJSON feature collection.
//!
//! Only the first and last position of each subpath survive loading. Which end
//! of a subpath is the landing point varies across the dataset, so both are
//! kept as candidate docking points.

use super::DatasetError;
use crate::geo::GeoPoint;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// One cable and its candidate docking points, in subpath order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cable {
    pub id: String,
    pub endpoints: Vec<GeoPoint>,
}

/// Immutable set of cables, iterated in dataset order.
#[derive(Debug, Clone, Default)]
pub struct CableCatalog {
    cables: Vec<Cable>,
}

impl CableCatalog {
    /// Read and parse a dataset file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_json_str(&data)?;
        log::info!("Loaded {} cables from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn from_json_str(data: &str) -> Result<Self, DatasetError> {
        let root: Value = serde_json::from_str(data)?;
        Self::from_geojson(&root)
    }

    /// Build from an already-parsed feature collection.
    pub fn from_geojson(root: &Value) -> Result<Self, DatasetError> {
        let features = root
            .get("features")
            .and_then(Value::as_array)
            .ok_or(DatasetError::MissingFeatures)?;

        let mut catalog = Self::default();
        for (index, feature) in features.iter().enumerate() {
            let id = feature
                .pointer("/properties/id")
                .and_then(Value::as_str)
                .ok_or(DatasetError::MissingId { index })?
                .to_string();

            let subpaths = feature
                .pointer("/geometry/coordinates")
                .and_then(Value::as_array)
                .ok_or_else(|| DatasetError::MissingGeometry { id: id.clone() })?;

            if subpaths.is_empty() {
                return Err(DatasetError::EmptyGeometry { id });
            }

            let mut endpoints = Vec::with_capacity(subpaths.len() * 2);
            for subpath in subpaths {
                let (start, end) = subpath_ends(subpath)
                    .ok_or_else(|| DatasetError::InvalidSubpath { id: id.clone() })?;
                endpoints.push(start);
                endpoints.push(end);
            }

            catalog.insert(Cable { id, endpoints });
        }

        Ok(catalog)
    }

    /// Build directly from cables, mostly for tests and synthetic catalogs.
    pub fn from_cables(cables: impl IntoIterator<Item = Cable>) -> Self {
        let mut catalog = Self::default();
        for cable in cables {
            catalog.insert(cable);
        }
        catalog
    }

    // A repeated id replaces the earlier entry but keeps its position.
    fn insert(&mut self, cable: Cable) {
        match self.cables.iter_mut().find(|c| c.id == cable.id) {
            Some(existing) => *existing = cable,
            None => self.cables.push(cable),
        }
    }

    pub fn cables(&self) -> &[Cable] {
        &self.cables
    }

    pub fn get(&self, id: &str) -> Option<&Cable> {
        self.cables.iter().find(|c| c.id == id)
    }

    pub fn len(&self) -> usize {
        self.cables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cables.is_empty()
    }
}

fn subpath_ends(subpath: &Value) -> Option<(GeoPoint, GeoPoint)> {
    let positions = subpath.as_array()?;
    let first = position(positions.first()?)?;
    let last = position(positions.last()?)?;
    Some((first, last))
}

// GeoJSON positions are [lon, lat] with an optional trailing altitude.
fn position(value: &Value) -> Option<GeoPoint> {
    let pair = value.as_array()?;
    let lon = pair.first()?.as_f64()?;
    let lat = pair.get(1)?.as_f64()?;
    Some(GeoPoint::from_lon_lat([lon, lat]))
}
