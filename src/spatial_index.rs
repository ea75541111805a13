//! Static R-tree over building centroids.

use crate::ingest::validate_building;
use crate::types::{Building, EngineError};
use rstar::{RTree, RTreeObject, AABB};

/// Meters per degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

#[derive(Debug, Clone, Copy)]
struct IndexedBuilding {
    idx: usize,
    lng: f64,
    lat: f64,
}

impl RTreeObject for IndexedBuilding {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lng, self.lat])
    }
}

/// Read-only index. Rebuilding means constructing a new instance.
#[derive(Debug)]
pub struct BuildingIndex {
    buildings: Vec<Building>,
    tree: RTree<IndexedBuilding>,
}

impl BuildingIndex {
    /// Entries with unusable coordinates or heights are dropped with a
    /// warning. Fails with `EmptyIndex` when nothing is left.
    pub fn build(buildings: Vec<Building>) -> Result<Self, EngineError> {
        let received = buildings.len();
        let buildings: Vec<Building> = buildings
            .into_iter()
            .enumerate()
            .filter_map(|(index, building)| match validate_building(index, &building) {
                Ok(()) => Some(building),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping building");
                    None
                }
            })
            .collect();
        if buildings.is_empty() {
            return Err(EngineError::EmptyIndex);
        }

        let indexed: Vec<IndexedBuilding> = buildings
            .iter()
            .enumerate()
            .map(|(idx, b)| IndexedBuilding {
                idx,
                lng: b.longitude,
                lat: b.latitude,
            })
            .collect();
        let tree = RTree::bulk_load(indexed);

        tracing::info!(
            buildings = buildings.len(),
            skipped = received - buildings.len(),
            "built building index"
        );
        Ok(Self { buildings, tree })
    }

    /// Buildings whose centroid lies in the box spanning `radius_meters`
    /// around the point. Results come back in ingestion order.
    pub fn query_near(&self, lat: f64, lng: f64, radius_meters: f64) -> Vec<&Building> {
        let (lat_delta, lng_delta) = meters_to_degree_deltas(radius_meters, lat);
        let envelope = AABB::from_corners(
            [lng - lng_delta, lat - lat_delta],
            [lng + lng_delta, lat + lat_delta],
        );

        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope(&envelope)
            .map(|entry| entry.idx)
            .collect();
        hits.sort_unstable();
        hits.into_iter().map(|idx| &self.buildings[idx]).collect()
    }

    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    pub fn len(&self) -> usize {
        self.buildings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty()
    }
}

/// Convert a meter radius to (latitude, longitude) degree half-extents.
pub fn meters_to_degree_deltas(meters: f64, latitude: f64) -> (f64, f64) {
    let lat_delta = meters / METERS_PER_DEGREE;
    let lng_delta = meters / (METERS_PER_DEGREE * latitude.to_radians().cos());
    (lat_delta, lng_delta)
}
