//! Map overlay derived from the record window.
//!
//! One point per record, in window order. Every window change produces a
//! fresh overlay; points carry no identity across windows.

use serde::Serialize;
use serde_json::{Value, json};

use crate::window::RecordWindow;

/// A marker position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub longitude: f64,
    pub latitude: f64,
}

impl Point {
    /// GeoJSON coordinate order: `[lon, lat]`.
    #[must_use]
    pub const fn coordinates(self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

/// Point set handed to the map layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverlayGeometry {
    pub points: Vec<Point>,
}

impl OverlayGeometry {
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Encode as an anonymous GeoJSON `FeatureCollection` of `Point`s.
    #[must_use]
    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = self
            .points
            .iter()
            .map(|p| {
                json!({
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": p.coordinates() },
                    "properties": {},
                })
            })
            .collect();

        json!({ "type": "FeatureCollection", "features": features })
    }
}

/// Project a window onto map points.
#[must_use]
pub fn project(window: &RecordWindow) -> OverlayGeometry {
    OverlayGeometry {
        points: window
            .iter()
            .map(|r| Point {
                longitude: r.longitude,
                latitude: r.latitude,
            })
            .collect(),
    }
}
