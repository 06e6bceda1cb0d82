//! GeoJSON input for task submission.
//!
//! Only the first feature of a document is used, but every feature must be
//! a Point or Polygon: those are the only kinds the service accepts for
//! point/area tasks, and anything else is rejected here, before a payload
//! is ever built.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};

/// A linear ring: positions as `[lon, lat]` (optionally with altitude).
pub type Ring = Vec<Vec<f64>>;

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point { latitude: f64, longitude: f64 },
    Polygon { rings: Vec<Ring> },
}

#[derive(Debug, Deserialize)]
struct RawGeometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    #[serde(default)]
    geometry: Option<RawGeometry>,
}

impl Geometry {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_geojson_str(&text)
    }

    /// Accepts a FeatureCollection, a single Feature or a bare geometry object.
    pub fn from_geojson_str(text: &str) -> Result<Self> {
        let doc: Value = serde_json::from_str(text)?;
        let kind = doc
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidGeometry("missing `type` member".into()))?;

        let raw = match kind {
            "FeatureCollection" => {
                let features: Vec<RawFeature> = serde_json::from_value(
                    doc.get("features").cloned().unwrap_or(Value::Null),
                )
                .map_err(|e| Error::InvalidGeometry(e.to_string()))?;
                let count = features.len();
                let mut geometries = features
                    .into_iter()
                    .map(|f| Self::from_raw(feature_geometry(f)?))
                    .collect::<Result<Vec<_>>>()?
                    .into_iter();
                let first = geometries.next().ok_or(Error::EmptyGeometry)?;
                if count > 1 {
                    warn!("geometry file has {} features, using the first one", count);
                }
                return Ok(first);
            }
            "Feature" => {
                let feature: RawFeature = serde_json::from_value(doc)
                    .map_err(|e| Error::InvalidGeometry(e.to_string()))?;
                feature_geometry(feature)?
            }
            _ => serde_json::from_value::<RawGeometry>(doc)
                .map_err(|e| Error::InvalidGeometry(e.to_string()))?,
        };

        Self::from_raw(raw)
    }

    fn from_raw(raw: RawGeometry) -> Result<Self> {
        match raw.kind.as_str() {
            "Point" => {
                let position: Vec<f64> = serde_json::from_value(raw.coordinates)
                    .map_err(|e| Error::InvalidGeometry(format!("Point coordinates: {}", e)))?;
                match position.as_slice() {
                    [longitude, latitude, ..] => Ok(Geometry::Point {
                        latitude: *latitude,
                        longitude: *longitude,
                    }),
                    _ => Err(Error::InvalidGeometry(
                        "Point needs [longitude, latitude]".into(),
                    )),
                }
            }
            "Polygon" => {
                let rings: Vec<Ring> = serde_json::from_value(raw.coordinates)
                    .map_err(|e| Error::InvalidGeometry(format!("Polygon coordinates: {}", e)))?;
                Ok(Geometry::Polygon { rings })
            }
            other => Err(Error::UnsupportedGeometry(other.to_string())),
        }
    }
}

fn feature_geometry(feature: RawFeature) -> Result<RawGeometry> {
    feature
        .geometry
        .ok_or_else(|| Error::InvalidGeometry("feature has no geometry".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_feature_collection_swaps_to_lat_lon() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [-104.8, 39.7]}}
            ]
        }"#;
        let geom = Geometry::from_geojson_str(text).unwrap();
        assert_eq!(
            geom,
            Geometry::Point {
                latitude: 39.7,
                longitude: -104.8
            }
        );
    }

    #[test]
    fn polygon_feature_keeps_rings() {
        let text = r#"{"type": "Feature", "properties": {"name": "box"}, "geometry": {
            "type": "Polygon",
            "coordinates": [[[-105.0, 39.0], [-104.0, 39.0], [-104.0, 40.0], [-105.0, 39.0]]]
        }}"#;
        match Geometry::from_geojson_str(text).unwrap() {
            Geometry::Polygon { rings } => {
                assert_eq!(rings.len(), 1);
                assert_eq!(rings[0].len(), 4);
                assert_eq!(rings[0][1], vec![-104.0, 39.0]);
            }
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn bare_geometry_is_accepted() {
        let geom = Geometry::from_geojson_str(r#"{"type": "Point", "coordinates": [10.5, 45.25, 300.0]}"#)
            .unwrap();
        assert_eq!(
            geom,
            Geometry::Point {
                latitude: 45.25,
                longitude: 10.5
            }
        );
    }

    #[test]
    fn other_kinds_are_rejected_at_parse_time() {
        let text = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}}
        ]}"#;
        let err = Geometry::from_geojson_str(text).unwrap_err();
        assert!(matches!(err, Error::UnsupportedGeometry(ref k) if k == "LineString"));
    }

    #[test]
    fn empty_collection_is_an_error() {
        let err = Geometry::from_geojson_str(r#"{"type": "FeatureCollection", "features": []}"#)
            .unwrap_err();
        assert!(matches!(err, Error::EmptyGeometry));
    }

    #[test]
    fn short_point_is_invalid() {
        let err = Geometry::from_geojson_str(r#"{"type": "Point", "coordinates": [1.0]}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidGeometry(_)));
    }

    #[test]
    fn first_feature_wins() {
        let text = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}},
            {"type": "Feature", "geometry": {"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [0.0, 0.0]]]}}
        ]}"#;
        assert_eq!(
            Geometry::from_geojson_str(text).unwrap(),
            Geometry::Point {
                latitude: 2.0,
                longitude: 1.0
            }
        );
    }

    #[test]
    fn unsupported_kind_in_a_later_feature_is_rejected() {
        let text = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}},
            {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}}
        ]}"#;
        let err = Geometry::from_geojson_str(text).unwrap_err();
        assert!(matches!(err, Error::UnsupportedGeometry(ref k) if k == "LineString"));
    }
}
