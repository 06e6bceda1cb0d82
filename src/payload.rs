//! Task submission documents.
//!
//! [`build_task_request`] is a pure constructor: it never touches the
//! network and every call returns a fresh document. The layer list is
//! resolved by the caller (see [`crate::Client::submit`]).

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::geometry::{Geometry, Ring};

pub const DEFAULT_PROJECTION: &str = "geographic";
pub const OUTPUT_FORMAT: &str = "geotiff";
pub const YEAR_RANGE: [u16; 2] = [1950, 2050];

/// User-facing task parameters, dates as `YYYY-MM-DD`.
#[derive(Debug, Clone)]
pub struct TaskParams {
    pub name: String,
    pub product: String,
    pub start_date: String,
    pub end_date: String,
    pub recurring: bool,
    pub projection: String,
}

impl TaskParams {
    pub fn new(
        name: impl Into<String>,
        product: impl Into<String>,
        start_date: impl Into<String>,
        end_date: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            product: product.into(),
            start_date: start_date.into(),
            end_date: end_date.into(),
            recurring: false,
            projection: DEFAULT_PROJECTION.to_string(),
        }
    }

    pub fn with_recurring(mut self, recurring: bool) -> Self {
        self.recurring = recurring;
        self
    }

    pub fn with_projection(mut self, projection: impl Into<String>) -> Self {
        self.projection = projection.into();
        self
    }

    /// Both dates in service format, or the first one that fails to parse.
    pub fn service_dates(&self) -> Result<(String, String)> {
        Ok((
            to_service_date(&self.start_date)?,
            to_service_date(&self.end_date)?,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Point,
    Area,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRequest {
    pub task_type: TaskType,
    pub task_name: String,
    pub params: RequestParams,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestParams {
    pub layers: Vec<LayerSelection>,
    pub output: Output,
    pub dates: Vec<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Vec<Coordinate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<FeatureCollection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerSelection {
    pub layer: String,
    pub product: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Output {
    pub format: OutputFormat,
    pub projection: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: String,
    pub end_date: String,
    pub recurring: bool,
    pub year_range: [u16; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    kind: &'static str,
    features: Vec<Feature>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
    properties: Map<String, Value>,
    geometry: PolygonGeometry,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct PolygonGeometry {
    #[serde(rename = "type")]
    kind: &'static str,
    coordinates: Vec<Ring>,
}

impl FeatureCollection {
    fn single_polygon(rings: &[Ring]) -> Self {
        Self {
            kind: "FeatureCollection",
            features: vec![Feature {
                kind: "Feature",
                properties: Map::new(),
                geometry: PolygonGeometry {
                    kind: "Polygon",
                    coordinates: rings.to_vec(),
                },
            }],
        }
    }
}

/// `YYYY-MM-DD` -> `MM-DD-YYYY`.
pub fn to_service_date(input: &str) -> Result<String> {
    let date = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| {
        Error::DateFormat {
            input: input.to_string(),
        }
    })?;
    Ok(date.format("%m-%d-%Y").to_string())
}

/// Layer names from `GET /product/{id}`: an object keyed by layer name
/// (key order kept) or a plain array of names.
pub fn layer_names(response: &Value) -> Vec<String> {
    match response {
        Value::Object(map) => map.keys().cloned().collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

pub fn build_task_request(
    params: &TaskParams,
    layers: &[String],
    geometry: &Geometry,
) -> Result<TaskRequest> {
    let (start_date, end_date) = params.service_dates()?;

    let layers = layers
        .iter()
        .map(|layer| LayerSelection {
            layer: layer.clone(),
            product: params.product.clone(),
        })
        .collect();

    let (task_type, coordinates, geo) = match geometry {
        Geometry::Point {
            latitude,
            longitude,
        } => (
            TaskType::Point,
            Some(vec![Coordinate {
                latitude: *latitude,
                longitude: *longitude,
            }]),
            None,
        ),
        Geometry::Polygon { rings } => (
            TaskType::Area,
            None,
            Some(FeatureCollection::single_polygon(rings)),
        ),
    };

    Ok(TaskRequest {
        task_type,
        task_name: params.name.clone(),
        params: RequestParams {
            layers,
            output: Output {
                format: OutputFormat {
                    kind: OUTPUT_FORMAT.to_string(),
                },
                projection: params.projection.clone(),
            },
            dates: vec![DateRange {
                start_date,
                end_date,
                recurring: params.recurring,
                year_range: YEAR_RANGE,
            }],
            coordinates,
            geo,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point() -> Geometry {
        Geometry::Point {
            latitude: 39.7,
            longitude: -104.8,
        }
    }

    fn square() -> Geometry {
        Geometry::Polygon {
            rings: vec![vec![
                vec![-105.0, 39.0],
                vec![-104.0, 39.0],
                vec![-104.0, 40.0],
                vec![-105.0, 39.0],
            ]],
        }
    }

    fn layers() -> Vec<String> {
        vec!["LST_Day_1km".to_string(), "QC_Day".to_string()]
    }

    #[test]
    fn point_payload_has_coordinates_only() {
        let params = TaskParams::new("denver", "MOD11A1.061", "2020-01-01", "2020-01-31");
        let doc = serde_json::to_value(build_task_request(&params, &layers(), &point()).unwrap())
            .unwrap();

        assert_eq!(doc["task_type"], "point");
        assert_eq!(
            doc["params"]["coordinates"],
            json!([{"latitude": 39.7, "longitude": -104.8}])
        );
        assert!(doc["params"].get("geo").is_none());
    }

    #[test]
    fn polygon_payload_has_geo_only() {
        let params = TaskParams::new("box", "MOD11A1.061", "2020-01-01", "2020-01-31");
        let doc = serde_json::to_value(build_task_request(&params, &layers(), &square()).unwrap())
            .unwrap();

        assert_eq!(doc["task_type"], "area");
        assert!(doc["params"].get("coordinates").is_none());
        let geo = &doc["params"]["geo"];
        assert_eq!(geo["type"], "FeatureCollection");
        assert_eq!(geo["features"].as_array().unwrap().len(), 1);
        assert_eq!(geo["features"][0]["properties"], json!({}));
        assert_eq!(geo["features"][0]["geometry"]["type"], "Polygon");
        assert_eq!(
            geo["features"][0]["geometry"]["coordinates"][0][2],
            json!([-104.0, 40.0])
        );
    }

    #[test]
    fn dates_block_matches_service_format() {
        let params = TaskParams::new("t", "MOD11A1.061", "2020-01-01", "2020-01-31");
        let doc = serde_json::to_value(build_task_request(&params, &layers(), &point()).unwrap())
            .unwrap();

        assert_eq!(
            doc["params"]["dates"][0],
            json!({
                "startDate": "01-01-2020",
                "endDate": "01-31-2020",
                "recurring": false,
                "yearRange": [1950, 2050]
            })
        );
        assert_eq!(
            doc["params"]["output"],
            json!({"format": {"type": "geotiff"}, "projection": "geographic"})
        );
        assert_eq!(
            doc["params"]["layers"],
            json!([
                {"layer": "LST_Day_1km", "product": "MOD11A1.061"},
                {"layer": "QC_Day", "product": "MOD11A1.061"}
            ])
        );
    }

    #[test]
    fn recurring_and_projection_are_carried() {
        let params = TaskParams::new("t", "MOD11A1.061", "2019-06-01", "2019-08-31")
            .with_recurring(true)
            .with_projection("albers_weld_alaska");
        let req = build_task_request(&params, &layers(), &point()).unwrap();
        assert!(req.params.dates[0].recurring);
        assert_eq!(req.params.output.projection, "albers_weld_alaska");
    }

    #[test]
    fn each_call_builds_an_independent_document() {
        let params = TaskParams::new("t", "MOD11A1.061", "2020-01-01", "2020-01-31");
        let area = build_task_request(&params, &layers(), &square()).unwrap();
        let pt = build_task_request(&params, &layers(), &point()).unwrap();
        // Building the area task first must not leak into the point task.
        assert!(area.params.coordinates.is_none());
        assert!(pt.params.geo.is_none());
        assert!(pt.params.coordinates.is_some());
    }

    #[test]
    fn malformed_dates_are_rejected() {
        for bad in ["01-31-2020", "2020-13-01", "2020/01/01", ""] {
            let params = TaskParams::new("t", "p", "2020-01-01", bad);
            let err = build_task_request(&params, &layers(), &point()).unwrap_err();
            assert!(matches!(err, Error::DateFormat { ref input } if input == bad));
        }
    }

    #[test]
    fn layer_names_keep_response_order() {
        let resp: Value = serde_json::from_str(
            r#"{"LST_Night_1km": {"Units": "K"}, "Emis_31": {}, "Clear_day_cov": {}}"#,
        )
        .unwrap();
        assert_eq!(
            layer_names(&resp),
            ["LST_Night_1km", "Emis_31", "Clear_day_cov"]
        );
        assert_eq!(layer_names(&json!(["a", "b"])), ["a", "b"]);
        assert!(layer_names(&json!(null)).is_empty());
    }
}
