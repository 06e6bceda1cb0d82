//! A small Rust client for the NASA AppEEARS extraction API.
//!
//! This crate implements the task lifecycle:
//! build and submit an extraction task, follow its processing, then
//! download the files of the resulting bundle.
//!
//! ## Quick start
//! - Configure authentication via environment variables (`APPEEARS_USERNAME` /
//!   `APPEEARS_PASSWORD`, or `APPEEARS_TOKEN`) or a `~/appeears.json` file
//!   written by `appeears auth`.
//! - Parse a GeoJSON point or polygon, then call [`Client::submit`].
//!
//! ```no_run
//! use appeears::{Client, Geometry, TaskParams};
//!
//! fn main() -> appeears::Result<()> {
//!     let client = Client::from_env()?;
//!     let geometry = Geometry::from_geojson_str(
//!         r#"{"type": "Point", "coordinates": [-104.8, 39.7]}"#,
//!     )?;
//!     let params = TaskParams::new("denver-lst", "MOD11A1.061", "2020-01-01", "2020-01-31");
//!     let task = client.submit(&params, &geometry)?;
//!     println!("submitted {}", task.task_id);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

mod auth;
mod bundle;
mod client;
pub mod config;
mod download;
mod error;
mod geometry;
mod payload;
pub mod status;
mod task;
mod util;

pub use auth::TokenProvider;
pub use bundle::{Bundle, FileEntry};
pub use client::{Client, ClientConfig, StatusReport};
pub use config::Credentials;
pub use download::DownloadReport;
pub use error::{Error, Result, describe_status};
pub use geometry::Geometry;
pub use payload::{TaskParams, TaskRequest, TaskType, build_task_request, to_service_date};
pub use status::{MonitorOutcome, PollOptions, StatusSnapshot};
pub use task::{SubmittedTask, Task, TaskRecord, group_by_status};
pub use util::{human_size, natural_cmp};
