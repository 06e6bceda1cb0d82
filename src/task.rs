use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A task as listed by `GET /task`. Only the fields the client reads.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    #[serde(default)]
    pub task_name: String,
    pub status: String,
    #[serde(default)]
    params: TaskRecordParams,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TaskRecordParams {
    #[serde(default)]
    layers: Vec<LayerRef>,
}

#[derive(Debug, Clone, Deserialize)]
struct LayerRef {
    layer: String,
}

/// Read-only view of a task, in the shape the CLI prints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub task_id: String,
    pub task_name: String,
    pub task_status: String,
    pub task_layers: Vec<String>,
}

impl From<TaskRecord> for Task {
    fn from(record: TaskRecord) -> Self {
        Task {
            task_id: record.task_id,
            task_name: record.task_name,
            task_status: record.status,
            task_layers: record.params.layers.into_iter().map(|l| l.layer).collect(),
        }
    }
}

/// Returned by `POST /task`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmittedTask {
    pub task_id: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Groups tasks by status value, keys in string order.
///
/// An empty listing is [`Error::NoTasksFound`]; a filter that matches
/// nothing is [`Error::NoMatchingTask`].
pub fn group_by_status(
    records: Vec<TaskRecord>,
    filter: Option<&str>,
) -> Result<BTreeMap<String, Vec<Task>>> {
    if records.is_empty() {
        return Err(Error::NoTasksFound);
    }

    let mut groups: BTreeMap<String, Vec<Task>> = BTreeMap::new();
    for record in records {
        if filter.is_some_and(|s| s != record.status) {
            continue;
        }
        groups
            .entry(record.status.clone())
            .or_default()
            .push(Task::from(record));
    }

    if groups.is_empty() {
        if let Some(status) = filter {
            return Err(Error::NoMatchingTask {
                status: status.to_string(),
            });
        }
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<TaskRecord> {
        serde_json::from_str(
            r#"[
                {"task_id": "a1", "task_name": "first", "status": "processing",
                 "params": {"layers": [{"layer": "LST_Day_1km", "product": "MOD11A1.061"}]}},
                {"task_id": "b2", "task_name": "second", "status": "done",
                 "params": {"layers": [{"layer": "NDVI", "product": "MOD13Q1.061"}, {"layer": "EVI", "product": "MOD13Q1.061"}]}},
                {"task_id": "c3", "task_name": "third", "status": "done", "params": {"layers": []}},
                {"task_id": "d4", "task_name": "fourth", "status": "pending"}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn groups_in_status_order_and_keeps_listing_order() {
        let groups = group_by_status(records(), None).unwrap();
        let keys: Vec<_> = groups.keys().map(String::as_str).collect();
        assert_eq!(keys, ["done", "pending", "processing"]);

        let done = &groups["done"];
        assert_eq!(done.len(), 2);
        assert_eq!(done[0].task_id, "b2");
        assert_eq!(done[0].task_layers, ["NDVI", "EVI"]);
        assert_eq!(done[1].task_id, "c3");
        assert!(groups["pending"][0].task_layers.is_empty());
    }

    #[test]
    fn filter_keeps_one_group() {
        let groups = group_by_status(records(), Some("processing")).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups["processing"][0].task_name, "first");
    }

    #[test]
    fn filter_without_match_is_an_error() {
        let err = group_by_status(records(), Some("error")).unwrap_err();
        assert!(matches!(err, Error::NoMatchingTask { ref status } if status == "error"));
        assert_eq!(
            err.to_string(),
            "No tasks found with status error : try processing|done|pending"
        );
    }

    #[test]
    fn empty_listing_is_reported() {
        let err = group_by_status(Vec::new(), Some("done")).unwrap_err();
        assert!(matches!(err, Error::NoTasksFound));
    }

    #[test]
    fn summary_serializes_with_cli_keys() {
        let task = Task::from(records().remove(1));
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["task_status"], "done");
        assert_eq!(value["task_layers"][1], "EVI");
    }
}
