use serde::Deserialize;

use crate::util::{human_size, natural_cmp};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileEntry {
    pub file_id: String,
    pub file_name: String,
    #[serde(rename = "file_size")]
    pub file_size_bytes: u64,
    #[serde(default)]
    pub file_type: Option<String>,
}

/// Response of `GET /bundle/{task_id}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BundleResponse {
    #[serde(default)]
    pub(crate) files: Vec<FileEntry>,
}

/// Files of a finished task, in natural order on file name.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub task_id: String,
    pub files: Vec<FileEntry>,
}

impl Bundle {
    pub fn new(task_id: impl Into<String>, mut files: Vec<FileEntry>) -> Self {
        files.sort_by(|a, b| natural_cmp(&a.file_name, &b.file_name));
        Self {
            task_id: task_id.into(),
            files,
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.file_size_bytes).sum()
    }

    pub fn total_size(&self) -> String {
        human_size(self.total_bytes())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_is_naturally_sorted_with_total() {
        let resp: BundleResponse = serde_json::from_str(
            r#"{"files": [
                {"file_id": "id10", "file_name": "MOD11A1/f10.tif", "file_size": 1024, "file_type": "tif"},
                {"file_id": "id1", "file_name": "MOD11A1/f1.tif", "file_size": 512, "file_type": "tif"},
                {"file_id": "id2", "file_name": "MOD11A1/f2.tif", "file_size": 0, "file_type": "tif"}
            ], "task_id": "t1", "bundle_type": "area"}"#,
        )
        .unwrap();

        let bundle = Bundle::new("t1", resp.files);
        let ids: Vec<_> = bundle.files.iter().map(|f| f.file_id.as_str()).collect();
        assert_eq!(ids, ["id1", "id2", "id10"]);
        assert_eq!(bundle.total_bytes(), 1536);
        assert_eq!(bundle.total_size(), "1.5 KB");
        assert_eq!(bundle.len(), 3);
    }

    #[test]
    fn empty_bundle() {
        let bundle = Bundle::new("t", Vec::new());
        assert!(bundle.is_empty());
        assert_eq!(bundle.total_size(), "0 B");
    }
}
