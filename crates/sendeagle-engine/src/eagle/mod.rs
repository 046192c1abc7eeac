//! Client for the Eagle media-manager's local HTTP API.

mod transport;

use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Value};

pub use transport::{BasicAuth, EagleTransport, HttpTransport};

pub const FOLDER_LIST_ENDPOINT: &str = "/api/folder/list";
pub const FOLDER_CREATE_ENDPOINT: &str = "/api/folder/create";
pub const ADD_FROM_URL_ENDPOINT: &str = "/api/item/addFromURL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderInfo {
    pub id: String,
    pub name: String,
}

/// Body of an `addFromURL` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadItem {
    pub url: String,
    pub name: String,
    pub annotation: String,
    pub tags: Vec<String>,
    #[serde(rename = "folderId", skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderCacheState {
    Unresolved,
    Resolved,
}

/// Eagle client with a session folder cache.
///
/// The folder list is fetched once and only grows afterwards (folders this
/// client creates are appended). Nothing refreshes it except
/// [`EagleClient::invalidate_folders`].
#[derive(Debug)]
pub struct EagleClient<T = HttpTransport> {
    transport: T,
    folders: Option<Vec<FolderInfo>>,
}

impl EagleClient<HttpTransport> {
    pub fn connect(base_url: &str) -> Result<Self> {
        Ok(Self::with_transport(HttpTransport::new(base_url)?))
    }
}

impl<T: EagleTransport> EagleClient<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            folders: None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn folder_cache_state(&self) -> FolderCacheState {
        if self.folders.is_some() {
            FolderCacheState::Resolved
        } else {
            FolderCacheState::Unresolved
        }
    }

    pub fn cached_folders(&self) -> Option<&[FolderInfo]> {
        self.folders.as_deref()
    }

    pub fn invalidate_folders(&mut self) {
        self.folders = None;
    }

    /// Fetches and flattens the full folder tree, bypassing the cache.
    pub fn fetch_folders(&self) -> Result<Vec<FolderInfo>> {
        let payload = self.transport.get_json(FOLDER_LIST_ENDPOINT)?;
        Ok(flatten_folder_tree(payload.get("data").unwrap_or(&Value::Null)))
    }

    /// Folder id for a folder name or id, creating the folder when neither
    /// matches. `None` means "upload without a folder": either nothing was
    /// requested or creation failed.
    pub fn resolve_folder(&mut self, name_or_id: &str) -> Option<String> {
        if name_or_id.is_empty() {
            return None;
        }
        if let Some(found) = self
            .ensure_folders()
            .iter()
            .find(|folder| folder.name == name_or_id || folder.id == name_or_id)
        {
            tracing::debug!(folder = %name_or_id, id = %found.id, "eagle folder cache hit");
            return Some(found.id.clone());
        }
        self.create_folder(name_or_id)
    }

    pub fn add_item_from_url(&self, item: &UploadItem) -> Result<Value> {
        let body = serde_json::to_value(item)?;
        self.transport.post_json(ADD_FROM_URL_ENDPOINT, &body)
    }

    fn ensure_folders(&mut self) -> &[FolderInfo] {
        if self.folders.is_none() {
            let folders = match self.fetch_folders() {
                Ok(folders) => folders,
                Err(err) => {
                    tracing::warn!(
                        endpoint = FOLDER_LIST_ENDPOINT,
                        error = %format!("{err:#}"),
                        "eagle folder list unavailable; continuing with no known folders"
                    );
                    Vec::new()
                }
            };
            self.folders = Some(folders);
        }
        self.folders.as_deref().unwrap_or_default()
    }

    fn create_folder(&mut self, name: &str) -> Option<String> {
        let response = match self
            .transport
            .post_json(FOLDER_CREATE_ENDPOINT, &json!({ "folderName": name }))
        {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(
                    endpoint = FOLDER_CREATE_ENDPOINT,
                    folder = %name,
                    error = %format!("{err:#}"),
                    "eagle folder create failed; uploading without a folder"
                );
                return None;
            }
        };
        let Some(id) = response
            .get("data")
            .and_then(|data| data.get("id"))
            .and_then(id_text)
        else {
            tracing::warn!(
                endpoint = FOLDER_CREATE_ENDPOINT,
                folder = %name,
                "eagle folder create returned no id; uploading without a folder"
            );
            return None;
        };
        tracing::info!(folder = %name, id = %id, "eagle folder created");
        if let Some(folders) = self.folders.as_mut() {
            folders.push(FolderInfo {
                id: id.clone(),
                name: name.to_string(),
            });
        }
        Some(id)
    }
}

/// Collects `{id, name}` from every node of a folder tree (objects with an
/// optional `children` array, or arrays of such objects), parents first.
pub fn flatten_folder_tree(data: &Value) -> Vec<FolderInfo> {
    let mut out = Vec::new();
    collect_folders(data, &mut out);
    out
}

fn collect_folders(node: &Value, out: &mut Vec<FolderInfo>) {
    match node {
        Value::Array(items) => {
            for item in items {
                collect_folders(item, out);
            }
        }
        Value::Object(fields) => {
            let id = fields.get("id").and_then(id_text);
            let name = fields.get("name").and_then(Value::as_str);
            if let (Some(id), Some(name)) = (id, name) {
                out.push(FolderInfo {
                    id,
                    name: name.to_string(),
                });
            }
            if let Some(children) = fields.get("children").filter(|value| value.is_array()) {
                collect_folders(children, out);
            }
        }
        _ => {}
    }
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;

    use anyhow::{anyhow, Result};
    use serde_json::{json, Value};

    use super::{EagleTransport, ADD_FROM_URL_ENDPOINT, FOLDER_CREATE_ENDPOINT, FOLDER_LIST_ENDPOINT};

    /// In-memory Eagle that records every call as `(method endpoint, body)`.
    #[derive(Debug, Default)]
    pub(crate) struct FakeEagle {
        pub folder_tree: Option<Value>,
        pub fail_create: bool,
        pub fail_add: bool,
        pub next_id: RefCell<u32>,
        pub calls: RefCell<Vec<(String, Value)>>,
    }

    impl FakeEagle {
        pub(crate) fn with_folders(tree: Value) -> Self {
            Self {
                folder_tree: Some(tree),
                ..Self::default()
            }
        }

        pub(crate) fn call_names(&self) -> Vec<String> {
            self.calls.borrow().iter().map(|(name, _)| name.clone()).collect()
        }

        pub(crate) fn bodies_for(&self, endpoint: &str) -> Vec<Value> {
            self.calls
                .borrow()
                .iter()
                .filter(|(name, _)| name.ends_with(endpoint))
                .map(|(_, body)| body.clone())
                .collect()
        }
    }

    impl EagleTransport for FakeEagle {
        fn get_json(&self, endpoint: &str) -> Result<Value> {
            self.calls
                .borrow_mut()
                .push((format!("GET {endpoint}"), Value::Null));
            match (endpoint, &self.folder_tree) {
                (FOLDER_LIST_ENDPOINT, Some(tree)) => Ok(json!({"status": "success", "data": tree})),
                _ => Err(anyhow!("connection refused")),
            }
        }

        fn post_json(&self, endpoint: &str, body: &Value) -> Result<Value> {
            self.calls
                .borrow_mut()
                .push((format!("POST {endpoint}"), body.clone()));
            match endpoint {
                FOLDER_CREATE_ENDPOINT if !self.fail_create => {
                    let mut next = self.next_id.borrow_mut();
                    *next += 1;
                    Ok(json!({"status": "success", "data": {"id": format!("NEW{}", *next)}}))
                }
                ADD_FROM_URL_ENDPOINT if !self.fail_add => Ok(json!({"status": "success"})),
                _ => Err(anyhow!("eagle {endpoint} failed (500): boom")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::testing::FakeEagle;
    use super::{flatten_folder_tree, EagleClient, FolderCacheState, FolderInfo, UploadItem};

    fn folder(id: &str, name: &str) -> FolderInfo {
        FolderInfo {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn flatten_collects_parents_and_children() {
        let tree = json!({"id": "1", "name": "A", "children": [{"id": "2", "name": "B"}]});
        assert_eq!(flatten_folder_tree(&tree), vec![folder("1", "A"), folder("2", "B")]);
    }

    #[test]
    fn flatten_walks_lists_at_any_depth_and_skips_incomplete_nodes() {
        let tree = json!([
            {"id": "1", "name": "A", "children": [
                {"name": "no id", "children": [{"id": "3", "name": "C", "children": []}]},
            ]},
            {"id": "4", "name": "D", "children": "not a list"},
            "garbage",
        ]);
        assert_eq!(
            flatten_folder_tree(&tree),
            vec![folder("1", "A"), folder("3", "C"), folder("4", "D")]
        );
    }

    #[test]
    fn empty_folder_issues_no_request() {
        let mut client = EagleClient::with_transport(FakeEagle::with_folders(json!([])));
        assert_eq!(client.resolve_folder(""), None);
        assert!(client.transport().call_names().is_empty());
        assert_eq!(client.folder_cache_state(), FolderCacheState::Unresolved);
    }

    #[test]
    fn cached_folder_is_found_by_name_or_id() {
        let mut client = EagleClient::with_transport(FakeEagle::with_folders(json!([
            {"id": "42", "name": "Renders"},
        ])));
        assert_eq!(client.resolve_folder("Renders").as_deref(), Some("42"));
        assert_eq!(client.resolve_folder("42").as_deref(), Some("42"));
        assert_eq!(client.transport().call_names(), vec!["GET /api/folder/list"]);
        assert_eq!(client.folder_cache_state(), FolderCacheState::Resolved);
    }

    #[test]
    fn missing_folder_is_created_once_and_cached() {
        let mut client = EagleClient::with_transport(FakeEagle::with_folders(json!([
            {"id": "1", "name": "Other"},
        ])));
        assert_eq!(client.resolve_folder("Renders").as_deref(), Some("NEW1"));
        assert_eq!(client.resolve_folder("Renders").as_deref(), Some("NEW1"));
        assert_eq!(
            client.transport().call_names(),
            vec!["GET /api/folder/list", "POST /api/folder/create"]
        );
        assert_eq!(
            client.transport().bodies_for("/api/folder/create"),
            vec![json!({"folderName": "Renders"})]
        );
        assert_eq!(
            client.cached_folders(),
            Some(&[folder("1", "Other"), folder("NEW1", "Renders")][..])
        );
    }

    #[test]
    fn first_match_wins_across_name_and_id() {
        let mut client = EagleClient::with_transport(FakeEagle::with_folders(json!([
            {"id": "7", "name": "X"},
            {"id": "X", "name": "Y"},
        ])));
        assert_eq!(client.resolve_folder("X").as_deref(), Some("7"));
    }

    #[test]
    fn list_failure_caches_empty_set_without_error() {
        let mut client = EagleClient::with_transport(FakeEagle::default());
        assert_eq!(client.resolve_folder("Renders").as_deref(), Some("NEW1"));
        assert_eq!(client.folder_cache_state(), FolderCacheState::Resolved);
        assert_eq!(client.cached_folders(), Some(&[folder("NEW1", "Renders")][..]));
        // The failed list is not retried.
        assert_eq!(client.resolve_folder("Other").as_deref(), Some("NEW2"));
        assert_eq!(
            client
                .transport()
                .call_names()
                .iter()
                .filter(|name| name.starts_with("GET"))
                .count(),
            1
        );
    }

    #[test]
    fn create_failure_yields_no_folder() {
        let fake = FakeEagle {
            fail_create: true,
            ..FakeEagle::with_folders(json!([]))
        };
        let mut client = EagleClient::with_transport(fake);
        assert_eq!(client.resolve_folder("Renders"), None);
        assert_eq!(client.cached_folders(), Some(&[][..]));
    }

    #[test]
    fn invalidate_forces_a_fresh_list() {
        let mut client = EagleClient::with_transport(FakeEagle::with_folders(json!([
            {"id": "42", "name": "Renders"},
        ])));
        client.resolve_folder("Renders");
        client.invalidate_folders();
        assert_eq!(client.folder_cache_state(), FolderCacheState::Unresolved);
        client.resolve_folder("Renders");
        assert_eq!(
            client.transport().call_names(),
            vec!["GET /api/folder/list", "GET /api/folder/list"]
        );
    }

    #[test]
    fn add_item_serializes_folder_id_only_when_present() -> anyhow::Result<()> {
        let client = EagleClient::with_transport(FakeEagle::default());
        let mut item = UploadItem {
            url: "http://localhost:8188/api/view?filename=a.png".to_string(),
            name: "a.png".to_string(),
            annotation: "Seed: 1".to_string(),
            tags: vec!["cat".to_string()],
            folder_id: None,
        };
        client.add_item_from_url(&item)?;
        item.folder_id = Some("42".to_string());
        client.add_item_from_url(&item)?;

        let bodies = client.transport().bodies_for("/api/item/addFromURL");
        assert_eq!(bodies.len(), 2);
        assert!(bodies[0].get("folderId").is_none());
        assert_eq!(bodies[0]["tags"], json!(["cat"]));
        assert_eq!(bodies[1]["folderId"], json!("42"));
        Ok(())
    }

    #[test]
    fn add_item_failure_is_returned() {
        let fake = FakeEagle {
            fail_add: true,
            ..FakeEagle::default()
        };
        let client = EagleClient::with_transport(fake);
        let item = UploadItem {
            url: String::new(),
            name: String::new(),
            annotation: String::new(),
            tags: Vec::new(),
            folder_id: None,
        };
        let err = client.add_item_from_url(&item).unwrap_err();
        assert!(err.to_string().contains("500"));
    }
}
