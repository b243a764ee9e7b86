//! JSON patch documents sent to the orchestration API

use json_patch::{AddOperation, Patch, PatchOperation, ReplaceOperation, TestOperation};
use serde_json::{json, Map, Value};

pub const REPLICAS_PATH: &str = "/spec/replicas";
const TEMPLATE_ANNOTATIONS_PATH: &str = "/spec/template/metadata/annotations";
const RESOURCE_VERSION_PATH: &str = "/metadata/resourceVersion";

/// Escape a map key for use as a JSON pointer segment
pub fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Replace only `/spec/replicas`
pub fn replicas_patch(replicas: u32) -> Patch {
    Patch(vec![PatchOperation::Replace(ReplaceOperation {
        path: REPLICAS_PATH.to_string(),
        value: json!(replicas),
    })])
}

/// Set the restart annotation on the pod template.
///
/// A JSON patch `add` needs the parent object to exist, so when the template
/// carries no annotations the whole map is added with just this key. That
/// `add` replaces any map created after `resource_version` was read, so it is
/// preceded by a `test` on the resource version and fails instead.
pub fn restart_patch(
    annotation: &str,
    timestamp: &str,
    template_has_annotations: bool,
    resource_version: Option<&str>,
) -> Patch {
    if template_has_annotations {
        return Patch(vec![PatchOperation::Add(AddOperation {
            path: format!(
                "{}/{}",
                TEMPLATE_ANNOTATIONS_PATH,
                escape_pointer_token(annotation)
            ),
            value: Value::String(timestamp.to_string()),
        })]);
    }

    let mut annotations = Map::new();
    annotations.insert(annotation.to_string(), Value::String(timestamp.to_string()));

    let mut ops = Vec::with_capacity(2);
    if let Some(version) = resource_version {
        ops.push(PatchOperation::Test(TestOperation {
            path: RESOURCE_VERSION_PATH.to_string(),
            value: Value::String(version.to_string()),
        }));
    }
    ops.push(PatchOperation::Add(AddOperation {
        path: TEMPLATE_ANNOTATIONS_PATH.to_string(),
        value: Value::Object(annotations),
    }));
    Patch(ops)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replicas_patch_touches_only_replicas() {
        let patch = serde_json::to_value(replicas_patch(4)).unwrap();
        assert_eq!(
            patch,
            json!([{"op": "replace", "path": "/spec/replicas", "value": 4}])
        );
    }

    #[test]
    fn test_restart_patch_adds_single_annotation() {
        let patch = serde_json::to_value(restart_patch(
            "ai-restart-ts",
            "2024-01-01T00:00:00Z",
            true,
            Some("4711"),
        ))
        .unwrap();
        assert_eq!(
            patch,
            json!([{
                "op": "add",
                "path": "/spec/template/metadata/annotations/ai-restart-ts",
                "value": "2024-01-01T00:00:00Z"
            }])
        );
    }

    #[test]
    fn test_restart_patch_creates_annotation_map() {
        let patch = serde_json::to_value(restart_patch(
            "ai-restart-ts",
            "2024-01-01T00:00:00Z",
            false,
            None,
        ))
        .unwrap();
        assert_eq!(
            patch,
            json!([{
                "op": "add",
                "path": "/spec/template/metadata/annotations",
                "value": {"ai-restart-ts": "2024-01-01T00:00:00Z"}
            }])
        );
    }

    #[test]
    fn test_annotation_map_creation_is_guarded_by_resource_version() {
        let patch = serde_json::to_value(restart_patch(
            "ai-restart-ts",
            "2024-01-01T00:00:00Z",
            false,
            Some("4711"),
        ))
        .unwrap();
        assert_eq!(
            patch,
            json!([
                {"op": "test", "path": "/metadata/resourceVersion", "value": "4711"},
                {
                    "op": "add",
                    "path": "/spec/template/metadata/annotations",
                    "value": {"ai-restart-ts": "2024-01-01T00:00:00Z"}
                }
            ])
        );
    }

    #[test]
    fn test_annotation_key_is_escaped() {
        assert_eq!(
            escape_pointer_token("kubectl.kubernetes.io/restartedAt"),
            "kubectl.kubernetes.io~1restartedAt"
        );
        assert_eq!(escape_pointer_token("a~b"), "a~0b");
    }
}
