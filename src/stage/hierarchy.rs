use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{PackError, PackResult};
use crate::provider::GenerationClient;
use crate::sanitize::parse_json;
use crate::types::{ConceptSet, HierarchyNode, Stage};

/// Arranges the extracted concepts into a tree rooted at the most general one.
pub struct HierarchyBuilder {
    client: GenerationClient,
}

impl HierarchyBuilder {
    pub fn new(client: GenerationClient) -> Self {
        Self { client }
    }

    pub async fn build(&self, concepts: &ConceptSet) -> PackResult<HierarchyNode> {
        if concepts.is_empty() {
            return Err(PackError::InvalidHierarchy("no concepts to organize".into()));
        }

        let raw = self
            .client
            .generate(Stage::Hierarchy, hierarchy_prompt(concepts))
            .await?;
        let tree = parse_hierarchy(&raw)?;

        debug!(
            root = %tree.name,
            nodes = tree.node_count(),
            depth = tree.depth(),
            "hierarchy built"
        );
        Ok(tree)
    }
}

fn hierarchy_prompt(concepts: &ConceptSet) -> String {
    let list = concepts
        .iter()
        .map(|c| format!("- {c}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are an expert educator and curriculum designer.

TASK:
Organize the following concepts into a clear hierarchical structure.

RULES:
- Return ONLY valid JSON
- Use this exact structure:
{{
  "root": "Main Topic",
  "children": [
    {{
      "name": "Sub Topic",
      "children": []
    }}
  ]
}}
- Choose the most general concept as root
- Each child must logically belong to its parent
- No explanations
- No markdown
- No extra text

CONCEPT LIST:
{list}"#
    )
}

fn parse_hierarchy(raw: &str) -> PackResult<HierarchyNode> {
    let value: Value =
        parse_json(raw).map_err(|e| PackError::InvalidHierarchy(e.to_string()))?;

    // Some completions wrap the tree in a one-element array
    let value = match value {
        Value::Array(mut items) if items.len() == 1 => items.remove(0),
        other => other,
    };
    let Value::Object(mut map) = value else {
        return Err(PackError::InvalidHierarchy(
            "expected a JSON object at the top level".into(),
        ));
    };

    let children = map.remove("children").map(children_from).unwrap_or_default();
    match map.remove("root").or_else(|| map.remove("name")) {
        Some(Value::String(name)) if !name.trim().is_empty() => {
            Ok(HierarchyNode::new(name.trim(), children))
        }
        Some(Value::Object(node)) => {
            let mut root = node_from_map(node).ok_or_else(|| {
                PackError::InvalidHierarchy("root object has no name".into())
            })?;
            root.children.extend(children);
            Ok(root)
        }
        _ => Err(PackError::InvalidHierarchy("missing root concept".into())),
    }
}

fn children_from(value: Value) -> Vec<HierarchyNode> {
    match value {
        Value::Array(items) => items.into_iter().filter_map(node_from).collect(),
        _ => Vec::new(),
    }
}

fn node_from(value: Value) -> Option<HierarchyNode> {
    match value {
        Value::String(name) if !name.trim().is_empty() => Some(HierarchyNode::leaf(name.trim())),
        Value::Object(map) => node_from_map(map),
        _ => None,
    }
}

fn node_from_map(mut map: Map<String, Value>) -> Option<HierarchyNode> {
    let name = match map.remove("name").or_else(|| map.remove("root")) {
        Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
        _ => return None,
    };
    let children = map.remove("children").map(children_from).unwrap_or_default();
    Some(HierarchyNode::new(name, children))
}
