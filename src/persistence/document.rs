//! The JSON scenario format exchanged with the backend.
//!
//! Nodes carry their block type twice, as the node `type` and as
//! `data.blockType`; the latter wins on load because older documents use a
//! generic node type such as `"editable"`. Rendering keys (`selected`,
//! `style`, `dragging`, measured sizes...) are ignored on load and never
//! written.

use crate::block::{BlockData, BlockRegistry, FieldMap};
use crate::error::{DocumentError, ValidationError};
use crate::graph::{Block, Edge, Position, Scenario};
use ahash::AHashSet;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

const BLOCK_TYPE_KEY: &str = "blockType";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioDocument {
    #[serde(default)]
    pub nodes: Vec<NodeDocument>,
    #[serde(default)]
    pub edges: Vec<EdgeDocument>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_opt_text"
    )]
    pub admin_chat_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDocument {
    #[serde(default, deserialize_with = "lenient_opt_text")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default)]
    pub data: FieldMap,
    #[serde(default)]
    pub position: Position,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDocument {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_opt_text"
    )]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub source: String,
    #[serde(deserialize_with = "lenient_text")]
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl NodeDocument {
    /// The block type tag, preferring `data.blockType` over the node type.
    pub fn block_type(&self) -> &str {
        self.data
            .get(BLOCK_TYPE_KEY)
            .and_then(Value::as_str)
            .filter(|tag| !tag.is_empty())
            .or(self.node_type.as_deref())
            .unwrap_or_default()
    }
}

impl ScenarioDocument {
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        serde_json::from_str(json).map_err(|e| DocumentError::JsonParseError(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String, DocumentError> {
        serde_json::to_string_pretty(self).map_err(|e| DocumentError::JsonParseError(e.to_string()))
    }

    /// Wire form of `scenario`. Selection flags are dropped.
    pub fn from_scenario(scenario: &Scenario) -> Self {
        let nodes = scenario
            .blocks
            .iter()
            .map(|block| {
                let mut data = block.data().to_fields();
                data.insert(BLOCK_TYPE_KEY.to_string(), Value::String(block.tag().to_string()));
                NodeDocument {
                    id: Some(block.id().to_string()),
                    node_type: Some(block.tag().to_string()),
                    data,
                    position: block.position,
                }
            })
            .collect();
        let edges = scenario
            .edges
            .iter()
            .map(|edge| EdgeDocument {
                id: Some(edge.id.clone()),
                source: edge.source.clone(),
                target: edge.target.clone(),
                source_handle: edge.source_handle.clone(),
                target_handle: edge.target_handle.clone(),
            })
            .collect();
        Self {
            nodes,
            edges,
            admin_chat_id: scenario.admin_chat_id().map(str::to_string),
        }
    }

    /// Rebuild the scenario for `bot_id`.
    ///
    /// Tags the registry does not know load as unknown blocks. A known block
    /// whose fields do not fit its type is kept verbatim as well, so that a
    /// save does not lose anything the editor could not interpret.
    pub fn into_scenario(
        self,
        bot_id: &str,
        registry: &BlockRegistry,
    ) -> Result<Scenario, DocumentError> {
        let mut scenario = Scenario::empty(bot_id);
        let mut block_ids = AHashSet::new();

        for (index, node) in self.nodes.into_iter().enumerate() {
            let id = match node.id.as_deref().map(str::trim) {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => return Err(DocumentError::MissingNodeId { index }),
            };
            if !block_ids.insert(id.clone()) {
                return Err(DocumentError::DuplicateNodeId(id));
            }

            let tag = node.block_type().to_string();
            let kind = registry.resolve(&tag);
            if kind.is_none() {
                warn!(block_id = %id, block_type = %tag, "Loading block of unknown type");
            }
            let data = match BlockData::from_fields(&tag, kind, node.data.clone()) {
                Ok(data) => data,
                Err(e) if kind.is_some() => {
                    warn!(block_id = %id, error = %e, "Block fields do not fit their type, keeping them verbatim");
                    BlockData::from_fields(&tag, None, node.data).map_err(|e| {
                        DocumentError::InvalidNodeData {
                            node_id: id.clone(),
                            message: e.to_string(),
                        }
                    })?
                }
                Err(e) => {
                    return Err(DocumentError::InvalidNodeData {
                        node_id: id,
                        message: e.to_string(),
                    });
                }
            };
            scenario.blocks.push(Block::new(id, node.position, data));
        }

        let mut edge_ids = AHashSet::new();
        for edge in self.edges {
            let id = match edge.id.filter(|id| !id.is_empty() && !edge_ids.contains(id)) {
                Some(id) => id,
                None => Uuid::new_v4().to_string(),
            };
            edge_ids.insert(id.clone());
            let mut loaded = Edge::new(id, edge.source, edge.target, edge.source_handle);
            loaded.target_handle = edge.target_handle;
            scenario.edges.push(loaded);
        }

        if let Err(e) = scenario.set_admin_chat_id(self.admin_chat_id.as_deref()) {
            warn!(bot_id = %bot_id, error = %e, "Ignoring stored admin chat id");
        }
        Ok(scenario)
    }
}

/// Everything needed to recreate a bot elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub bot_id: String,
    pub scenario: ScenarioDocument,
    pub token: String,
}

pub const IMPORT_KEYS: [&str; 3] = ["bot_id", "scenario", "token"];

impl ExportBundle {
    /// Check the top-level shape of an uploaded document before anything is
    /// sent anywhere.
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        let Value::Object(map) = &value else {
            return Err(ValidationError::MalformedImport(
                "expected a JSON object at the top level".to_string(),
            ));
        };
        for key in IMPORT_KEYS {
            if !map.contains_key(key) {
                return Err(ValidationError::MissingImportKey(key));
            }
        }
        let bundle: Self = serde_json::from_value(value)
            .map_err(|e| ValidationError::MalformedImport(e.to_string()))?;
        if bundle.bot_id.trim().is_empty() {
            return Err(ValidationError::EmptyField("bot_id"));
        }
        if bundle.token.trim().is_empty() {
            return Err(ValidationError::EmptyField("token"));
        }
        Ok(bundle)
    }

    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        let value = serde_json::from_str(json)
            .map_err(|e| ValidationError::MalformedImport(e.to_string()))?;
        Self::from_value(value)
    }
}

/// Import body sent to the backend. The token travels separately.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportRequest<'a> {
    pub bot_id: &'a str,
    pub scenario: &'a ScenarioDocument,
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("expected a string id, found {}", other))),
    }
}

fn lenient_opt_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(D::Error::custom(format!("expected a string, found {}", other))),
    }
}
