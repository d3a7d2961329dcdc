use super::kind::{BlockKind, ExitLayout};
use crate::error::ContentError;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Loose JSON field bag, as stored in a node's `data` object.
pub type FieldMap = Map<String, Value>;

/// Keys in a node's `data` object that describe the editor, not the block.
pub const TRANSIENT_DATA_KEYS: &[&str] = &["blockType", "onChange"];

/// Fields for blocks whose only content is their label (message text,
/// question text, command name...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextFields {
    #[serde(flatten)]
    pub extra: FieldMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageFields {
    pub url: String,
    #[serde(flatten)]
    pub extra: FieldMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryFields {
    pub images: Vec<String>,
    #[serde(flatten)]
    pub extra: FieldMap,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonLayout {
    #[default]
    Column,
    Row,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ButtonSpec {
    #[serde(deserialize_with = "lenient_text")]
    pub label: String,
    #[serde(deserialize_with = "lenient_text")]
    pub callback_data: String,
}

/// Reply keyboard (`button`) and inline keyboard (`inline_button`) blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ButtonFields {
    pub buttons: Vec<ButtonSpec>,
    pub button_layout: ButtonLayout,
    /// Only meaningful for the `row` layout. Always within 1..=8.
    #[serde(deserialize_with = "lenient_buttons_per_row")]
    pub buttons_per_row: u32,
    pub hide_keyboard: bool,
    #[serde(flatten)]
    pub extra: FieldMap,
}

pub const MAX_BUTTONS_PER_ROW: u32 = 8;

impl Default for ButtonFields {
    fn default() -> Self {
        Self {
            buttons: Vec::new(),
            button_layout: ButtonLayout::Column,
            buttons_per_row: MAX_BUTTONS_PER_ROW,
            hide_keyboard: false,
            extra: FieldMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionFields {
    pub condition: String,
    #[serde(flatten)]
    pub extra: FieldMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InputFields {
    pub variable_name: String,
    #[serde(flatten)]
    pub extra: FieldMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiFields {
    pub url: String,
    pub method: String,
    #[serde(flatten)]
    pub extra: FieldMap,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuItem {
    pub command: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MenuFields {
    pub menu_items: Vec<MenuItem>,
    #[serde(flatten)]
    pub extra: FieldMap,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRef {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileFields {
    pub files: Vec<FileRef>,
    #[serde(flatten)]
    pub extra: FieldMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayFields {
    #[serde(deserialize_with = "lenient_u32")]
    pub hours: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub minutes: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub seconds: u32,
    #[serde(flatten)]
    pub extra: FieldMap,
}

impl DelayFields {
    pub fn total_seconds(&self) -> u64 {
        u64::from(self.hours) * 3600 + u64::from(self.minutes) * 60 + u64::from(self.seconds)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Exact,
    Partial,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KeywordFields {
    pub keywords: Vec<String>,
    pub case_sensitive: bool,
    pub match_mode: MatchMode,
    #[serde(flatten)]
    pub extra: FieldMap,
}

/// Product card fields. The wire names are snake_case, unlike the rest of
/// the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductFields {
    pub photo_url: String,
    pub title: String,
    pub description: String,
    #[serde(deserialize_with = "lenient_text")]
    pub price: String,
    pub features: Vec<String>,
    #[serde(flatten)]
    pub extra: FieldMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScheduleFields {
    pub date_question: String,
    pub time_question: String,
    pub work_start_time: String,
    pub work_end_time: String,
    /// Slot length in minutes.
    #[serde(deserialize_with = "lenient_u32")]
    pub time_interval: u32,
    pub min_date: String,
    pub max_date: String,
    pub unavailable_message: String,
    pub crm_integration: bool,
    pub crm_endpoint: String,
    #[serde(flatten)]
    pub extra: FieldMap,
}

impl Default for ScheduleFields {
    fn default() -> Self {
        Self {
            date_question: "Which date would you like to book?".to_string(),
            time_question: "Which time would you like to book?".to_string(),
            work_start_time: "09:00".to_string(),
            work_end_time: "18:00".to_string(),
            time_interval: 30,
            min_date: "today".to_string(),
            max_date: "today + 30 days".to_string(),
            unavailable_message: "Sorry, this time is already taken. Please choose another one."
                .to_string(),
            crm_integration: false,
            crm_endpoint: String::new(),
            extra: FieldMap::new(),
        }
    }
}

/// Declares `BlockContent` with one variant per `BlockKind`, and the
/// conversions between variants and raw field bags. The matches over
/// `BlockKind` are exhaustive, so adding a kind without content fails to build.
macro_rules! define_content {
    ( $( $variant:ident($fields:ty) ),* $(,)? ) => {
        /// Type-dependent block content. The variant is fixed at creation.
        #[derive(Debug, Clone, PartialEq)]
        pub enum BlockContent {
            $( $variant($fields), )*
            /// A block whose tag is not in the catalog. Its fields are kept
            /// verbatim so that saving does not lose them.
            Unknown { tag: String, fields: FieldMap },
        }

        impl BlockContent {
            pub fn kind(&self) -> Option<BlockKind> {
                match self {
                    $( BlockContent::$variant(_) => Some(BlockKind::$variant), )*
                    BlockContent::Unknown { .. } => None,
                }
            }

            pub fn default_for(kind: BlockKind) -> Self {
                match kind {
                    $( BlockKind::$variant => BlockContent::$variant(<$fields>::default()), )*
                }
            }

            fn decode(kind: BlockKind, fields: FieldMap) -> Result<Self, ContentError> {
                match kind {
                    $( BlockKind::$variant => decode_fields::<$fields>(kind, fields).map(BlockContent::$variant), )*
                }
            }

            fn encode(&self) -> FieldMap {
                match self {
                    $( BlockContent::$variant(fields) => encode_fields(fields), )*
                    BlockContent::Unknown { fields, .. } => fields.clone(),
                }
            }
        }
    };
}

define_content! {
    Start(TextFields),
    Message(TextFields),
    Question(TextFields),
    Command(TextFields),
    Image(ImageFields),
    Gallery(GalleryFields),
    Button(ButtonFields),
    InlineButton(ButtonFields),
    Condition(ConditionFields),
    Input(InputFields),
    Api(ApiFields),
    Random(TextFields),
    Abtest(TextFields),
    Handoff(TextFields),
    Menu(MenuFields),
    File(FileFields),
    NlpResponse(TextFields),
    Delay(DelayFields),
    KeywordProcessor(KeywordFields),
    ProductCard(ProductFields),
    Schedule(ScheduleFields),
    End(TextFields),
}

impl BlockContent {
    /// The wire tag, including the original tag of an unknown block.
    pub fn tag(&self) -> &str {
        match self {
            BlockContent::Unknown { tag, .. } => tag.as_str(),
            known => known.kind().map(BlockKind::tag).unwrap_or_default(),
        }
    }

    /// Names of the exit handles this content currently exposes.
    pub fn exit_handles(&self) -> Vec<String> {
        let button_count = match self {
            BlockContent::Button(fields) | BlockContent::InlineButton(fields) => {
                fields.buttons.len()
            }
            _ => 0,
        };
        self.kind()
            .map_or(ExitLayout::Single, |kind| kind.descriptor().exits)
            .handles(button_count)
    }
}

/// A block's label plus its typed content.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockData {
    pub label: Option<String>,
    content: BlockContent,
}

impl BlockData {
    pub fn new(label: Option<String>, content: BlockContent) -> Self {
        Self { label, content }
    }

    /// Registry defaults for a freshly created block of `kind`.
    pub fn for_kind(kind: BlockKind) -> Self {
        Self {
            label: kind.descriptor().default_label.map(str::to_string),
            content: BlockContent::default_for(kind),
        }
    }

    pub fn content(&self) -> &BlockContent {
        &self.content
    }

    pub fn kind(&self) -> Option<BlockKind> {
        self.content.kind()
    }

    pub fn tag(&self) -> &str {
        self.content.tag()
    }

    /// Build block data from a raw field bag. `kind` of `None` keeps the
    /// fields as an unknown block tagged `tag`.
    pub fn from_fields(
        tag: &str,
        kind: Option<BlockKind>,
        mut fields: FieldMap,
    ) -> Result<Self, ContentError> {
        for key in TRANSIENT_DATA_KEYS {
            fields.remove(*key);
        }
        let label = match fields.remove("label") {
            None | Some(Value::Null) => None,
            Some(Value::String(label)) => Some(label),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(other) => {
                return Err(ContentError::InvalidFields {
                    block_type: tag.to_string(),
                    message: format!("label must be text, found {}", other),
                });
            }
        };
        let content = match kind {
            Some(kind) => BlockContent::decode(kind, fields)?,
            None => BlockContent::Unknown {
                tag: tag.to_string(),
                fields,
            },
        };
        Ok(Self { label, content })
    }

    /// Raw field bag for this block, without editor-only keys.
    pub fn to_fields(&self) -> FieldMap {
        let mut fields = self.content.encode();
        if let Some(label) = &self.label {
            fields.insert("label".to_string(), Value::String(label.clone()));
        }
        fields
    }

    /// Merge `patch` into the field bag key by key. The block keeps its type:
    /// a `blockType` key in the patch is ignored. On error `self` is untouched.
    pub fn merge(&mut self, block_id: &str, patch: &Value) -> Result<(), ContentError> {
        let patch = patch
            .as_object()
            .ok_or_else(|| ContentError::PatchNotAnObject {
                block_id: block_id.to_string(),
                found: patch.to_string(),
            })?;
        let mut fields = self.to_fields();
        for (key, value) in patch {
            fields.insert(key.clone(), value.clone());
        }
        let tag = self.tag().to_string();
        *self = Self::from_fields(&tag, self.kind(), fields)?;
        Ok(())
    }

    pub fn exit_handles(&self) -> Vec<String> {
        self.content.exit_handles()
    }
}

fn decode_fields<T: DeserializeOwned>(kind: BlockKind, fields: FieldMap) -> Result<T, ContentError> {
    serde_json::from_value(Value::Object(fields)).map_err(|e| ContentError::InvalidFields {
        block_type: kind.tag().to_string(),
        message: e.to_string(),
    })
}

fn encode_fields<T: Serialize>(fields: &T) -> FieldMap {
    match serde_json::to_value(fields) {
        Ok(Value::Object(map)) => map,
        _ => FieldMap::new(),
    }
}

/// Form inputs deliver numbers as text; accept both, and treat blanks as 0.
/// Fractions are rejected rather than truncated.
fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .or_else(|| {
                n.as_f64()
                    .filter(|f| {
                        f.is_finite() && f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u32::MAX)
                    })
                    .map(|f| f as u32)
            })
            .ok_or_else(|| {
                D::Error::custom(format!("expected a non-negative whole number, found {}", n))
            }),
        Value::String(s) if s.trim().is_empty() => Ok(0),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("expected a number, found '{}'", s))),
        other => Err(D::Error::custom(format!("expected a number, found {}", other))),
    }
}

fn lenient_buttons_per_row<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    lenient_u32(deserializer).map(|n| n.clamp(1, MAX_BUTTONS_PER_ROW))
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(D::Error::custom(format!("expected text, found {}", other))),
    }
}
