use std::fmt;

/// Name of the single exit handle carried by blocks without branching.
pub const DEFAULT_HANDLE: &str = "default";

/// How a block exposes its exit handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitLayout {
    /// One `default` exit.
    Single,
    /// `yes` and `no` exits.
    YesNo,
    /// `a` and `b` exits.
    Split,
    /// One exit per configured button, named by its zero-based index.
    PerButton,
}

/// Static facts about one block type, as shown in the palette.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDescriptor {
    pub kind: BlockKind,
    pub title: &'static str,
    pub color: &'static str,
    pub default_label: Option<&'static str>,
    pub exits: ExitLayout,
}

/// Defines the closed block catalog: the `BlockKind` enum, its tag
/// conversions and the per-kind descriptors, all from one list.
macro_rules! define_blocks {
    ( $( ($variant:ident, $tag:literal, $title:literal, $color:literal, $label:expr, $exits:ident) ),* $(,)? ) => {
        /// Every block type the editor knows about.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum BlockKind {
            $( $variant, )*
        }

        impl BlockKind {
            /// All kinds, in palette order.
            pub const ALL: &'static [BlockKind] = &[ $( BlockKind::$variant, )* ];

            /// The wire tag stored in scenario documents.
            pub fn tag(self) -> &'static str {
                match self {
                    $( BlockKind::$variant => $tag, )*
                }
            }

            pub fn from_tag(tag: &str) -> Option<Self> {
                match tag {
                    $( $tag => Some(BlockKind::$variant), )*
                    _ => None,
                }
            }

            /// Palette title, color, default label and exit layout.
            pub fn descriptor(self) -> BlockDescriptor {
                match self {
                    $(
                        BlockKind::$variant => BlockDescriptor {
                            kind: BlockKind::$variant,
                            title: $title,
                            color: $color,
                            default_label: $label,
                            exits: ExitLayout::$exits,
                        },
                    )*
                }
            }
        }
    };
}

define_blocks! {
    (Start, "start", "Start", "#a0e6a0", None, Single),
    (Message, "message", "Message", "#a0c4ff", Some("New message"), Single),
    (Question, "question", "Question", "#ffd580", None, Single),
    (Command, "command", "Command", "#c4a0ff", None, Single),
    (Image, "image", "Image", "#ffebcd", None, Single),
    (Gallery, "gallery", "Gallery", "#c2d4fe", None, Single),
    (Button, "button", "Buttons", "#ffcc99", None, PerButton),
    (InlineButton, "inline_button", "Inline buttons", "#e83e8c", None, PerButton),
    (Condition, "condition", "Condition", "#b3e0ff", None, YesNo),
    (Input, "input", "Input", "#ffb3d1", None, Single),
    (Api, "api", "API request", "#ff99cc", None, Single),
    (Random, "random", "Random choice", "#d1b3ff", None, Split),
    (Abtest, "abtest", "A/B test", "#99ffb3", None, Split),
    (Handoff, "handoff", "Operator handoff", "#ccffcc", None, Single),
    (Menu, "menu", "Menu", "#ffb347", None, Single),
    (File, "file", "Files", "#d4d4aa", None, Single),
    (NlpResponse, "nlp_response", "NLP response", "#f0f8ff", None, Single),
    (Delay, "delay", "Delay", "#ffe4b5", None, Single),
    (KeywordProcessor, "keyword_processor", "Keyword processor", "#FF9800", None, Single),
    (ProductCard, "product_card", "Product card", "#e8f5e9", None, Single),
    (Schedule, "schedule", "Schedule", "#ce93d8", None, Single),
    (End, "end", "End", "#ff9999", None, Single),
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

pub(super) fn default_descriptors() -> Vec<BlockDescriptor> {
    BlockKind::ALL.iter().map(|kind| kind.descriptor()).collect()
}

impl ExitLayout {
    /// Exit handle names for a block with `button_count` configured buttons.
    pub fn handles(self, button_count: usize) -> Vec<String> {
        match self {
            ExitLayout::Single => vec![DEFAULT_HANDLE.to_string()],
            ExitLayout::YesNo => vec!["yes".to_string(), "no".to_string()],
            ExitLayout::Split => vec!["a".to_string(), "b".to_string()],
            ExitLayout::PerButton => (0..button_count).map(|i| i.to_string()).collect(),
        }
    }
}
