//! Combined components and text-range effects: the unified display-order
//! elements a message body decomposes into.

/// Attribute-dictionary key names found in attributed bodies.
///
/// These are fixed, case-sensitive identifiers written by the host
/// application; matching is by exact string equality.
pub mod keys {
    pub const FILE_TRANSFER_GUID: &str = "__kIMFileTransferGUIDAttributeName";
    pub const AUDIO_TRANSCRIPTION: &str = "IMAudioTranscription";
    pub const INLINE_MEDIA_HEIGHT: &str = "__kIMInlineMediaHeightAttributeName";
    pub const INLINE_MEDIA_WIDTH: &str = "__kIMInlineMediaWidthAttributeName";
    pub const FILENAME: &str = "__kIMFilenameAttributeName";
    pub const MENTION_CONFIRMED: &str = "__kIMMentionConfirmedMention";
    pub const LINK: &str = "__kIMLinkAttributeName";
    pub const ONE_TIME_CODE: &str = "__kIMOneTimeCodeAttributeName";
    pub const CALENDAR_EVENT: &str = "__kIMCalendarEventAttributeName";
    pub const TEXT_BOLD: &str = "__kIMTextBoldAttributeName";
    pub const TEXT_UNDERLINE: &str = "__kIMTextUnderlineAttributeName";
    pub const TEXT_ITALIC: &str = "__kIMTextItalicAttributeName";
    pub const TEXT_STRIKETHROUGH: &str = "__kIMTextStrikethroughAttributeName";
    pub const TEXT_EFFECT: &str = "__kIMTextEffectAttributeName";
}

/// A single text style flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Bold,
    Italic,
    Strikethrough,
    Underline,
}

/// Animated text effects, by the host application's numeric identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationType {
    Big,
    Small,
    Shake,
    Nod,
    Explode,
    Ripple,
    Bloom,
    Jitter,
    Unknown,
}

impl AnimationType {
    pub fn from_i64(value: i64) -> Self {
        match value {
            5 => Self::Big,
            11 => Self::Small,
            9 => Self::Shake,
            8 => Self::Nod,
            12 => Self::Explode,
            4 => Self::Ripple,
            6 => Self::Bloom,
            10 => Self::Jitter,
            _ => Self::Unknown,
        }
    }
}

/// Unit-conversion prompts the host application recognizes in text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionType {
    Currency,
    Distance,
    Temperature,
    Timezone,
    Volume,
    Weight,
}

/// How a run of text is decorated.
#[derive(Debug, Clone, PartialEq)]
pub enum TextEffect {
    Default,
    Styles(Vec<Style>),
    Mention(String),
    Link(String),
    OneTimeCode,
    Conversion(ConversionType),
    Animation(AnimationType),
}

/// One decorated run of the body string.
///
/// `start` and `end` are byte offsets into the UTF-8 body, translated from
/// the stored character positions through the walker's index table.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRangeEffect {
    pub start: usize,
    pub end: usize,
    pub effect: TextEffect,
}

/// Attachment details pulled from a component attribute dictionary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttachmentMeta {
    pub guid: Option<String>,
    pub transcription: Option<String>,
    pub height: Option<f64>,
    pub width: Option<f64>,
    pub name: Option<String>,
}

/// One element of a message in display order: a run of styled text, an
/// attachment placeholder, or a retracted-part marker.
#[derive(Debug, Clone, PartialEq)]
pub enum CombinedComponent {
    Attachment(AttachmentMeta),
    Text(Vec<TextRangeEffect>),
    Retraction,
}
