//! HTML rendering of text-range effects.

use crate::model::component::{Style, TextEffect, TextRangeEffect};

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&#39;"),
            '"' => escaped.push_str("&#34;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// An anchor pointing at a user in the federated network.
pub fn mention_link(user_id: &str, name: &str) -> String {
    format!("<a href=\"https://matrix.to/#/{user_id}\">@{name}</a>")
}

/// Apply effects in list order by concatenating rendered slices.
///
/// Offsets are byte positions produced by the body walker; empty slices
/// contribute nothing.
pub fn format_effects(text: &str, effects: &[TextRangeEffect]) -> String {
    let mut formatted = String::new();
    for effect in effects {
        let Some(slice) = text.get(effect.start..effect.end) else {
            continue;
        };
        if !slice.is_empty() {
            formatted.push_str(&apply_effect(slice, &effect.effect));
        }
    }
    formatted
}

/// Render one slice under one effect.
fn apply_effect(text: &str, effect: &TextEffect) -> String {
    let output = escape_html(text);
    match effect {
        TextEffect::Default => output,
        TextEffect::Mention(mention) => mention_link(mention, &output),
        TextEffect::Link(link) => format!("<a href=\"{link}\">{output}</a>"),
        TextEffect::Styles(styles) => {
            let mut wrapped = output;
            for style in styles {
                let tag = match style {
                    Style::Bold => "b",
                    Style::Italic => "i",
                    Style::Strikethrough => "s",
                    Style::Underline => "u",
                };
                wrapped = format!("<{tag}>{wrapped}</{tag}>");
            }
            wrapped
        }
        // Codes, conversions and animations render as plain escaped text.
        TextEffect::OneTimeCode | TextEffect::Conversion(_) | TextEffect::Animation(_) => output,
    }
}
