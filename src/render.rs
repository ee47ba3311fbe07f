//! Notification message rendering
//!
//! Templates are plain text with `{{ field }}` placeholders. A template that
//! names a built-in format selects one of the bundled layouts instead.

use crate::error::TemplateError;
use crate::events::Event;

const MARKDOWN_MESSAGE: &str = "Detected **{{ label }}** on camera **{{ camera }}**\n\n\
- Score: {{ score }}\n\
- Zones: {{ zones }}\n\
- Sublabels: {{ sublabels }}\n\
- Started: {{ start_time }}\n\
- Event ID: {{ id }}";

const PLAINTEXT_MESSAGE: &str = "Detected {{ label }} on camera {{ camera }}\n\
Score: {{ score }}\n\
Zones: {{ zones }}\n\
Sublabels: {{ sublabels }}\n\
Started: {{ start_time }}\n\
Event ID: {{ id }}";

const HTML_MESSAGE: &str = "<p>Detected <b>{{ label }}</b> on camera <b>{{ camera }}</b></p>\
<ul>\
<li>Score: {{ score }}</li>\
<li>Zones: {{ zones }}</li>\
<li>Sublabels: {{ sublabels }}</li>\
<li>Started: {{ start_time }}</li>\
<li>Event ID: {{ id }}</li>\
</ul>";

const DEFAULT_TITLE: &str = "{{ label }} detected on {{ camera }}";

/// Layouts shipped with the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinFormat {
    Markdown,
    Plaintext,
    Html,
}

impl BuiltinFormat {
    fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "markdown" => Some(BuiltinFormat::Markdown),
            "plaintext" => Some(BuiltinFormat::Plaintext),
            "html" => Some(BuiltinFormat::Html),
            _ => None,
        }
    }

    fn message_template(&self) -> &'static str {
        match self {
            BuiltinFormat::Markdown => MARKDOWN_MESSAGE,
            BuiltinFormat::Plaintext => PLAINTEXT_MESSAGE,
            BuiltinFormat::Html => HTML_MESSAGE,
        }
    }
}

/// Which template to render: a built-in layout or operator-supplied text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSelector {
    Builtin(BuiltinFormat),
    Custom(String),
}

impl TemplateSelector {
    /// Interpret a configured template string
    ///
    /// Built-in format names select the bundled layout, anything else is
    /// treated as template text.
    pub fn parse(raw: &str) -> Self {
        match BuiltinFormat::from_name(raw) {
            Some(format) => TemplateSelector::Builtin(format),
            None => TemplateSelector::Custom(raw.to_string()),
        }
    }

    /// Configured template, or the given built-in when none is set
    pub fn or_builtin(raw: Option<&str>, fallback: BuiltinFormat) -> Self {
        match raw {
            Some(raw) if !raw.trim().is_empty() => Self::parse(raw),
            _ => TemplateSelector::Builtin(fallback),
        }
    }
}

/// What the rendered text is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPurpose {
    Title,
    Message,
}

/// Render a template for an event
///
/// Pure: the same inputs always produce the same output.
///
/// # Errors
///
/// Returns `TemplateError` for unknown, empty or unterminated placeholders.
pub fn render(
    selector: &TemplateSelector,
    event: &Event,
    purpose: RenderPurpose,
) -> Result<String, TemplateError> {
    let template = match (selector, purpose) {
        (TemplateSelector::Custom(text), _) => text.as_str(),
        (TemplateSelector::Builtin(_), RenderPurpose::Title) => DEFAULT_TITLE,
        (TemplateSelector::Builtin(format), RenderPurpose::Message) => format.message_template(),
    };
    render_str(template, event)
}

/// Substitute `{{ field }}` placeholders in `template`
pub fn render_str(template: &str, event: &Event) -> Result<String, TemplateError> {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(open) = rest.find("{{") {
        output.push_str(&rest[..open]);
        let start = offset + open;
        let after_open = &rest[open + 2..];

        let close = after_open
            .find("}}")
            .ok_or(TemplateError::Unterminated(start))?;
        let name = after_open[..close].trim();
        if name.is_empty() {
            return Err(TemplateError::EmptyPlaceholder(start));
        }

        let value =
            field_value(event, name).ok_or_else(|| TemplateError::UnknownPlaceholder(name.to_string()))?;
        output.push_str(&value);

        let consumed = open + 2 + close + 2;
        rest = &rest[consumed..];
        offset += consumed;
    }

    output.push_str(rest);
    Ok(output)
}

fn field_value(event: &Event, name: &str) -> Option<String> {
    let value = match name {
        "id" => event.id.clone(),
        "label" => event.label.clone(),
        "camera" => or_unknown(&event.camera),
        "sublabels" => join_or_none(&event.sub_labels),
        "zones" => join_or_none(&event.current_zones),
        "score" => format!("{:.0}%", event.score_percent()),
        "start_time" => event
            .start_time
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "unknown".to_string()),
        "has_snapshot" => event.has_snapshot.to_string(),
        _ => return None,
    };
    Some(value)
}

fn or_unknown(value: &str) -> String {
    if value.is_empty() {
        "unknown".to_string()
    } else {
        value.to_string()
    }
}

fn join_or_none(values: &[String]) -> String {
    if values.is_empty() {
        "none".to_string()
    } else {
        values.join(", ")
    }
}
