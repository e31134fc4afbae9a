//! Result rendering.
//!
//! A renderer turns a cell status into what the result box beneath an entry
//! shows: a state (ok, error, pending) and display text.

use serde::Serialize;

use crate::reactive::{Status, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RenderState {
    Ok,
    Error,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rendered {
    pub state: RenderState,
    pub text: String,
}

pub trait Renderer: Send + Sync {
    fn render(&self, status: &Status) -> Rendered;
}

/// Strings verbatim, `null` as nothing, everything else as compact JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextRenderer;

impl Renderer for TextRenderer {
    fn render(&self, status: &Status) -> Rendered {
        match status {
            Status::Pending => Rendered {
                state: RenderState::Pending,
                text: String::new(),
            },
            Status::Fulfilled(value) => Rendered {
                state: RenderState::Ok,
                text: match value {
                    Value::String(text) => text.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                },
            },
            Status::Rejected(error) => Rendered {
                state: RenderState::Error,
                text: error.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CellError;
    use serde_json::json;

    #[test]
    fn markup_renders_verbatim() {
        let rendered = TextRenderer.render(&Status::Fulfilled(json!("Hello <strong>world</strong>")));
        assert_eq!(rendered.state, RenderState::Ok);
        assert_eq!(rendered.text, "Hello <strong>world</strong>");
    }

    #[test]
    fn values_render_as_json() {
        let rendered = TextRenderer.render(&Status::Fulfilled(json!([2, 3, 4, 5])));
        assert_eq!(rendered.text, "[2,3,4,5]");
    }

    #[test]
    fn rejections_render_their_message() {
        let rendered = TextRenderer.render(&Status::Rejected(CellError::missing("xx")));
        assert_eq!(rendered.state, RenderState::Error);
        assert_eq!(rendered.text, "xx is not defined");
    }

    #[test]
    fn state_serializes_like_the_result_box() {
        assert_eq!(serde_json::to_string(&RenderState::Error).unwrap(), "\"ERROR\"");
    }
}
