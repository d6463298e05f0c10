//! HTML template splitting.
//!
//! A template carries two markers: `<!--ssr-head-->` where head markup goes
//! and `<!--ssr-html-->` where the application root goes. Splitting once up
//! front gives the four static fragments both render modes stitch around.

use crate::error::PipelineError;

pub const HEAD_MARKER: &str = "<!--ssr-head-->";
pub const BODY_MARKER: &str = "<!--ssr-html-->";
const HEAD_CLOSE: &str = "</head>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateFragments {
    /// Everything before the head marker.
    pub before_head: String,
    /// From the head marker up to and including `</head>`.
    pub after_head: String,
    /// After `</head>` up to the body marker.
    pub before_body: String,
    /// Everything after the body marker.
    pub after_body: String,
}

impl TemplateFragments {
    /// Split `template` around its markers. A missing marker is a configuration error.
    pub fn split(template: &str) -> Result<Self, PipelineError> {
        let (before_head, rest) = template
            .split_once(HEAD_MARKER)
            .ok_or_else(|| PipelineError::infra(format!("template is missing the {HEAD_MARKER} marker")))?;
        let (between, after_body) = rest.split_once(BODY_MARKER).ok_or_else(|| {
            PipelineError::infra(format!("template is missing the {BODY_MARKER} marker after {HEAD_MARKER}"))
        })?;

        let (after_head, before_body) = match between.find(HEAD_CLOSE) {
            Some(idx) => between.split_at(idx + HEAD_CLOSE.len()),
            None => (between, ""),
        };

        Ok(Self {
            before_head: before_head.to_string(),
            after_head: after_head.to_string(),
            before_body: before_body.to_string(),
            after_body: after_body.to_string(),
        })
    }
}
