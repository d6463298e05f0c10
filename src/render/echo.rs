//! Built-in render module that prints the data snapshot.
//!
//! Stands in for a real UI engine: the binary serves it by default and the
//! tests drive both render modes through it.

use async_trait::async_trait;
use serde_json::Value;

use crate::render::document::escape_html;
use crate::render::module::{
    BufferedInput, RenderError, RenderModule, RenderedDocument, StreamControl, StreamingInput,
};
use crate::render::stream::StreamWriter;
use crate::JsonMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct EchoRenderModule;

fn title(meta: Option<&JsonMap>) -> String {
    let title = meta
        .and_then(|m| m.get("title"))
        .and_then(Value::as_str)
        .unwrap_or("App");
    format!("<title>{}</title>", escape_html(title))
}

fn body(data: &JsonMap) -> String {
    let pretty = serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string());
    format!("<pre id=\"initial-data\">{}</pre>", escape_html(&pretty))
}

#[async_trait]
impl RenderModule for EchoRenderModule {
    async fn render_buffered(&self, input: BufferedInput<'_>) -> Result<RenderedDocument, RenderError> {
        Ok(RenderedDocument {
            head: title(input.meta),
            body: body(input.data),
        })
    }

    fn render_streaming(
        &self,
        writer: StreamWriter,
        input: StreamingInput,
    ) -> Result<Box<dyn StreamControl>, RenderError> {
        let task = tokio::spawn(async move {
            if writer.head_ready(title(Some(&input.meta))).await.is_err() {
                return;
            }
            let data = match input.data.resolve().await {
                Ok(data) => data,
                Err(err) => {
                    let _ = writer.error(err).await;
                    return;
                }
            };
            if input.signal.is_canceled() {
                return;
            }
            if writer.write(body(&data)).await.is_err() {
                return;
            }
            if writer.all_data_ready(data).await.is_err() {
                return;
            }
            let _ = writer.finish().await;
        });
        Ok(Box::new(task.abort_handle()))
    }
}
