//! Route definitions.
//!
//! Routes are declared in code (they carry data handlers), not in config.

use std::fmt;
use std::sync::Arc;

use crate::data::DataHandler;
use crate::JsonMap;

/// How a matched route is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    #[default]
    Buffered,
    Streaming,
}

impl RenderMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderMode::Buffered => "buffered",
            RenderMode::Streaming => "streaming",
        }
    }
}

/// Attributes for a route rendered as one complete document.
#[derive(Clone, Default)]
pub struct BufferedAttributes {
    /// Emit the client bootstrap script (default: true).
    pub hydrate: Option<bool>,
    pub meta: Option<JsonMap>,
    pub data: Option<Arc<dyn DataHandler>>,
}

impl BufferedAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hydrate(mut self, hydrate: bool) -> Self {
        self.hydrate = Some(hydrate);
        self
    }

    pub fn meta(mut self, meta: JsonMap) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn data(mut self, handler: impl DataHandler + 'static) -> Self {
        self.data = Some(Arc::new(handler));
        self
    }
}

/// Attributes for a progressively streamed route. `meta` is mandatory here.
#[derive(Clone)]
pub struct StreamingAttributes {
    pub hydrate: Option<bool>,
    pub meta: JsonMap,
    pub data: Option<Arc<dyn DataHandler>>,
}

impl StreamingAttributes {
    pub fn new(meta: JsonMap) -> Self {
        Self {
            hydrate: None,
            meta,
            data: None,
        }
    }

    pub fn hydrate(mut self, hydrate: bool) -> Self {
        self.hydrate = Some(hydrate);
        self
    }

    pub fn data(mut self, handler: impl DataHandler + 'static) -> Self {
        self.data = Some(Arc::new(handler));
        self
    }
}

/// Render-mode specific attributes of a route.
#[derive(Clone)]
pub enum RouteAttributes {
    Buffered(BufferedAttributes),
    Streaming(StreamingAttributes),
}

/// A path pattern plus how to render what it matches.
#[derive(Clone)]
pub struct Route {
    /// Pattern, e.g. `/users/:id`.
    pub path: String,
    /// Owning application; `None` means the first configured app.
    pub app_id: Option<String>,
    pub attributes: Option<RouteAttributes>,
}

impl Route {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            app_id: None,
            attributes: None,
        }
    }

    pub fn app(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub fn buffered(mut self, attributes: BufferedAttributes) -> Self {
        self.attributes = Some(RouteAttributes::Buffered(attributes));
        self
    }

    pub fn streaming(mut self, attributes: StreamingAttributes) -> Self {
        self.attributes = Some(RouteAttributes::Streaming(attributes));
        self
    }

    pub fn render_mode(&self) -> RenderMode {
        match self.attributes {
            Some(RouteAttributes::Streaming(_)) => RenderMode::Streaming,
            _ => RenderMode::Buffered,
        }
    }

    pub fn hydrate(&self) -> bool {
        let hydrate = match &self.attributes {
            Some(RouteAttributes::Buffered(a)) => a.hydrate,
            Some(RouteAttributes::Streaming(a)) => a.hydrate,
            None => None,
        };
        hydrate.unwrap_or(true)
    }

    pub fn meta(&self) -> Option<&JsonMap> {
        match &self.attributes {
            Some(RouteAttributes::Buffered(a)) => a.meta.as_ref(),
            Some(RouteAttributes::Streaming(a)) => Some(&a.meta),
            None => None,
        }
    }

    pub fn data_handler(&self) -> Option<&Arc<dyn DataHandler>> {
        match &self.attributes {
            Some(RouteAttributes::Buffered(a)) => a.data.as_ref(),
            Some(RouteAttributes::Streaming(a)) => a.data.as_ref(),
            None => None,
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("app_id", &self.app_id)
            .field("mode", &self.render_mode())
            .field("hydrate", &self.hydrate())
            .field("has_data", &self.data_handler().is_some())
            .finish()
    }
}
