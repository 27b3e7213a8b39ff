//! Content classification.
//!
//! Parsers are tried last-registered-first. The text parser accepts anything
//! and is registered first, so a more specific parser always gets the first look.

mod parsers;

pub use parsers::{EntityParser, HeadParser, IconParser, SmallHeadParser, TextParser};

use crate::error::HologramError;
use crate::hologram::LineBody;
use crate::render::{LineType, Payload};
use crate::services::Services;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

pub trait ContentParser: Send + Sync {
    fn name(&self) -> &'static str;

    /// The payload for `content`, or `None` if this parser does not claim it.
    fn parse(&self, content: &str) -> Option<Payload>;
}

#[derive(Default)]
pub struct ContentParserChain {
    parsers: RwLock<Vec<Arc<dyn ContentParser>>>,
}

impl fmt::Debug for ContentParserChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&'static str> = self.parsers.read().iter().map(|p| p.name()).collect();
        f.debug_struct("ContentParserChain")
            .field("parsers", &names)
            .finish()
    }
}

impl ContentParserChain {
    /// An empty chain. Register a fallback first or every parse fails.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let chain = Self::new();
        chain.register(Arc::new(TextParser));
        chain.register(Arc::new(IconParser));
        chain.register(Arc::new(HeadParser));
        chain.register(Arc::new(SmallHeadParser));
        chain.register(Arc::new(EntityParser));
        chain
    }

    /// Later registrations take precedence.
    pub fn register(&self, parser: Arc<dyn ContentParser>) {
        tracing::debug!(parser = parser.name(), "content parser registered");
        self.parsers.write().push(parser);
    }

    pub fn len(&self) -> usize {
        self.parsers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.read().is_empty()
    }

    pub fn classify(&self, content: &str) -> Result<Payload, HologramError> {
        self.parsers
            .read()
            .iter()
            .rev()
            .find_map(|parser| parser.parse(content))
            .ok_or_else(|| HologramError::NoParserMatched(content.to_string()))
    }

    /// Classifies the line's content and brings its renderer in line with it.
    pub fn parse(&self, body: &mut LineBody, services: &Services) -> Result<LineType, HologramError> {
        let payload = match self.classify(&body.content) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(content = %body.content, "no content parser matched");
                return Err(e);
            }
        };
        let line_type = payload.line_type();
        body.apply_payload(payload, services);
        Ok(line_type)
    }
}
