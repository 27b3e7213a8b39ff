use crate::action::ActionExecutor;
use crate::animation::{AnimationFormatter, AnimationRegistry, TextFormatter};
use crate::config::EngineConfig;
use crate::content::ContentParserChain;
use crate::ticker::Ticker;
use holograms_io::{EntityIdAllocator, Transport, ViewerDirectory};
use std::fmt;
use std::sync::Arc;

/// Everything a hologram needs from the outside, built once and shared by handle.
pub struct Services {
    pub transport: Arc<dyn Transport>,
    pub directory: Arc<dyn ViewerDirectory>,
    pub actions: Arc<dyn ActionExecutor>,
    pub parsers: ContentParserChain,
    pub formatter: Arc<dyn TextFormatter>,
    pub entity_ids: EntityIdAllocator,
    pub ticker: Arc<Ticker>,
    pub config: EngineConfig,
}

impl Services {
    /// Default parser chain and the animation formatter with the stock animations.
    pub fn new(
        config: EngineConfig,
        transport: Arc<dyn Transport>,
        directory: Arc<dyn ViewerDirectory>,
        actions: Arc<dyn ActionExecutor>,
    ) -> Self {
        let ticker = Arc::new(Ticker::new(config.tick_period()));
        let formatter = Arc::new(AnimationFormatter::new(Arc::new(
            AnimationRegistry::with_defaults(),
        )));

        Self {
            transport,
            directory,
            actions,
            parsers: ContentParserChain::with_defaults(),
            formatter,
            entity_ids: EntityIdAllocator::new(),
            ticker,
            config,
        }
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn TextFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_parsers(mut self, parsers: ContentParserChain) -> Self {
        self.parsers = parsers;
        self
    }

    pub fn with_entity_ids(mut self, entity_ids: EntityIdAllocator) -> Self {
        self.entity_ids = entity_ids;
        self
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("parsers", &self.parsers)
            .field("ticker", &self.ticker)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
