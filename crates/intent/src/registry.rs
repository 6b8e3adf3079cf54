//! Handler dispatch table (§4.6): `(pattern, handler)` entries, first
//! match in registration order wins.

use std::sync::Arc;

use crate::handler::Handler;

/// `"{domain}.*"` matches any action in that domain; anything else is
/// matched as an exact intent name.
pub struct HandlerRegistry {
    entries: Vec<(String, String, Arc<dyn Handler>)>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// `domain` is the handler's own domain (used for the enabled/disabled
    /// check), `pattern` is what it registers against.
    pub fn register(&mut self, domain: impl Into<String>, pattern: impl Into<String>, handler: Arc<dyn Handler>) {
        self.entries.push((domain.into(), pattern.into(), handler));
    }

    /// First registered entry whose pattern matches `intent_name`, along
    /// with the domain it was registered under.
    pub fn resolve(&self, intent_name: &str) -> Option<(&str, Arc<dyn Handler>)> {
        self.entries
            .iter()
            .find(|(_, pattern, _)| pattern_matches(pattern, intent_name))
            .map(|(domain, _, handler)| (domain.as_str(), handler.clone()))
    }
}

fn pattern_matches(pattern: &str, intent_name: &str) -> bool {
    match pattern.strip_suffix(".*") {
        Some(prefix) => intent_name
            .split_once('.')
            .map(|(domain, _)| domain == prefix)
            .unwrap_or(false),
        None => pattern == intent_name,
    }
}
