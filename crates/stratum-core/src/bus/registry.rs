//! Layer-to-handler mapping.

use std::collections::HashMap;
use std::sync::Arc;

use stratum_types::message::LayerId;

use crate::handler::BoxLayerHandler;

/// Handlers keyed by layer. At most one handler per layer; inserting again
/// replaces the previous one.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<LayerId, Arc<BoxLayerHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handler` for `layer`, returning the handler it replaced.
    pub fn insert(
        &mut self,
        layer: LayerId,
        handler: BoxLayerHandler,
    ) -> Option<Arc<BoxLayerHandler>> {
        self.handlers.insert(layer, Arc::new(handler))
    }

    pub fn remove(&mut self, layer: &LayerId) -> Option<Arc<BoxLayerHandler>> {
        self.handlers.remove(layer)
    }

    /// Shared handle to the current handler. Callers invoke it after
    /// releasing whatever lock guards the registry.
    pub fn get(&self, layer: &LayerId) -> Option<Arc<BoxLayerHandler>> {
        self.handlers.get(layer).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LayerId, &Arc<BoxLayerHandler>)> {
        self.handlers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HandlerError, LayerHandler};
    use serde_json::json;
    use stratum_types::message::LayerMessage;

    struct Named(&'static str);

    impl LayerHandler for Named {
        async fn process_message(
            &self,
            _message: &LayerMessage,
        ) -> Result<Vec<LayerMessage>, HandlerError> {
            Ok(Vec::new())
        }

        fn state(&self) -> serde_json::Value {
            json!({"name": self.0})
        }
    }

    #[test]
    fn insert_replaces_and_returns_previous() {
        let mut registry = HandlerRegistry::new();
        assert!(registry
            .insert(LayerId::basic(), BoxLayerHandler::new(Named("first")))
            .is_none());

        let previous = registry
            .insert(LayerId::basic(), BoxLayerHandler::new(Named("second")))
            .unwrap();
        assert_eq!(previous.state()["name"], "first");
        assert_eq!(registry.get(&LayerId::basic()).unwrap().state()["name"], "second");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_and_lookup() {
        let mut registry = HandlerRegistry::new();
        registry.insert(LayerId::reflective(), BoxLayerHandler::new(Named("r")));

        assert!(registry.get(&LayerId::reflective()).is_some());
        assert!(registry.get(&LayerId::basic()).is_none());
        assert!(registry.remove(&LayerId::reflective()).is_some());
        assert!(registry.is_empty());
    }
}
