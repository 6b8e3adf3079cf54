//! IntentOrchestrator (§4.6): selects a handler for an [`Intent`] and
//! executes it, resolving contextual commands against the current room's
//! active actions and routing unresolved fallbacks to conversation.

use std::sync::Arc;

use va_domain::config::IntentsConfig;
use va_domain::model::{ActionRecord, Intent, IntentResult, Value};
use va_domain::trace::TraceEvent;
use va_sessions::UnifiedContext;

use crate::registry::HandlerRegistry;

pub const CONVERSATION_DOMAIN: &str = "conversation";

pub struct IntentOrchestrator {
    registry: HandlerRegistry,
    config: IntentsConfig,
    llm_enabled: bool,
}

impl IntentOrchestrator {
    pub fn new(registry: HandlerRegistry, config: IntentsConfig, llm_enabled: bool) -> Self {
        Self {
            registry,
            config,
            llm_enabled,
        }
    }

    pub async fn execute(&self, intent: &Intent, context: &Arc<UnifiedContext>) -> IntentResult {
        if intent.is_contextual() {
            return self.execute_contextual(intent, context).await;
        }

        if is_fallback(intent) {
            return self.execute_fallback(intent, context).await;
        }

        self.dispatch(intent, context).await
    }

    /// §4.6.1: resolve a `contextual.*` intent against the room's own
    /// `active_actions`, never another room's.
    async fn execute_contextual(&self, intent: &Intent, context: &Arc<UnifiedContext>) -> IntentResult {
        let active = context.active_actions();

        if active.is_empty() {
            TraceEvent::ContextualResolved {
                session_id: context.session_id().to_owned(),
                contextual_intent: intent.name.clone(),
                resolved_domain: None,
                candidate_count: 0,
            }
            .emit();
            return IntentResult::ok(intent.name.clone(), "Nothing is currently active.");
        }

        let winner_domain = if active.len() == 1 {
            active.keys().next().cloned().unwrap()
        } else {
            self.pick_priority_winner(&active)
        };

        TraceEvent::ContextualResolved {
            session_id: context.session_id().to_owned(),
            contextual_intent: intent.name.clone(),
            resolved_domain: Some(winner_domain.clone()),
            candidate_count: active.len(),
        }
        .emit();

        let resolved_name = format!("{winner_domain}.{}", intent.action);
        let mut resolved = Intent::new(&resolved_name, &intent.raw_text, &intent.session_id)
            .with_confidence(intent.confidence)
            .with_entities(intent.entities.clone());
        resolved.metadata = intent.metadata.clone();

        self.dispatch(&resolved, context).await
    }

    /// Higher `domain_priority` wins; ties broken by the most-recently
    /// started action.
    fn pick_priority_winner(&self, active: &std::collections::HashMap<String, ActionRecord>) -> String {
        active
            .iter()
            .max_by(|(domain_a, record_a), (domain_b, record_b)| {
                let priority_a = self.config.priority_of(domain_a);
                let priority_b = self.config.priority_of(domain_b);
                priority_a
                    .cmp(&priority_b)
                    .then(record_a.started_at.cmp(&record_b.started_at))
            })
            .map(|(domain, _)| domain.clone())
            .expect("active is non-empty")
    }

    /// §4.6.2: a rejected-cascade fallback is routed to the conversation
    /// handler, carrying `_fallback_context` as an injected system message.
    async fn execute_fallback(&self, intent: &Intent, context: &Arc<UnifiedContext>) -> IntentResult {
        if !self.llm_enabled {
            return IntentResult::ok(intent.name.clone(), "I didn't understand that.");
        }

        if let Some(Value::Map(fallback_context)) = intent.metadata.get("_fallback_context") {
            context.push_handler_message(
                CONVERSATION_DOMAIN,
                "system",
                describe_fallback_context(fallback_context),
            );
        }

        self.dispatch(intent, context).await
    }

    async fn dispatch(&self, intent: &Intent, context: &Arc<UnifiedContext>) -> IntentResult {
        let Some((domain, handler)) = self.registry.resolve(&intent.name) else {
            TraceEvent::IntentDispatched {
                session_id: context.session_id().to_owned(),
                intent_name: intent.name.clone(),
                handler_domain: String::new(),
                success: false,
            }
            .emit();
            return IntentResult::failed(intent.name.clone(), format!("no handler registered for '{}'", intent.name));
        };

        if !self.config.handlers.is_enabled(domain) {
            TraceEvent::IntentDispatched {
                session_id: context.session_id().to_owned(),
                intent_name: intent.name.clone(),
                handler_domain: domain.to_owned(),
                success: false,
            }
            .emit();
            return IntentResult::failed(intent.name.clone(), format!("handler domain '{domain}' is disabled"));
        }

        let result = handler.execute(intent, context).await;
        TraceEvent::IntentDispatched {
            session_id: context.session_id().to_owned(),
            intent_name: intent.name.clone(),
            handler_domain: domain.to_owned(),
            success: result.success,
        }
        .emit();
        result
    }
}

fn is_fallback(intent: &Intent) -> bool {
    matches!(
        intent.metadata.get("_recognition_provider"),
        Some(Value::String(p)) if p == "fallback"
    )
}

fn describe_fallback_context(fallback_context: &std::collections::HashMap<String, Value>) -> String {
    let best_intent = fallback_context
        .get("best_rejected_intent")
        .and_then(Value::as_str)
        .unwrap_or("none");
    let original_text = fallback_context
        .get("original_text")
        .and_then(Value::as_str)
        .unwrap_or("");
    format!(
        "The user said \"{original_text}\" which could not be confidently matched to an intent. \
         The closest rejected candidate was '{best_intent}'."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use async_trait::async_trait;
    use va_domain::config::ContextConfig;

    struct Recorder(&'static str);
    #[async_trait]
    impl Handler for Recorder {
        async fn execute(&self, intent: &Intent, _context: &Arc<UnifiedContext>) -> IntentResult {
            IntentResult::ok(intent.name.clone(), format!("{}:{}", self.0, intent.name))
        }
    }

    fn ctx() -> Arc<UnifiedContext> {
        Arc::new(UnifiedContext::new("kitchen_session", ContextConfig::default()))
    }

    #[tokio::test]
    async fn contextual_with_no_active_actions_says_nothing_active() {
        let registry = HandlerRegistry::new();
        let orchestrator = IntentOrchestrator::new(registry, IntentsConfig::default(), true);
        let context = ctx();
        let intent = Intent::new("contextual.stop", "stop", "kitchen_session");
        let result = orchestrator.execute(&intent, &context).await;
        assert!(result.should_speak);
        assert_eq!(result.text.as_deref(), Some("Nothing is currently active."));
    }

    #[tokio::test]
    async fn contextual_with_one_active_action_binds_to_its_domain() {
        let mut registry = HandlerRegistry::new();
        registry.register("timers", "timers.*", Arc::new(Recorder("timers")));
        let orchestrator = IntentOrchestrator::new(registry, IntentsConfig::default(), true);
        let context = ctx();
        context.start_action("timers", "set_timer", "t1").unwrap();

        let intent = Intent::new("contextual.stop", "stop it", "kitchen_session");
        let result = orchestrator.execute(&intent, &context).await;
        assert_eq!(result.text.as_deref(), Some("timers:timers.stop"));
    }

    #[tokio::test]
    async fn contextual_with_multiple_actions_prefers_higher_priority_domain() {
        let mut registry = HandlerRegistry::new();
        registry.register("timers", "timers.*", Arc::new(Recorder("timers")));
        registry.register("music", "music.*", Arc::new(Recorder("music")));

        let mut config = IntentsConfig::default();
        config.domain_priority.insert("music".to_owned(), 10);
        config.domain_priority.insert("timers".to_owned(), 1);

        let orchestrator = IntentOrchestrator::new(registry, config, true);
        let context = ctx();
        context.start_action("timers", "set_timer", "t1").unwrap();
        context.start_action("music", "play", "t2").unwrap();

        let intent = Intent::new("contextual.stop", "stop", "kitchen_session");
        let result = orchestrator.execute(&intent, &context).await;
        assert_eq!(result.text.as_deref(), Some("music:music.stop"));
    }

    #[tokio::test]
    async fn contextual_with_equal_priority_prefers_most_recently_started() {
        let mut registry = HandlerRegistry::new();
        registry.register("timers", "timers.*", Arc::new(Recorder("timers")));
        registry.register("music", "music.*", Arc::new(Recorder("music")));

        let orchestrator = IntentOrchestrator::new(registry, IntentsConfig::default(), true);
        let context = ctx();
        context.start_action("timers", "set_timer", "t1").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        context.start_action("music", "play", "t2").unwrap();

        let intent = Intent::new("contextual.stop", "stop", "kitchen_session");
        let result = orchestrator.execute(&intent, &context).await;
        assert_eq!(result.text.as_deref(), Some("music:music.stop"));
    }

    #[tokio::test]
    async fn unresolved_intent_without_handler_fails() {
        let registry = HandlerRegistry::new();
        let orchestrator = IntentOrchestrator::new(registry, IntentsConfig::default(), true);
        let context = ctx();
        let intent = Intent::new("weather.get", "what's the weather", "kitchen_session");
        let result = orchestrator.execute(&intent, &context).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn fallback_intent_injects_system_message_before_dispatch() {
        let mut registry = HandlerRegistry::new();
        registry.register(CONVERSATION_DOMAIN, "conversation.*", Arc::new(Recorder("conversation")));
        let orchestrator = IntentOrchestrator::new(registry, IntentsConfig::default(), true);
        let context = ctx();

        let mut intent = Intent::fallback("what a nice day", "kitchen_session");
        intent
            .metadata
            .insert("_recognition_provider".to_owned(), Value::String("fallback".to_owned()));
        let mut fallback_ctx = std::collections::HashMap::new();
        fallback_ctx.insert("original_text".to_owned(), Value::String("what a nice day".to_owned()));
        intent
            .metadata
            .insert("_fallback_context".to_owned(), Value::Map(fallback_ctx));

        orchestrator.execute(&intent, &context).await;
        let hc = context.handler_context(CONVERSATION_DOMAIN);
        assert_eq!(hc.messages.len(), 1);
        assert_eq!(hc.messages[0].role, "system");
    }
}
