//! Donation validation (§4.4), fatal on failure in strict mode.

use std::collections::HashSet;

use crate::dsl;
use crate::types::{HandlerDonation, ParameterType, SUPPORTED_SCHEMA_VERSION};

/// Capability a handler exposes: "does this handler have a method named X".
/// Implemented by the handler registry; injected here to keep this crate
/// a leaf with no dependency on the intent-dispatch layer.
pub trait HandlerCapabilities {
    fn has_method(&self, handler_domain: &str, method_name: &str) -> bool;
}

/// A registry that knows about no handlers; every method lookup fails.
/// Useful for tests and for non-strict loading where method presence is
/// not checked.
pub struct NoHandlers;

impl HandlerCapabilities for NoHandlers {
    fn has_method(&self, _handler_domain: &str, _method_name: &str) -> bool {
        false
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("unsupported schema_version '{0}', expected '{SUPPORTED_SCHEMA_VERSION}'")]
    UnsupportedSchemaVersion(String),
    #[error("duplicate method_name '{0}' in handler '{1}'")]
    DuplicateMethodName(String, String),
    #[error("duplicate intent_suffix '{0}' in handler '{1}'")]
    DuplicateIntentSuffix(String, String),
    #[error("parameter '{0}' has type 'choice' but no choices list")]
    ChoicesMissing(String),
    #[error("parameter '{0}' has a choices list but type is not 'choice'")]
    ChoicesOnNonChoice(String),
    #[error("parameter '{0}' sets min/max_value but is not a numeric type")]
    RangeOnNonNumeric(String),
    #[error("method '{method}' references handler method '{referenced}' which the handler '{handler}' does not expose")]
    MissingHandlerMethod {
        handler: String,
        method: String,
        referenced: String,
    },
    #[error("token_pattern in method '{method}' failed to compile: {source}")]
    PatternCompile {
        method: String,
        #[source]
        source: dsl::DslError,
    },
    #[error("slot_pattern '{slot}' in method '{method}' failed to compile: {source}")]
    SlotPatternCompile {
        method: String,
        slot: String,
        #[source]
        source: dsl::DslError,
    },
}

/// Run all §4.4 checks against a parsed donation document.
pub fn validate(
    donation: &HandlerDonation,
    handlers: &dyn HandlerCapabilities,
) -> Result<(), ValidationError> {
    if donation.schema_version != SUPPORTED_SCHEMA_VERSION {
        return Err(ValidationError::UnsupportedSchemaVersion(
            donation.schema_version.clone(),
        ));
    }

    let mut seen_methods = HashSet::new();
    let mut seen_suffixes = HashSet::new();

    for method in &donation.method_donations {
        if !seen_methods.insert(method.method_name.clone()) {
            return Err(ValidationError::DuplicateMethodName(
                method.method_name.clone(),
                donation.handler_domain.clone(),
            ));
        }
        if !seen_suffixes.insert(method.intent_suffix.clone()) {
            return Err(ValidationError::DuplicateIntentSuffix(
                method.intent_suffix.clone(),
                donation.handler_domain.clone(),
            ));
        }

        for param in method.parameters.iter().chain(&donation.global_parameters) {
            let is_choice = param.param_type == ParameterType::Choice;
            if is_choice && param.choices.is_none() {
                return Err(ValidationError::ChoicesMissing(param.name.clone()));
            }
            if !is_choice && param.choices.is_some() {
                return Err(ValidationError::ChoicesOnNonChoice(param.name.clone()));
            }
            let numeric = matches!(
                param.param_type,
                ParameterType::Integer | ParameterType::Float
            );
            if !numeric && (param.min_value.is_some() || param.max_value.is_some()) {
                return Err(ValidationError::RangeOnNonNumeric(param.name.clone()));
            }
        }

        if !handlers.has_method(&donation.handler_domain, &method.method_name) {
            return Err(ValidationError::MissingHandlerMethod {
                handler: donation.handler_domain.clone(),
                method: method.method_name.clone(),
                referenced: method.method_name.clone(),
            });
        }

        for pattern in &method.token_patterns {
            dsl::compile_pattern(pattern).map_err(|source| ValidationError::PatternCompile {
                method: method.method_name.clone(),
                source,
            })?;
        }
        for (slot, pattern) in &method.slot_patterns {
            dsl::compile_pattern(pattern).map_err(|source| ValidationError::SlotPatternCompile {
                method: method.method_name.clone(),
                slot: slot.clone(),
                source,
            })?;
        }
    }

    for pattern in &donation.negative_patterns {
        dsl::compile_pattern(pattern).map_err(|source| ValidationError::PatternCompile {
            method: "<negative_patterns>".to_owned(),
            source,
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MethodDonation, ParameterSpec};

    struct AllowAll;
    impl HandlerCapabilities for AllowAll {
        fn has_method(&self, _h: &str, _m: &str) -> bool {
            true
        }
    }

    fn base_method(name: &str, suffix: &str) -> MethodDonation {
        MethodDonation {
            method_name: name.to_owned(),
            intent_suffix: suffix.to_owned(),
            phrases: vec!["set a timer".to_owned()],
            lemmas: vec![],
            parameters: vec![],
            token_patterns: vec![],
            slot_patterns: Default::default(),
            examples: vec![],
            boost: 1.0,
            full_intent_name: format!("timers.{suffix}"),
            handler_domain: "timers".to_owned(),
        }
    }

    fn base_donation() -> HandlerDonation {
        HandlerDonation {
            schema_version: SUPPORTED_SCHEMA_VERSION.to_owned(),
            handler_domain: "timers".to_owned(),
            global_parameters: vec![],
            method_donations: vec![base_method("set_timer", "set")],
            negative_patterns: vec![],
        }
    }

    #[test]
    fn valid_donation_passes() {
        assert!(validate(&base_donation(), &AllowAll).is_ok());
    }

    #[test]
    fn unknown_schema_version_rejected() {
        let mut d = base_donation();
        d.schema_version = "2.0".to_owned();
        assert!(validate(&d, &AllowAll).is_err());
    }

    #[test]
    fn duplicate_method_name_rejected() {
        let mut d = base_donation();
        d.method_donations.push(base_method("set_timer", "set2"));
        assert!(matches!(
            validate(&d, &AllowAll),
            Err(ValidationError::DuplicateMethodName(..))
        ));
    }

    #[test]
    fn duplicate_intent_suffix_rejected() {
        let mut d = base_donation();
        d.method_donations.push(base_method("other_method", "set"));
        assert!(matches!(
            validate(&d, &AllowAll),
            Err(ValidationError::DuplicateIntentSuffix(..))
        ));
    }

    #[test]
    fn choice_type_requires_choices_list() {
        let mut d = base_donation();
        d.method_donations[0].parameters.push(ParameterSpec {
            name: "unit".to_owned(),
            param_type: ParameterType::Choice,
            required: true,
            default_value: None,
            description: None,
            choices: None,
            min_value: None,
            max_value: None,
            pattern: None,
            extraction_patterns: vec![],
            aliases: vec![],
        });
        assert!(matches!(
            validate(&d, &AllowAll),
            Err(ValidationError::ChoicesMissing(_))
        ));
    }

    #[test]
    fn missing_handler_method_rejected() {
        struct NoneHave;
        impl HandlerCapabilities for NoneHave {
            fn has_method(&self, _h: &str, _m: &str) -> bool {
                false
            }
        }
        let d = base_donation();
        assert!(matches!(
            validate(&d, &NoneHave),
            Err(ValidationError::MissingHandlerMethod { .. })
        ));
    }
}
