//! An immutable, queryable view over a loaded set of donation documents.

use std::collections::HashMap;

use crate::types::{HandlerDonation, MethodDonation, TokenPattern};

/// All donations flattened into lookup tables keyed the way the NLU
/// cascade and intent orchestrator need them.
#[derive(Debug, Default, Clone)]
pub struct DonationSnapshot {
    pub by_intent_name: HashMap<String, MethodDonation>,
    pub by_domain: HashMap<String, Vec<MethodDonation>>,
    pub negative_patterns: Vec<TokenPattern>,
}

impl DonationSnapshot {
    pub fn build(donations: Vec<HandlerDonation>) -> Self {
        let mut snapshot = DonationSnapshot::default();
        for donation in donations {
            for pattern in &donation.negative_patterns {
                snapshot.negative_patterns.push(pattern.clone());
            }
            for mut method in donation.method_donations {
                // Global parameters apply to every method of the handler
                // unless the method already declares a parameter of the
                // same name.
                for global in &donation.global_parameters {
                    if !method.parameters.iter().any(|p| p.name == global.name) {
                        method.parameters.push(global.clone());
                    }
                }
                snapshot
                    .by_domain
                    .entry(donation.handler_domain.clone())
                    .or_default()
                    .push(method.clone());
                snapshot
                    .by_intent_name
                    .insert(method.full_intent_name.clone(), method);
            }
        }
        snapshot
    }

    pub fn method_by_intent(&self, intent_name: &str) -> Option<&MethodDonation> {
        self.by_intent_name.get(intent_name)
    }

    pub fn methods_for_domain(&self, domain: &str) -> &[MethodDonation] {
        self.by_domain.get(domain).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn all_methods(&self) -> impl Iterator<Item = &MethodDonation> {
        self.by_intent_name.values()
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.by_domain.keys().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ParameterSpec, ParameterType, SUPPORTED_SCHEMA_VERSION};

    fn donation_with_global_param() -> HandlerDonation {
        HandlerDonation {
            schema_version: SUPPORTED_SCHEMA_VERSION.to_owned(),
            handler_domain: "timers".to_owned(),
            global_parameters: vec![ParameterSpec {
                name: "room".to_owned(),
                param_type: ParameterType::String,
                required: false,
                default_value: None,
                description: None,
                choices: None,
                min_value: None,
                max_value: None,
                pattern: None,
                extraction_patterns: vec![],
                aliases: vec![],
            }],
            method_donations: vec![MethodDonation {
                method_name: "set_timer".to_owned(),
                intent_suffix: "set".to_owned(),
                phrases: vec!["set a timer".to_owned()],
                lemmas: vec![],
                parameters: vec![],
                token_patterns: vec![],
                slot_patterns: Default::default(),
                examples: vec![],
                boost: 1.0,
                full_intent_name: "timers.set".to_owned(),
                handler_domain: "timers".to_owned(),
            }],
            negative_patterns: vec![],
        }
    }

    #[test]
    fn global_parameters_are_merged_into_each_method() {
        let snapshot = DonationSnapshot::build(vec![donation_with_global_param()]);
        let method = snapshot.method_by_intent("timers.set").unwrap();
        assert!(method.parameters.iter().any(|p| p.name == "room"));
    }

    #[test]
    fn by_domain_groups_methods() {
        let snapshot = DonationSnapshot::build(vec![donation_with_global_param()]);
        assert_eq!(snapshot.methods_for_domain("timers").len(), 1);
        assert!(snapshot.methods_for_domain("weather").is_empty());
    }
}
