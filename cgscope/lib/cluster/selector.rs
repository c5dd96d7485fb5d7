use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Renders a label selector in the string syntax accepted by list calls.
///
/// Returns `None` for a missing or empty selector, which would otherwise match every pod.
pub fn selector_string(selector: Option<&LabelSelector>) -> Option<String> {
    let selector = selector?;

    let mut terms = match_labels_terms(selector.match_labels.as_ref());
    for requirement in selector.match_expressions.iter().flatten() {
        if let Some(term) = expression_term(requirement) {
            terms.push(term);
        }
    }

    join_terms(terms)
}

/// Renders an equality-only selector, as used by DeploymentConfigs.
pub fn match_labels_string(labels: Option<&BTreeMap<String, String>>) -> Option<String> {
    join_terms(match_labels_terms(labels))
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn match_labels_terms(labels: Option<&BTreeMap<String, String>>) -> Vec<String> {
    labels
        .into_iter()
        .flatten()
        .map(|(key, value)| format!("{key}={value}"))
        .collect()
}

fn expression_term(requirement: &LabelSelectorRequirement) -> Option<String> {
    let key = &requirement.key;
    let values = requirement
        .values
        .as_deref()
        .unwrap_or_default()
        .join(",");

    match requirement.operator.as_str() {
        "In" => Some(format!("{key} in ({values})")),
        "NotIn" => Some(format!("{key} notin ({values})")),
        "Exists" => Some(key.clone()),
        "DoesNotExist" => Some(format!("!{key}")),
        other => {
            tracing::warn!("ignoring unknown selector operator {other} on key {key}");
            None
        }
    }
}

fn join_terms(terms: Vec<String>) -> Option<String> {
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(","))
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
