//! Label selector matching shared by every engine

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use std::collections::BTreeMap;

/// AND of all key=value pairs. An empty selector matches every label set.
pub fn matches_map(selector: &BTreeMap<String, String>, labels: Option<&BTreeMap<String, String>>) -> bool {
    selector
        .iter()
        .all(|(k, v)| labels.and_then(|l| l.get(k)) == Some(v))
}

/// Full `LabelSelector` semantics: matchLabels AND matchExpressions.
///
/// An empty selector (no labels, no expressions) selects everything, as it
/// does for NetworkPolicy podSelector.
pub fn matches_label_selector(selector: &LabelSelector, labels: Option<&BTreeMap<String, String>>) -> bool {
    if let Some(match_labels) = &selector.match_labels {
        if !matches_map(match_labels, labels) {
            return false;
        }
    }

    let value_of = |key: &str| labels.and_then(|l| l.get(key));
    if let Some(exprs) = &selector.match_expressions {
        for expr in exprs {
            let values = expr.values.as_deref().unwrap_or(&[]);
            let actual = value_of(&expr.key);
            let ok = match expr.operator.as_str() {
                "In" => actual.map(|v| values.contains(v)).unwrap_or(false),
                "NotIn" => actual.map(|v| !values.contains(v)).unwrap_or(true),
                "Exists" => actual.is_some(),
                "DoesNotExist" => actual.is_none(),
                _ => false,
            };
            if !ok {
                return false;
            }
        }
    }
    true
}

pub fn is_empty_selector(selector: &LabelSelector) -> bool {
    selector.match_labels.as_ref().map_or(true, |m| m.is_empty())
        && selector.match_expressions.as_ref().map_or(true, |e| e.is_empty())
}

/// Equality selector string for list calls, `k=v,k2=v2`
pub fn to_query(selector: &BTreeMap<String, String>) -> String {
    selector
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse an equality selector string back into pairs; terms without `=` are skipped
pub fn parse_query(query: &str) -> BTreeMap<String, String> {
    query
        .split(',')
        .filter_map(|term| {
            let (k, v) = term.split_once('=')?;
            let k = k.trim().trim_end_matches('=');
            let v = v.trim().trim_start_matches('=');
            if k.is_empty() {
                None
            } else {
                Some((k.to_string(), v.to_string()))
            }
        })
        .collect()
}

/// Human readable selector, `<all pods>` when empty
pub fn describe(selector: &LabelSelector) -> String {
    if is_empty_selector(selector) {
        return "<all pods>".to_string();
    }
    let mut parts = Vec::new();
    if let Some(labels) = &selector.match_labels {
        parts.extend(labels.iter().map(|(k, v)| format!("{}={}", k, v)));
    }
    if let Some(exprs) = &selector.match_expressions {
        for e in exprs {
            let values = e.values.clone().unwrap_or_default().join(",");
            let part = match e.operator.as_str() {
                "Exists" => e.key.clone(),
                "DoesNotExist" => format!("!{}", e.key),
                "NotIn" => format!("{} notin ({})", e.key, values),
                _ => format!("{} in ({})", e.key, values),
            };
            parts.push(part);
        }
    }
    parts.join(",")
}
