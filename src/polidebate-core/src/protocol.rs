//! Wire protocol between the categorizer and the completion endpoint.
//!
//! Model replies are loosely formatted JSON, sometimes wrapped in a Markdown
//! fence. This module is the only place that knows about the reserved
//! sentinel strings; everything past it works with typed results.

use serde_json::Value;
use std::collections::HashMap;

use crate::error::PolidebateError;

/// Assignment sentinel: the article is foreign local politics and is dropped.
pub const FILTER_OUT: &str = "FILTER_OUT";
/// Recollection sentinel: no surviving category fits the article.
pub const NONE: &str = "NONE";
/// Pre-filter verdict for articles that stay.
pub const KEEP: &str = "KEEP";

const FENCE: &str = "```";

/// Outcome of assigning one article in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// The model named a category (not necessarily a known one).
    Assigned(String),
    /// The model returned the filter sentinel.
    Filtered,
    /// No usable answer for this position.
    Unassignable,
}

/// Decoded reply of the combined recollect + rename call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombinedReply {
    pub recategorizations: Vec<Option<String>>,
    pub renames: HashMap<String, String>,
}

/// Strip an optional code fence from a raw reply and parse it as JSON.
///
/// The body normally ends at the first closing fence. When that cut does not
/// parse (a string value may itself contain a fence), the last one is tried.
pub fn decode_json(raw: &str) -> Result<Value, PolidebateError> {
    let text = raw.trim();
    let Some(fenced) = text.strip_prefix(FENCE) else {
        return Ok(serde_json::from_str(text)?);
    };
    let body = fenced.strip_prefix("json").unwrap_or(fenced);

    let first = body.find(FENCE).map_or(body, |end| &body[..end]);
    match serde_json::from_str(first.trim()) {
        Ok(value) => Ok(value),
        Err(err) => {
            let last = body.rfind(FENCE).map_or(body, |end| &body[..end]);
            if last.len() == first.len() {
                return Err(err.into());
            }
            Ok(serde_json::from_str(last.trim())?)
        }
    }
}

/// `{"1": "Category", "2": "FILTER_OUT", ...}` keyed by 1-based position.
pub fn decode_assignments(value: &Value, len: usize) -> Result<Vec<Assignment>, PolidebateError> {
    let object = value
        .as_object()
        .ok_or_else(|| shape("assignment reply is not a JSON object", value))?;

    Ok((1..=len)
        .map(|position| match object.get(&position.to_string()) {
            Some(Value::String(name)) if name == FILTER_OUT => Assignment::Filtered,
            Some(Value::String(name)) => Assignment::Assigned(name.clone()),
            _ => Assignment::Unassignable,
        })
        .collect())
}

/// `["Category", "NONE", ...]` aligned with the batch.
pub fn decode_recategorizations(
    value: &Value,
    len: usize,
) -> Result<Vec<Option<String>>, PolidebateError> {
    let items = positional(value, len, "recategorization")?;
    Ok(items.iter().map(category_or_none).collect())
}

/// `[true, false, ...]` aligned with the batch.
pub fn decode_relevance(value: &Value, len: usize) -> Result<Vec<bool>, PolidebateError> {
    positional(value, len, "relevance")?
        .iter()
        .map(|item| {
            item.as_bool()
                .ok_or_else(|| shape("relevance entry is not a boolean", item))
        })
        .collect()
}

/// `{"Old": "New", ...}`; entries whose value is not a string are ignored.
pub fn decode_renames(value: &Value) -> Result<HashMap<String, String>, PolidebateError> {
    let object = value
        .as_object()
        .ok_or_else(|| shape("rename reply is not a JSON object", value))?;

    Ok(object
        .iter()
        .filter_map(|(old, new)| new.as_str().map(|new| (old.clone(), new.to_string())))
        .collect())
}

/// `["Category 1", "Category 2", ...]`; non-string entries are stringified.
pub fn decode_category_list(value: &Value) -> Result<Vec<String>, PolidebateError> {
    let items = value
        .as_array()
        .ok_or_else(|| shape("category reply is not a JSON array", value))?;
    if items.is_empty() {
        return Err(PolidebateError::Shape("category reply is empty".to_string()));
    }

    Ok(items
        .iter()
        .map(|item| match item {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect())
}

/// `{"recategorizations": [...], "renames": {...}}`.
///
/// A malformed `recategorizations` array discards the whole batch; a missing
/// or malformed `renames` object means no renames.
pub fn decode_combined(value: &Value, len: usize) -> Result<CombinedReply, PolidebateError> {
    let object = value
        .as_object()
        .ok_or_else(|| shape("combined reply is not a JSON object", value))?;

    let recategorizations = object
        .get("recategorizations")
        .and_then(|v| decode_recategorizations(v, len).ok())
        .unwrap_or_else(|| {
            tracing::warn!(batch = len, "unexpected recategorization format, discarding batch");
            vec![None; len]
        });
    let renames = object
        .get("renames")
        .and_then(|v| decode_renames(v).ok())
        .unwrap_or_default();

    Ok(CombinedReply {
        recategorizations,
        renames,
    })
}

/// `["KEEP", "FILTER_OUT", ...]`; anything but the filter sentinel keeps the article.
pub fn decode_keep_flags(value: &Value, len: usize) -> Result<Vec<bool>, PolidebateError> {
    Ok(positional(value, len, "pre-filter")?
        .iter()
        .map(|item| item.as_str() != Some(FILTER_OUT))
        .collect())
}

fn positional<'a>(
    value: &'a Value,
    len: usize,
    what: &str,
) -> Result<&'a Vec<Value>, PolidebateError> {
    let items = value
        .as_array()
        .ok_or_else(|| shape(&format!("{what} reply is not a JSON array"), value))?;
    if items.len() != len {
        return Err(PolidebateError::Shape(format!(
            "{what} reply has {} entries for a batch of {len}",
            items.len()
        )));
    }
    Ok(items)
}

fn category_or_none(item: &Value) -> Option<String> {
    match item.as_str() {
        Some(name) if name.eq_ignore_ascii_case(NONE) => None,
        Some(name) => Some(name.to_string()),
        None => None,
    }
}

fn shape(message: &str, value: &Value) -> PolidebateError {
    let mut rendered = value.to_string();
    if rendered.len() > 120 {
        let cut = (0..=120).rev().find(|&i| rendered.is_char_boundary(i)).unwrap_or(0);
        rendered.truncate(cut);
        rendered.push('…');
    }
    PolidebateError::Shape(format!("{message}: {rendered}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_plain_json() {
        assert_eq!(decode_json("  [\"a\", \"b\"] \n").unwrap(), json!(["a", "b"]));
    }

    #[test]
    fn test_decode_fenced_json_with_tag() {
        let value = json!({"topic": "Tariffs", "n": [1, 2.5, null, true]});
        let raw = format!("```json\n{}\n```", serde_json::to_string(&value).unwrap());
        assert_eq!(decode_json(&raw).unwrap(), value);
    }

    #[test]
    fn test_decode_fence_inside_string_value() {
        let value = json!({"note": "use ```json blocks``` please"});
        let raw = format!("```json\n{}\n```", serde_json::to_string(&value).unwrap());
        assert_eq!(decode_json(&raw).unwrap(), value);
    }

    #[test]
    fn test_decode_fenced_json_without_tag() {
        assert_eq!(decode_json("```\n{\"1\": \"X\"}\n```").unwrap(), json!({"1": "X"}));
    }

    #[test]
    fn test_decode_ignores_text_after_closing_fence() {
        let raw = "```json\n[true]\n```\nHope this helps!";
        assert_eq!(decode_json(raw).unwrap(), json!([true]));
    }

    #[test]
    fn test_decode_invalid_is_decode_error() {
        let err = decode_json("Sure! Here are the categories.").unwrap_err();
        assert!(matches!(err, PolidebateError::Decode(_)));
    }

    #[test]
    fn test_assignments_map_sentinel_and_missing_keys() {
        let value = json!({"1": "Trade Policy", "2": "FILTER_OUT", "4": 7});
        let decoded = decode_assignments(&value, 4).unwrap();
        assert_eq!(
            decoded,
            vec![
                Assignment::Assigned("Trade Policy".to_string()),
                Assignment::Filtered,
                Assignment::Unassignable,
                Assignment::Unassignable,
            ]
        );
    }

    #[test]
    fn test_assignments_require_object() {
        let err = decode_assignments(&json!(["Trade Policy"]), 1).unwrap_err();
        assert!(matches!(err, PolidebateError::Shape(_)));
    }

    #[test]
    fn test_recategorizations_none_is_case_insensitive() {
        let value = json!(["Healthcare", "none", "NONE", 3]);
        assert_eq!(
            decode_recategorizations(&value, 4).unwrap(),
            vec![Some("Healthcare".to_string()), None, None, None]
        );
    }

    #[test]
    fn test_recategorizations_length_mismatch_is_shape_error() {
        let err = decode_recategorizations(&json!(["Healthcare"]), 2).unwrap_err();
        assert!(matches!(err, PolidebateError::Shape(_)));
    }

    #[test]
    fn test_relevance_requires_booleans_of_batch_length() {
        assert_eq!(
            decode_relevance(&json!([true, false]), 2).unwrap(),
            vec![true, false]
        );
        assert!(decode_relevance(&json!([true]), 2).is_err());
        assert!(decode_relevance(&json!(["true", false]), 2).is_err());
    }

    #[test]
    fn test_renames_skip_non_string_values() {
        let renames = decode_renames(&json!({"A": "Alpha", "B": null})).unwrap();
        assert_eq!(renames.len(), 1);
        assert_eq!(renames["A"], "Alpha");
    }

    #[test]
    fn test_category_list_stringifies_and_rejects_empty() {
        assert_eq!(
            decode_category_list(&json!(["Elections", 2024])).unwrap(),
            vec!["Elections".to_string(), "2024".to_string()]
        );
        assert!(decode_category_list(&json!([])).is_err());
        assert!(decode_category_list(&json!({"a": 1})).is_err());
    }

    #[test]
    fn test_combined_tolerates_bad_halves() {
        let reply = decode_combined(
            &json!({"recategorizations": ["A"], "renames": {"A": "Alpha"}}),
            2,
        )
        .unwrap();
        assert_eq!(reply.recategorizations, vec![None, None]);
        assert_eq!(reply.renames["A"], "Alpha");

        let reply = decode_combined(&json!({"recategorizations": ["A", "NONE"]}), 2).unwrap();
        assert_eq!(reply.recategorizations, vec![Some("A".to_string()), None]);
        assert!(reply.renames.is_empty());
    }

    #[test]
    fn test_keep_flags() {
        assert_eq!(
            decode_keep_flags(&json!(["KEEP", "FILTER_OUT", "keep"]), 3).unwrap(),
            vec![true, false, true]
        );
    }

    mod round_trip {
        use crate::protocol::decode_json;
        use proptest::prelude::*;
        use serde_json::Value;

        fn json_string() -> impl Strategy<Value = String> {
            prop_oneof![any::<String>(), "[a-z` \"\\\\\n]{0,16}"]
        }

        fn json_value() -> impl Strategy<Value = Value> {
            let leaf = prop_oneof![
                Just(Value::Null),
                any::<bool>().prop_map(Value::Bool),
                any::<i64>().prop_map(Value::from),
                (-1_000_000i64..1_000_000).prop_map(|n| Value::from(n as f64 / 8.0)),
                json_string().prop_map(Value::String),
            ];
            leaf.prop_recursive(4, 64, 8, |inner| {
                prop_oneof![
                    proptest::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
                    proptest::collection::btree_map(json_string(), inner, 0..8)
                        .prop_map(|map| Value::Object(map.into_iter().collect())),
                ]
            })
        }

        proptest! {
            #[test]
            fn fenced_json_decodes_to_the_original_value(value in json_value()) {
                let raw = format!("```json\n{}\n```", serde_json::to_string(&value).unwrap());
                prop_assert_eq!(decode_json(&raw).unwrap(), value);
            }
        }
    }
}
