//! Custom-field payload encodings
//!
//! The CRM's expected update-body shape has changed silently across API
//! revisions: singular `customField` wrapper or a plural `customFields`
//! wrapper. Each encoding is a pure function from `(key, value)` to a
//! request body; the sync loop tries an ordered list of them and stops at
//! the first 2xx. Exactly one fallback per field, so the plan holds two
//! attempts and no more.

use serde_json::{json, Value};

/// One payload shape for writing a single custom field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldEncoding {
    /// `{"customField": {key: value}}`
    Singular,
    /// `{"customFields": {key: value}}`
    Plural,
}

impl FieldEncoding {
    /// Encode one field write as a contact-update body
    pub fn encode(&self, key: &str, value: &str) -> Value {
        match self {
            FieldEncoding::Singular => json!({ "customField": { key: value } }),
            FieldEncoding::Plural => json!({ "customFields": { key: value } }),
        }
    }

    /// Short label for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldEncoding::Singular => "customField",
            FieldEncoding::Plural => "customFields",
        }
    }
}

/// One attempt in a slot's update plan: a key paired with an encoding
#[derive(Debug, Clone)]
pub struct FieldAttempt {
    pub key: String,
    pub encoding: FieldEncoding,
}

impl FieldAttempt {
    pub fn body(&self, value: &str) -> Value {
        self.encoding.encode(&self.key, value)
    }
}

/// Attempt plan for one field: primary key in the historically-correct
/// shape first, then the fallback key in the alternate shape, exactly once.
pub fn attempt_plan(primary_key: &str, fallback_key: &str) -> Vec<FieldAttempt> {
    vec![
        FieldAttempt {
            key: primary_key.to_string(),
            encoding: FieldEncoding::Singular,
        },
        FieldAttempt {
            key: fallback_key.to_string(),
            encoding: FieldEncoding::Plural,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singular_encoding() {
        let body = FieldEncoding::Singular.encode("dd_q7_business_history", "ten years");
        assert_eq!(
            body["customField"]["dd_q7_business_history"],
            Value::from("ten years")
        );
    }

    #[test]
    fn test_plural_encoding() {
        let body = FieldEncoding::Plural.encode("dd_q8_goal_style", "visionary");
        assert_eq!(body["customFields"]["dd_q8_goal_style"], Value::from("visionary"));
    }

    #[test]
    fn test_attempt_plan_shape() {
        let plan = attempt_plan("dd_q9_past_obstacles", "dd_q9_obstacles");
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].key, "dd_q9_past_obstacles");
        assert_eq!(plan[0].encoding, FieldEncoding::Singular);
        assert_eq!(plan[1].key, "dd_q9_obstacles");
        assert_eq!(plan[1].encoding, FieldEncoding::Plural);
    }

    #[test]
    fn test_encoding_is_pure() {
        let a = FieldEncoding::Plural.encode("k", "v");
        let b = FieldEncoding::Plural.encode("k", "v");
        assert_eq!(a, b);
    }
}
