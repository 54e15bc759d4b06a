//! Question schema — the single slot/field/key mapping table
//!
//! Three naming schemes meet here:
//! - internal answer keys used by the chat front end (`q7_history`, ...)
//! - record store column labels (`Q7 Business History`, ...)
//! - CRM custom-field keys, which drift between deployments (trailing
//!   underscores, truncated labels), so every slot declares a primary key
//!   and one fallback key
//!
//! Both propagation paths consume this table; nothing else hardcodes a
//! field name. Deployments with diverged CRM key lists override the whole
//! table via `QUESTION_SCHEMA_FILE` (JSON array of slots).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{GatewayError, Result};

/// Sentinel written into any answer slot the submission left empty
pub const NO_RESPONSE: &str = "No response";

/// One positional answer slot (Q7 onward)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSlot {
    /// Zero-based slot index
    pub index: usize,
    /// Internal answer key used by the chat front end
    pub answer_key: String,
    /// Record store column label (exact external name)
    pub store_field: String,
    /// CRM custom-field key tried first
    pub crm_key: String,
    /// CRM custom-field key tried when the primary is rejected
    pub crm_key_fallback: String,
}

/// Survey answers as posted by the front end: positional or named
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AnswerInput {
    Positional(Vec<String>),
    Named(HashMap<String, String>),
}

impl Default for AnswerInput {
    fn default() -> Self {
        AnswerInput::Positional(Vec::new())
    }
}

/// Ordered, fixed-width question schema
#[derive(Debug, Clone)]
pub struct QuestionSchema {
    slots: Vec<QuestionSlot>,
}

impl QuestionSchema {
    /// Built-in default table: Q7..Q30, 24 slots
    pub fn default_slots() -> Vec<QuestionSlot> {
        DEFAULT_SLOTS
            .iter()
            .enumerate()
            .map(|(index, (answer_key, store_field, crm_key, crm_fallback))| QuestionSlot {
                index,
                answer_key: (*answer_key).to_string(),
                store_field: (*store_field).to_string(),
                crm_key: (*crm_key).to_string(),
                crm_key_fallback: (*crm_fallback).to_string(),
            })
            .collect()
    }

    /// Schema with the built-in defaults resized to `slot_count`
    pub fn with_defaults(slot_count: usize) -> Self {
        let mut schema = Self {
            slots: Self::default_slots(),
        };
        schema.resize(slot_count);
        schema
    }

    /// Load a deployment-specific schema from a JSON file, resized to
    /// `slot_count`. The file holds a JSON array of slots.
    pub fn from_file(path: &str, slot_count: usize) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!("Failed to read schema file {}: {}", path, e))
        })?;
        let mut slots: Vec<QuestionSlot> = serde_json::from_str(&raw).map_err(|e| {
            GatewayError::Config(format!("Failed to parse schema file {}: {}", path, e))
        })?;

        // Indices follow file order regardless of what the file claims
        for (i, slot) in slots.iter_mut().enumerate() {
            slot.index = i;
        }

        let mut schema = Self { slots };
        schema.resize(slot_count);
        Ok(schema)
    }

    /// Resize to exactly `slot_count` slots, synthesizing generic trailing
    /// slots when the table is shorter than the configured width
    fn resize(&mut self, slot_count: usize) {
        self.slots.truncate(slot_count);
        while self.slots.len() < slot_count {
            let index = self.slots.len();
            let question_number = index + 7; // slot 0 is Q7
            self.slots.push(QuestionSlot {
                index,
                answer_key: format!("q{}_extra", question_number),
                store_field: format!("Q{} Extra", question_number),
                crm_key: format!("dd_q{}_extra", question_number),
                crm_key_fallback: format!("dd_q{}_extra_", question_number),
            });
        }
    }

    /// Number of answer slots
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Ordered slots
    pub fn slots(&self) -> &[QuestionSlot] {
        &self.slots
    }

    /// Coerce submitted answers to exactly `slot_count` entries.
    ///
    /// Positional input is truncated or right-padded with the sentinel.
    /// Named input resolves each slot via its answer key; missing or blank
    /// values become the sentinel. No partial-answer state survives this.
    pub fn normalize(&self, input: &AnswerInput) -> Vec<String> {
        match input {
            AnswerInput::Positional(values) => self
                .slots
                .iter()
                .map(|slot| {
                    values
                        .get(slot.index)
                        .map(|v| v.trim())
                        .filter(|v| !v.is_empty())
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| NO_RESPONSE.to_string())
                })
                .collect(),
            AnswerInput::Named(map) => self
                .slots
                .iter()
                .map(|slot| {
                    map.get(&slot.answer_key)
                        .map(|v| v.trim())
                        .filter(|v| !v.is_empty())
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| NO_RESPONSE.to_string())
                })
                .collect(),
        }
    }
}

/// (answer_key, store_field, crm_key, crm_key_fallback) for Q7..Q30
///
/// The fallback keys reproduce the historical drift observed across CRM
/// deployments: trailing underscores and truncated labels.
const DEFAULT_SLOTS: &[(&str, &str, &str, &str)] = &[
    ("q7_history", "Q7 Business History", "dd_q7_business_history", "dd_q7_business_history_"),
    ("q8_goal_style", "Q8 Goal Style", "dd_q8_goal_style", "dd_q8_goal_style_"),
    ("q9_obstacles", "Q9 Past Obstacles", "dd_q9_past_obstacles", "dd_q9_obstacles"),
    ("q10_personal_wins", "Q10 Personal Wins", "dd_q10_personal_wins", "dd_q10_wins"),
    ("q11_ideal_coach", "Q11 Ideal Coach", "dd_q11_ideal_coach", "dd_q11_ideal_coach_"),
    ("q12_online_presence", "Q12 Online Presence", "dd_q12_online_presence", "dd_q12_online_presence_"),
    ("q13_best_phone", "Q13 Best Phone", "dd_q13_best_phone", "dd_q13_phone"),
    ("q14_best_email", "Q14 Best Email", "dd_q14_best_email", "dd_q14_email"),
    ("q15_weekly_hours", "Q15 Weekly Hours", "dd_q15_weekly_hours", "dd_q15_hours"),
    ("q16_income_target", "Q16 Income Target", "dd_q16_income_target", "dd_q16_income_target_"),
    ("q17_why_now", "Q17 Why Now", "dd_q17_why_now", "dd_q17_why_now_"),
    ("q18_support_system", "Q18 Support System", "dd_q18_support_system", "dd_q18_support"),
    ("q19_past_programs", "Q19 Past Programs", "dd_q19_past_programs", "dd_q19_programs"),
    ("q20_learning_style", "Q20 Learning Style", "dd_q20_learning_style", "dd_q20_learning_style_"),
    ("q21_biggest_fear", "Q21 Biggest Fear", "dd_q21_biggest_fear", "dd_q21_fear"),
    ("q22_dream_outcome", "Q22 Dream Outcome", "dd_q22_dream_outcome", "dd_q22_outcome"),
    ("q23_current_routine", "Q23 Current Routine", "dd_q23_current_routine", "dd_q23_routine"),
    ("q24_health_goals", "Q24 Health Goals", "dd_q24_health_goals", "dd_q24_health_goals_"),
    ("q25_social_comfort", "Q25 Social Comfort", "dd_q25_social_comfort", "dd_q25_social"),
    ("q26_tech_comfort", "Q26 Tech Comfort", "dd_q26_tech_comfort", "dd_q26_tech"),
    ("q27_budget_range", "Q27 Budget Range", "dd_q27_budget_range", "dd_q27_budget"),
    ("q28_decision_maker", "Q28 Decision Maker", "dd_q28_decision_maker", "dd_q28_decision"),
    ("q29_start_timeline", "Q29 Start Timeline", "dd_q29_start_timeline", "dd_q29_timeline"),
    ("q30_anything_else", "Q30 Anything Else", "dd_q30_anything_else", "dd_q30_notes"),
];
