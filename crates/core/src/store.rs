//! Editable value store keyed by `(node_id, input_name)`.
//!
//! The store is bound to one [`WorkflowSchema`] at a time. Keys outside
//! that schema are rejected, and binding a new schema discards stale
//! keys. Defaults are first-write-wins; explicit edits are
//! last-write-wins.
//!
//! Composite setters work copy-on-write: the new value is built on a
//! clone and swapped in with a single insert, so an entry is never
//! observed half-updated.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::StoreError;
use crate::heuristics::{
    classify_input, select_subkey, Category, CHECKPOINT_SUBKEYS, LORA_DEFAULT_SUBKEY,
    LORA_ENABLED_SUBKEY, LORA_NONE, LORA_SUBKEYS,
};
use crate::schema::{DeclaredType, WorkflowSchema};
use crate::types::ValueKey;
use crate::value::InputValue;

/// Result of a [`ValueStore::set_scalar`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarUpdate {
    Applied,
    /// The text did not parse; the stored value is unchanged.
    Skipped,
}

/// Current input values for the loaded workflow.
#[derive(Debug, Default)]
pub struct ValueStore {
    values: IndexMap<ValueKey, InputValue>,
    schema_keys: HashSet<ValueKey>,
    /// Header/widget keys: stored and never submitted or edited.
    suppressed: HashSet<ValueKey>,
    diagnostics: Diagnostics,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_diagnostics(diagnostics: Diagnostics) -> Self {
        Self {
            diagnostics,
            ..Self::default()
        }
    }

    /// Bind to `schema`: drop every key it does not contain, then seed
    /// its defaults.
    pub fn load_schema(&mut self, schema: &WorkflowSchema) {
        self.schema_keys = schema.keys().collect();
        self.suppressed = schema
            .classified_inputs()
            .filter(|(_, _, category)| *category == Category::Suppressed)
            .map(|(node, input, _)| ValueKey::new(node.id.clone(), input.name.clone()))
            .collect();
        let before = self.values.len();
        self.values.retain(|key, _| self.schema_keys.contains(key));

        tracing::debug!(
            workflow = %schema.workflow_name,
            keys = self.schema_keys.len(),
            pruned = before - self.values.len(),
            "Bound value store to schema",
        );

        self.init_defaults(schema);
    }

    /// Seed every non-null default whose entry is absent. Idempotent;
    /// never overwrites an existing value.
    pub fn init_defaults(&mut self, schema: &WorkflowSchema) {
        for node in &schema.nodes {
            for input in &node.inputs {
                let Some(default) = &input.default else {
                    continue;
                };
                let key = ValueKey::new(node.id.clone(), input.name.clone());
                if !self.schema_keys.contains(&key) || self.values.contains_key(&key) {
                    continue;
                }
                self.values.insert(key, default.clone());
            }
        }
    }

    pub fn get(&self, key: &ValueKey) -> Option<&InputValue> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ValueKey, &InputValue)> {
        self.values.iter()
    }

    /// Assign a typed value directly.
    pub fn set_value(&mut self, key: &ValueKey, value: InputValue) -> Result<(), StoreError> {
        self.ensure_editable(key)?;
        self.values.insert(key.clone(), value);
        Ok(())
    }

    /// Select a checkpoint.
    ///
    /// On a composite, writes `chosen` into the first present sub-key of
    /// [`CHECKPOINT_SUBKEYS`] (or `ckpt_name`), leaving every other
    /// sub-field untouched. Otherwise the entry becomes the plain name.
    pub fn set_checkpoint(&mut self, key: &ValueKey, chosen: &str) -> Result<(), StoreError> {
        self.ensure_editable(key)?;

        let next = match self.values.get(key) {
            Some(InputValue::Composite(current)) => {
                let mut next = current.clone();
                let subkey = select_subkey(&next, CHECKPOINT_SUBKEYS, CHECKPOINT_SUBKEYS[0]);
                next.insert(subkey.to_string(), InputValue::from(chosen));
                InputValue::Composite(next)
            }
            _ => InputValue::from(chosen),
        };

        self.values.insert(key.clone(), next);
        Ok(())
    }

    /// Select a LoRA.
    ///
    /// Same discipline as [`set_checkpoint`](Self::set_checkpoint) with
    /// [`LORA_SUBKEYS`] (fallback `lora`). An `on` sub-field, when
    /// present, is switched on.
    pub fn set_lora(&mut self, key: &ValueKey, chosen: &str) -> Result<(), StoreError> {
        self.ensure_editable(key)?;

        let next = match self.values.get(key) {
            Some(InputValue::Composite(current)) => {
                let mut next = current.clone();
                let subkey = select_subkey(&next, LORA_SUBKEYS, LORA_DEFAULT_SUBKEY);
                next.insert(subkey.to_string(), InputValue::from(chosen));
                if next.contains_key(LORA_ENABLED_SUBKEY) {
                    next.insert(LORA_ENABLED_SUBKEY.to_string(), InputValue::Bool(true));
                }
                InputValue::Composite(next)
            }
            _ => InputValue::from(chosen),
        };

        self.values.insert(key.clone(), next);
        Ok(())
    }

    /// Remove a LoRA selection.
    ///
    /// On a composite, sets `lora` to `"None"` and switches an existing
    /// `on` sub-field off. Otherwise the entry becomes `"None"`.
    pub fn clear_lora(&mut self, key: &ValueKey) -> Result<(), StoreError> {
        self.ensure_editable(key)?;

        let next = match self.values.get(key) {
            Some(InputValue::Composite(current)) => {
                let mut next = current.clone();
                next.insert(LORA_DEFAULT_SUBKEY.to_string(), InputValue::from(LORA_NONE));
                if next.contains_key(LORA_ENABLED_SUBKEY) {
                    next.insert(LORA_ENABLED_SUBKEY.to_string(), InputValue::Bool(false));
                }
                InputValue::Composite(next)
            }
            _ => InputValue::from(LORA_NONE),
        };

        self.values.insert(key.clone(), next);
        Ok(())
    }

    /// Assign from raw text according to `declared_type`.
    ///
    /// Numeric (and bool/object) text that does not parse leaves the
    /// stored value unchanged and returns [`ScalarUpdate::Skipped`]; this
    /// is not an error. Strings are assigned verbatim.
    pub fn set_scalar(
        &mut self,
        key: &ValueKey,
        raw: &str,
        declared_type: DeclaredType,
    ) -> Result<ScalarUpdate, StoreError> {
        self.ensure_editable(key)?;

        match coerce_scalar(raw, declared_type) {
            Some(value) => {
                self.values.insert(key.clone(), value);
                Ok(ScalarUpdate::Applied)
            }
            None => {
                self.diagnostics.emit(Diagnostic::ScalarParseSkipped {
                    key: key.clone(),
                    raw: raw.to_string(),
                    declared_type,
                });
                Ok(ScalarUpdate::Skipped)
            }
        }
    }

    /// Deep, detached copy of every submittable value, flattened to
    /// `"node.input"` keys in schema order. Header/widget inputs are
    /// left out.
    pub fn snapshot(&self, schema: &WorkflowSchema) -> IndexMap<String, InputValue> {
        schema
            .classified_inputs()
            .filter(|(_, _, category)| *category != Category::Suppressed)
            .filter_map(|(node, input, _)| {
                let key = ValueKey::new(node.id.clone(), input.name.clone());
                self.values
                    .get(&key)
                    .map(|value| (key.flattened(), value.clone()))
            })
            .collect()
    }

    /// Category of `key` under `schema`, if the schema has it.
    pub fn category_of(schema: &WorkflowSchema, key: &ValueKey) -> Option<Category> {
        schema.input(key).map(classify_input)
    }

    fn ensure_editable(&self, key: &ValueKey) -> Result<(), StoreError> {
        if !self.schema_keys.contains(key) {
            return Err(StoreError::UnknownInput(key.clone()));
        }
        if self.suppressed.contains(key) {
            return Err(StoreError::NotEditable(key.clone()));
        }
        Ok(())
    }
}

/// Parse `raw` into a value of `declared_type`, or `None`.
fn coerce_scalar(raw: &str, declared_type: DeclaredType) -> Option<InputValue> {
    match declared_type {
        DeclaredType::Int => raw.trim().parse::<i64>().ok().map(InputValue::Int),
        DeclaredType::Float => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|x| x.is_finite())
            .map(InputValue::Float),
        DeclaredType::Bool => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(InputValue::Bool(true)),
            "false" | "0" | "no" | "off" => Some(InputValue::Bool(false)),
            _ => None,
        },
        DeclaredType::String => Some(InputValue::from(raw)),
        DeclaredType::Object => serde_json::from_str::<serde_json::Value>(raw)
            .ok()
            .map(InputValue::from),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn schema() -> WorkflowSchema {
        WorkflowSchema::parse(
            "wf",
            &json!({"nodes": [
                {"id": "1", "type": "CheckpointLoaderSimple", "inputs": [
                    {"name": "ckpt_name", "type": "string", "default": "a.st"}
                ]},
                {"id": "2", "type": "KSampler", "inputs": [
                    {"name": "seed", "type": "int", "default": 5, "is_seed": true},
                    {"name": "steps", "type": "int", "default": 7},
                    {"name": "cfg", "type": "float", "default": 7.5},
                    {"name": "denoise", "type": "float"},
                    {"name": "add_noise", "type": "bool", "default": true}
                ]},
                {"id": "3", "type": "Loader", "inputs": [
                    {"name": "model_ckpt", "type": "object", "default": {"ckpt_name": "a.st", "strength": 0.5}},
                    {"name": "lora_1", "type": "object", "default": {"model": "x", "on": false}},
                    {"name": "lora_2", "type": "object", "default": {"lora": "y.st", "on": true}},
                    {"name": "lora_3", "type": "string", "default": "z.st"},
                    {"name": "lora_header", "type": "object", "default": {"type": "header"}}
                ]}
            ]}),
        )
        .unwrap()
    }

    fn loaded() -> ValueStore {
        let mut store = ValueStore::new();
        store.load_schema(&schema());
        store
    }

    fn key(node: &str, input: &str) -> ValueKey {
        ValueKey::new(node, input)
    }

    // -- defaults --------------------------------------------------------------

    #[test]
    fn load_seeds_non_null_defaults() {
        let store = loaded();
        assert_eq!(store.get(&key("2", "steps")), Some(&InputValue::Int(7)));
        assert!(store.get(&key("2", "denoise")).is_none());
    }

    #[test]
    fn defaults_never_overwrite_edits() {
        let mut store = loaded();
        store.set_value(&key("2", "steps"), InputValue::Int(30)).unwrap();
        store.init_defaults(&schema());
        store.load_schema(&schema());
        assert_eq!(store.get(&key("2", "steps")), Some(&InputValue::Int(30)));
    }

    #[test]
    fn init_defaults_is_idempotent() {
        let mut store = loaded();
        let before: Vec<_> = store.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        store.init_defaults(&schema());
        let after: Vec<_> = store.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn new_schema_prunes_stale_keys() {
        let mut store = loaded();
        let other = WorkflowSchema::parse(
            "other",
            &json!({"nodes": [{"id": "2", "type": "KSampler", "inputs": [
                {"name": "steps", "type": "int", "default": 99}
            ]}]}),
        )
        .unwrap();
        store.set_value(&key("2", "steps"), InputValue::Int(12)).unwrap();
        store.load_schema(&other);

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&key("2", "steps")), Some(&InputValue::Int(12)));
        assert_matches!(
            store.set_value(&key("1", "ckpt_name"), InputValue::from("b")),
            Err(StoreError::UnknownInput(_))
        );
    }

    #[test]
    fn unknown_key_is_rejected() {
        let mut store = loaded();
        assert_matches!(
            store.set_checkpoint(&key("9", "ckpt_name"), "b.st"),
            Err(StoreError::UnknownInput(k)) if k == key("9", "ckpt_name")
        );
    }

    #[test]
    fn header_widgets_reject_every_setter() {
        let mut store = loaded();
        let header = key("3", "lora_header");
        let seeded = store.get(&header).cloned();
        assert!(seeded.is_some());

        assert_matches!(
            store.set_value(&header, InputValue::from("x")),
            Err(StoreError::NotEditable(k)) if k == header
        );
        assert_matches!(store.set_lora(&header, "y.st"), Err(StoreError::NotEditable(_)));
        assert_matches!(store.clear_lora(&header), Err(StoreError::NotEditable(_)));
        assert_matches!(store.set_checkpoint(&header, "b.st"), Err(StoreError::NotEditable(_)));
        assert_matches!(
            store.set_scalar(&header, "{}", DeclaredType::Object),
            Err(StoreError::NotEditable(_))
        );
        assert_eq!(store.get(&header).cloned(), seeded);
    }

    // -- checkpoint ------------------------------------------------------------

    #[test]
    fn checkpoint_on_scalar_replaces_whole_value() {
        let mut store = loaded();
        store.set_checkpoint(&key("1", "ckpt_name"), r"sdxl\b.st").unwrap();
        assert_eq!(
            store.get(&key("1", "ckpt_name")),
            Some(&InputValue::from(r"sdxl\b.st"))
        );
    }

    #[test]
    fn checkpoint_on_composite_touches_only_target_subkey() {
        let mut store = loaded();
        store.set_checkpoint(&key("3", "model_ckpt"), "b.st").unwrap();
        assert_eq!(
            serde_json::to_value(store.get(&key("3", "model_ckpt")).unwrap()).unwrap(),
            json!({"ckpt_name": "b.st", "strength": 0.5})
        );
    }

    #[test]
    fn checkpoint_falls_back_to_first_candidate() {
        let mut store = loaded();
        store
            .set_value(&key("3", "model_ckpt"), InputValue::from(json!({"strength": 1.0})))
            .unwrap();
        store.set_checkpoint(&key("3", "model_ckpt"), "c.st").unwrap();
        assert_eq!(
            serde_json::to_value(store.get(&key("3", "model_ckpt")).unwrap()).unwrap(),
            json!({"strength": 1.0, "ckpt_name": "c.st"})
        );
    }

    // -- lora ------------------------------------------------------------------

    #[test]
    fn lora_uses_priority_list_and_enables() {
        let mut store = loaded();
        store.set_lora(&key("3", "lora_1"), "y.st").unwrap();
        assert_eq!(
            serde_json::to_value(store.get(&key("3", "lora_1")).unwrap()).unwrap(),
            json!({"model": "y.st", "on": true})
        );
    }

    #[test]
    fn lora_without_candidates_writes_default_subkey() {
        let mut store = loaded();
        store
            .set_value(&key("3", "lora_1"), InputValue::from(json!({"strength": 0.7})))
            .unwrap();
        store.set_lora(&key("3", "lora_1"), "q.st").unwrap();
        assert_eq!(
            serde_json::to_value(store.get(&key("3", "lora_1")).unwrap()).unwrap(),
            json!({"strength": 0.7, "lora": "q.st"})
        );
    }

    #[test]
    fn lora_on_scalar_replaces_whole_value() {
        let mut store = loaded();
        store.set_lora(&key("3", "lora_3"), "w.st").unwrap();
        assert_eq!(store.get(&key("3", "lora_3")), Some(&InputValue::from("w.st")));
    }

    #[test]
    fn clear_lora_on_composite() {
        let mut store = loaded();
        store.clear_lora(&key("3", "lora_2")).unwrap();
        assert_eq!(
            serde_json::to_value(store.get(&key("3", "lora_2")).unwrap()).unwrap(),
            json!({"lora": "None", "on": false})
        );
    }

    #[test]
    fn clear_lora_on_scalar() {
        let mut store = loaded();
        store.clear_lora(&key("3", "lora_3")).unwrap();
        assert_eq!(store.get(&key("3", "lora_3")), Some(&InputValue::from("None")));
    }

    // -- scalar ----------------------------------------------------------------

    #[test]
    fn invalid_int_text_keeps_prior_value() {
        let mut store = loaded();
        let outcome = store
            .set_scalar(&key("2", "steps"), "abc", DeclaredType::Int)
            .unwrap();
        assert_eq!(outcome, ScalarUpdate::Skipped);
        assert_eq!(store.get(&key("2", "steps")), Some(&InputValue::Int(7)));
    }

    #[test]
    fn valid_numeric_text_is_applied() {
        let mut store = loaded();
        store.set_scalar(&key("2", "steps"), "25", DeclaredType::Int).unwrap();
        store.set_scalar(&key("2", "cfg"), "6.5", DeclaredType::Float).unwrap();
        assert_eq!(store.get(&key("2", "steps")), Some(&InputValue::Int(25)));
        assert_eq!(store.get(&key("2", "cfg")), Some(&InputValue::Float(6.5)));
    }

    #[test]
    fn non_finite_float_is_skipped() {
        let mut store = loaded();
        let outcome = store.set_scalar(&key("2", "cfg"), "NaN", DeclaredType::Float).unwrap();
        assert_eq!(outcome, ScalarUpdate::Skipped);
        assert_eq!(store.get(&key("2", "cfg")), Some(&InputValue::Float(7.5)));
    }

    #[test]
    fn bool_and_string_are_assigned() {
        let mut store = loaded();
        store.set_scalar(&key("2", "add_noise"), "false", DeclaredType::Bool).unwrap();
        store.set_scalar(&key("3", "lora_3"), " spaced ", DeclaredType::String).unwrap();
        assert_eq!(store.get(&key("2", "add_noise")), Some(&InputValue::Bool(false)));
        assert_eq!(store.get(&key("3", "lora_3")), Some(&InputValue::from(" spaced ")));
    }

    #[test]
    fn skipped_parse_reaches_diagnostics() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let mut store = ValueStore::with_diagnostics(Diagnostics::from_fn(move |d| {
            seen_clone.lock().unwrap().push(d.clone())
        }));
        store.load_schema(&schema());

        store.set_scalar(&key("2", "steps"), "x1", DeclaredType::Int).unwrap();

        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[Diagnostic::ScalarParseSkipped {
                key: key("2", "steps"),
                raw: "x1".into(),
                declared_type: DeclaredType::Int,
            }]
        );
    }

    // -- snapshot --------------------------------------------------------------

    #[test]
    fn snapshot_excludes_suppressed_inputs() {
        let store = loaded();
        let snapshot = store.snapshot(&schema());
        assert!(!snapshot.contains_key("3.lora_header"));
        assert!(snapshot.contains_key("2.seed"));
        assert_eq!(snapshot.get_index(0).map(|(k, _)| k.as_str()), Some("1.ckpt_name"));
    }

    #[test]
    fn snapshot_is_detached_from_later_edits() {
        let mut store = loaded();
        let snapshot = store.snapshot(&schema());
        store.set_lora(&key("3", "lora_2"), "new.st").unwrap();
        assert_eq!(
            serde_json::to_value(&snapshot["3.lora_2"]).unwrap(),
            json!({"lora": "y.st", "on": true})
        );
    }
}
