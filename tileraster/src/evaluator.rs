//! Cascading evaluation of style rules against a feature and its render context.

use std::collections::HashMap;

use log::trace;

use crate::feature::MapFeature;
use crate::rule::Rule;
use crate::style::{RulesetType, Style};
use crate::value::{
    DataType, RuleValue, StringId, Value, ValueDefId, builtin, fuzzy_eq_f32,
};

/// Outputs of the rules which matched. Reused between evaluations.
#[derive(Debug, Default, Clone)]
pub struct EvaluationResult {
    pod_values: HashMap<ValueDefId, Value>,
    string_values: HashMap<ValueDefId, String>,
}

impl EvaluationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.pod_values.clear();
        self.string_values.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.pod_values.is_empty() && self.string_values.is_empty()
    }

    pub fn contains(&self, definition: ValueDefId) -> bool {
        self.pod_values.contains_key(&definition) || self.string_values.contains_key(&definition)
    }

    pub fn get_integer(&self, definition: ValueDefId) -> Option<i32> {
        self.pod_values
            .get(&definition)
            .map(|value| value.as_int() as i32)
    }

    pub fn get_float(&self, definition: ValueDefId) -> Option<f32> {
        self.pod_values.get(&definition).map(Value::as_float)
    }

    pub fn get_boolean(&self, definition: ValueDefId) -> Option<bool> {
        self.pod_values
            .get(&definition)
            .map(|value| value.as_int() != 0)
    }

    /// ARGB color.
    pub fn get_color(&self, definition: ValueDefId) -> Option<u32> {
        self.pod_values
            .get(&definition)
            .map(|value| value.as_int() as u32)
    }

    pub fn get_string(&self, definition: ValueDefId) -> Option<&str> {
        self.string_values.get(&definition).map(String::as_str)
    }
}

/// Per-feature evaluation context. It is owned by a single rasterization pass and reset for
/// every feature, while the [`Style`] it reads from is shared.
#[derive(Debug)]
pub struct StyleEvaluator<'a> {
    style: &'a Style,
    ruleset: RulesetType,
    single_rule: Option<&'a Rule>,
    feature: Option<&'a MapFeature>,
    display_density: f32,
    inputs: Vec<Value>,
}

impl<'a> StyleEvaluator<'a> {
    pub fn new(style: &'a Style, ruleset: RulesetType, display_density: f32) -> Self {
        let mut evaluator = Self {
            style,
            ruleset,
            single_rule: None,
            feature: None,
            display_density,
            inputs: Vec::with_capacity(style.definitions().len()),
        };
        evaluator.reset();
        evaluator
    }

    /// Evaluator checking just the given rule (and its children), without any tag/value lookup.
    pub fn for_rule(style: &'a Style, rule: &'a Rule, display_density: f32) -> Self {
        let mut evaluator = Self::new(style, RulesetType::Order, display_density);
        evaluator.single_rule = Some(rule);
        evaluator
    }

    pub fn style(&self) -> &'a Style {
        self.style
    }

    pub fn ruleset(&self) -> RulesetType {
        self.ruleset
    }

    /// Forget all inputs and the bound feature.
    pub fn reset(&mut self) {
        self.feature = None;
        self.inputs.clear();
        self.inputs.extend(
            self.style
                .definitions()
                .iter()
                .map(|definition| Value::zero(definition.data_type)),
        );
    }

    /// Bind the feature against which `additional` conditions are checked. Without one, such
    /// conditions always match.
    pub fn set_feature(&mut self, feature: Option<&'a MapFeature>) {
        self.feature = feature;
    }

    pub fn set_value(&mut self, definition: ValueDefId, value: Value) {
        if let Some(slot) = self.inputs.get_mut(definition.0) {
            *slot = value;
        }
    }

    pub fn set_string_value(&mut self, definition: ValueDefId, value: &str) {
        let id = self.style.string_id(value);
        self.set_value(definition, Value::String(id));
    }

    pub fn set_integer_value(&mut self, definition: ValueDefId, value: i32) {
        self.set_value(definition, Value::Integer(value));
    }

    pub fn set_boolean_value(&mut self, definition: ValueDefId, value: bool) {
        self.set_value(definition, Value::Boolean(value));
    }

    pub fn set_float_value(&mut self, definition: ValueDefId, value: f32) {
        self.set_value(definition, Value::Float(value));
    }

    /// Run the cascade. Without a single rule, the root rule is looked up by the `tag` and
    /// `value` inputs, falling back to the tag-only and then to the wildcard rule. The first of
    /// those which exists and matches wins.
    ///
    /// The result, if given, is cleared first.
    pub fn evaluate(
        &mut self,
        mut result: Option<&mut EvaluationResult>,
        evaluate_children: bool,
    ) -> bool {
        if let Some(result) = result.as_deref_mut() {
            result.clear();
        }

        if let Some(rule) = self.single_rule {
            return self.evaluate_rule(rule, result, evaluate_children);
        }

        let tag = self.string_input(builtin::INPUT_TAG);
        let value = self.string_input(builtin::INPUT_VALUE);

        for (tag, value) in [
            (tag, value),
            (tag, StringId::EMPTY),
            (StringId::EMPTY, StringId::EMPTY),
        ] {
            if self.evaluate_key(tag, value, result.as_deref_mut(), evaluate_children) {
                return true;
            }
        }

        trace!("No {:?} rule matched.", self.ruleset);
        false
    }

    fn string_input(&self, definition: ValueDefId) -> StringId {
        match self.inputs.get(definition.0) {
            Some(Value::String(id)) => *id,
            _ => StringId::EMPTY,
        }
    }

    fn evaluate_key(
        &mut self,
        tag: StringId,
        value: StringId,
        result: Option<&mut EvaluationResult>,
        evaluate_children: bool,
    ) -> bool {
        self.set_value(builtin::INPUT_TAG, Value::String(tag));
        self.set_value(builtin::INPUT_VALUE, Value::String(value));

        match self.style.rule(self.ruleset, tag, value) {
            Some(rule) => self.evaluate_rule(rule, result, evaluate_children),
            None => false,
        }
    }

    /// Match a single rule and, if it matched, its children.
    pub fn evaluate_rule(
        &self,
        rule: &Rule,
        mut result: Option<&mut EvaluationResult>,
        evaluate_children: bool,
    ) -> bool {
        if !rule.inputs().all(|entry| {
            self.input_matches(entry.definition, entry.data_type, &entry.value)
        }) {
            return false;
        }

        if let Some(result) = result.as_deref_mut() {
            for entry in rule.outputs() {
                self.write_output(result, entry.definition, entry.data_type, &entry.value);
            }
        }

        if evaluate_children {
            for child in rule.if_else_children() {
                if self.evaluate_rule(child, result.as_deref_mut(), true) {
                    break;
                }
            }

            for child in rule.if_children() {
                self.evaluate_rule(child, result.as_deref_mut(), true);
            }
        }

        true
    }

    fn input_matches(&self, definition: ValueDefId, data_type: DataType, value: &RuleValue) -> bool {
        let Some(input) = self.inputs.get(definition.0) else {
            return false;
        };

        match definition {
            builtin::INPUT_MINZOOM => value.resolve_int(self.display_density) <= input.as_int(),
            builtin::INPUT_MAXZOOM => value.resolve_int(self.display_density) >= input.as_int(),
            builtin::INPUT_ADDITIONAL => self.additional_matches(value),
            _ if data_type == DataType::Float => {
                fuzzy_eq_f32(value.resolve_float(self.display_density), input.as_float())
            }
            _ => value.resolve_int(self.display_density) == input.as_int(),
        }
    }

    /// `additional` holds `tag=value`, which the feature has to carry.
    fn additional_matches(&self, value: &RuleValue) -> bool {
        let Some(feature) = self.feature else {
            return true;
        };

        let RuleValue::Simple(Value::String(id)) = value else {
            return false;
        };

        match self
            .style
            .lookup_string(*id)
            .and_then(|string| string.split_once('='))
        {
            Some((tag, value)) => feature.contains_type(tag, value, true),
            None => false,
        }
    }

    fn write_output(
        &self,
        result: &mut EvaluationResult,
        definition: ValueDefId,
        data_type: DataType,
        value: &RuleValue,
    ) {
        let density = self.display_density;
        let pod = match (data_type, value) {
            (DataType::String, RuleValue::Simple(Value::String(id))) => {
                let string = self.style.lookup_string(*id).unwrap_or_default();
                result.string_values.insert(definition, string.to_owned());
                return;
            }
            (DataType::Integer, value) => Value::Integer(value.resolve_int(density) as i32),
            (DataType::Float, value) => Value::Float(value.resolve_float(density)),
            (_, RuleValue::Simple(value)) => *value,
            (_, RuleValue::Complex(complex)) => Value::Integer(complex.evaluate_int(density)),
        };
        result.pod_values.insert(definition, pod);
    }
}
