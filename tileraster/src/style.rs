//! Map styles: immutable rule trees keyed by tag/value. A [`Style`] is built once, with
//! [`StyleBuilder`] or from JSON, and then shared read-only between any number of rasterization
//! passes.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

use color::{AlphaColor, Srgb};
use log::debug;

use crate::rule::{Rule, RuleEntry};
use crate::value::{
    ComplexValue, DataType, RuleValue, StringId, Value, ValueClass, ValueDefId, ValueDefinition,
    builtin,
};

#[derive(thiserror::Error, Debug)]
pub enum StyleError {
    #[error("Unknown style value '{0}'")]
    UnknownValue(String),
    #[error("Cannot parse '{value}' as {data_type:?} for '{name}'")]
    InvalidValue {
        name: String,
        value: String,
        data_type: DataType,
    },
    #[error("Style value '{0}' is already defined")]
    DuplicateDefinition(String),
    #[error(transparent)]
    ColorParse(color::ParseError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Independent rule collections, used at different stages of rasterization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RulesetType {
    /// Decides what kind of primitive a feature becomes and in which order it is drawn.
    Order,
    Polygon,
    Line,
}

impl RulesetType {
    fn index(self) -> usize {
        match self {
            RulesetType::Order => 0,
            RulesetType::Polygon => 1,
            RulesetType::Line => 2,
        }
    }
}

pub(crate) fn encode_rule_id(tag: StringId, value: StringId) -> u64 {
    (u64::from(tag.0) << 32) | u64::from(value.0)
}

/// Compiled, immutable style.
#[derive(Debug)]
pub struct Style {
    definitions: Vec<ValueDefinition>,
    definitions_by_name: HashMap<String, ValueDefId>,
    strings: Vec<String>,
    string_ids: HashMap<String, StringId>,
    rulesets: [HashMap<u64, Rule>; 3],
}

impl Style {
    pub fn from_json(json: &str) -> Result<Self, StyleError> {
        StyleDefinition::from_json(json)?.build()
    }

    pub fn value_definition(&self, name: &str) -> Option<&ValueDefinition> {
        self.definitions_by_name
            .get(name)
            .and_then(|id| self.definitions.get(id.0))
    }

    pub fn definition(&self, id: ValueDefId) -> Option<&ValueDefinition> {
        self.definitions.get(id.0)
    }

    pub fn definitions(&self) -> &[ValueDefinition] {
        &self.definitions
    }

    /// Id of an interned string, or [`StringId::UNKNOWN`] if no rule ever mentioned it.
    pub fn string_id(&self, string: &str) -> StringId {
        self.string_ids
            .get(string)
            .copied()
            .unwrap_or(StringId::UNKNOWN)
    }

    pub fn lookup_string(&self, id: StringId) -> Option<&str> {
        self.strings.get(id.0 as usize).map(String::as_str)
    }

    /// Root rule registered for the exact key, without any fallback.
    pub fn rule(&self, ruleset: RulesetType, tag: StringId, value: StringId) -> Option<&Rule> {
        self.rulesets[ruleset.index()].get(&encode_rule_id(tag, value))
    }

    pub fn rule_count(&self, ruleset: RulesetType) -> usize {
        self.rulesets[ruleset.index()].len()
    }
}

/// Raw attribute value of a rule definition, parsed according to the data type of the value
/// definition it is assigned to.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
}

impl AttributeValue {
    fn raw(&self) -> String {
        match self {
            AttributeValue::Text(text) => text.clone(),
            AttributeValue::Number(number) => number.to_string(),
            AttributeValue::Flag(flag) => flag.to_string(),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

/// Uncompiled rule, with values referenced by name.
///
/// ```
/// use tileraster::RuleDefinition;
///
/// let forest = RuleDefinition::new()
///     .with("tag", "landuse")
///     .with("value", "forest")
///     .with("color", "#228B22")
///     .if_else(RuleDefinition::new().with("maxzoom", 9).with("color", "#1B6B1B"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct RuleDefinition {
    #[serde(flatten)]
    pub attributes: BTreeMap<String, AttributeValue>,
    #[serde(default)]
    pub if_else: Vec<RuleDefinition>,
    #[serde(default, rename = "if")]
    pub if_children: Vec<RuleDefinition>,
}

impl RuleDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.to_owned(), value.into());
        self
    }

    /// Add an exclusive child. The first matching exclusive child wins.
    pub fn if_else(mut self, child: RuleDefinition) -> Self {
        self.if_else.push(child);
        self
    }

    /// Add an inclusive child. Those are always evaluated.
    pub fn if_child(mut self, child: RuleDefinition) -> Self {
        self.if_children.push(child);
        self
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct PropertyDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
}

/// Whole style, as stored in JSON.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct StyleDefinition {
    pub properties: Vec<PropertyDefinition>,
    pub order: Vec<RuleDefinition>,
    pub polygon: Vec<RuleDefinition>,
    pub line: Vec<RuleDefinition>,
}

impl StyleDefinition {
    pub fn from_json(json: &str) -> Result<Self, StyleError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn build(&self) -> Result<Style, StyleError> {
        let mut builder = StyleBuilder::new();
        for property in &self.properties {
            builder.define_property(&property.name, property.data_type)?;
        }

        for (ruleset, rules) in [
            (RulesetType::Order, &self.order),
            (RulesetType::Polygon, &self.polygon),
            (RulesetType::Line, &self.line),
        ] {
            for rule in rules {
                builder.add_rule(ruleset, rule)?;
            }
        }

        Ok(builder.build())
    }
}

/// Mutable style under construction. Nothing can be changed after [`StyleBuilder::build`].
#[derive(Debug)]
pub struct StyleBuilder {
    style: Style,
}

impl Default for StyleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleBuilder {
    pub fn new() -> Self {
        let mut style = Style {
            definitions: Vec::new(),
            definitions_by_name: HashMap::new(),
            strings: Vec::new(),
            string_ids: HashMap::new(),
            rulesets: Default::default(),
        };

        for (id, (name, class, data_type)) in builtin::DEFINITIONS.iter().enumerate() {
            style
                .definitions_by_name
                .insert((*name).to_owned(), ValueDefId(id));
            style.definitions.push(ValueDefinition {
                id: ValueDefId(id),
                class: *class,
                data_type: *data_type,
                name: (*name).to_owned(),
            });
        }

        let mut builder = Self { style };
        let empty = builder.intern("");
        debug_assert_eq!(empty, StringId::EMPTY);
        builder
    }

    /// Define a custom input, which can be then set on the evaluator and used in rules.
    pub fn define_property(
        &mut self,
        name: &str,
        data_type: DataType,
    ) -> Result<ValueDefId, StyleError> {
        if self.style.definitions_by_name.contains_key(name) {
            return Err(StyleError::DuplicateDefinition(name.to_owned()));
        }

        let id = ValueDefId(self.style.definitions.len());
        self.style.definitions.push(ValueDefinition {
            id,
            class: ValueClass::Input,
            data_type,
            name: name.to_owned(),
        });
        self.style.definitions_by_name.insert(name.to_owned(), id);
        Ok(id)
    }

    /// Compile the rule and register it under the key made of its `tag` and `value`
    /// attributes, which are empty (wildcard) if absent.
    pub fn add_rule(
        &mut self,
        ruleset: RulesetType,
        definition: &RuleDefinition,
    ) -> Result<(), StyleError> {
        let rule = self.compile(definition)?;

        let key_part = |rule: &Rule, definition| match rule.value_of(definition) {
            Some(RuleValue::Simple(Value::String(id))) => *id,
            _ => StringId::EMPTY,
        };
        let tag = key_part(&rule, builtin::INPUT_TAG);
        let value = key_part(&rule, builtin::INPUT_VALUE);

        match self.style.rulesets[ruleset.index()].entry(encode_rule_id(tag, value)) {
            Entry::Vacant(entry) => {
                entry.insert(rule);
            }
            Entry::Occupied(mut entry) => {
                debug!("Several {ruleset:?} rules for {tag:?}={value:?}, grouping them.");
                let existing = entry.get_mut();
                if !existing.is_wrapper {
                    let previous = std::mem::take(existing);
                    *existing = wrapper_rule(tag, value, previous);
                }
                existing.if_else_children.push(rule);
            }
        }

        Ok(())
    }

    pub fn build(self) -> Style {
        self.style
    }

    fn intern(&mut self, string: &str) -> StringId {
        if let Some(id) = self.style.string_ids.get(string) {
            return *id;
        }

        let id = StringId(self.style.strings.len() as u32);
        self.style.strings.push(string.to_owned());
        self.style.string_ids.insert(string.to_owned(), id);
        id
    }

    fn compile(&mut self, definition: &RuleDefinition) -> Result<Rule, StyleError> {
        let mut entries = Vec::with_capacity(definition.attributes.len());
        for (name, attribute) in &definition.attributes {
            let value_definition = self
                .style
                .value_definition(name)
                .ok_or_else(|| StyleError::UnknownValue(name.clone()))?
                .clone();

            let value = self.parse_value(&value_definition, &attribute.raw())?;
            entries.push(RuleEntry {
                definition: value_definition.id,
                class: value_definition.class,
                data_type: value_definition.data_type,
                value,
            });
        }

        Ok(Rule {
            entries,
            if_else_children: definition
                .if_else
                .iter()
                .map(|child| self.compile(child))
                .collect::<Result<_, _>>()?,
            if_children: definition
                .if_children
                .iter()
                .map(|child| self.compile(child))
                .collect::<Result<_, _>>()?,
            is_wrapper: false,
        })
    }

    fn parse_value(
        &mut self,
        definition: &ValueDefinition,
        raw: &str,
    ) -> Result<RuleValue, StyleError> {
        let invalid = || StyleError::InvalidValue {
            name: definition.name.clone(),
            value: raw.to_owned(),
            data_type: definition.data_type,
        };

        let value = match definition.data_type {
            DataType::Boolean => Value::Boolean(raw.parse().map_err(|_| invalid())?),
            DataType::Integer | DataType::Float if raw.contains(':') => {
                return parse_complex(raw).map(RuleValue::Complex).ok_or_else(invalid);
            }
            DataType::Integer => Value::Integer(raw.parse().map_err(|_| invalid())?),
            DataType::Float => Value::Float(raw.parse().map_err(|_| invalid())?),
            DataType::String => Value::String(self.intern(raw)),
            DataType::Color => Value::Color(parse_color(raw)?),
        };

        Ok(RuleValue::Simple(value))
    }
}

fn wrapper_rule(tag: StringId, value: StringId, first: Rule) -> Rule {
    let input = |definition, id| RuleEntry {
        definition,
        class: ValueClass::Input,
        data_type: DataType::String,
        value: RuleValue::Simple(Value::String(id)),
    };

    Rule {
        entries: vec![
            input(builtin::INPUT_TAG, tag),
            input(builtin::INPUT_VALUE, value),
        ],
        if_else_children: vec![first],
        if_children: Vec::new(),
        is_wrapper: true,
    }
}

/// Parse `dip:px`.
pub(crate) fn parse_complex(raw: &str) -> Option<ComplexValue> {
    let (dip, px) = raw.split_once(':')?;
    let parse = |s: &str| -> Option<f32> {
        let s = s.trim();
        if s.is_empty() { Some(0.) } else { s.parse().ok() }
    };

    Some(ComplexValue {
        dip: parse(dip)?,
        px: parse(px)?,
    })
}

/// Parse a color into ARGB. Eight hex digits are `#AARRGGBB`, anything else goes through the
/// CSS color parser.
pub(crate) fn parse_color(raw: &str) -> Result<u32, StyleError> {
    if let Some(hex) = raw.strip_prefix('#') {
        if hex.len() == 8 {
            if let Ok(argb) = u32::from_str_radix(hex, 16) {
                return Ok(argb);
            }
        }
    }

    let color: AlphaColor<Srgb> = raw.parse().map_err(StyleError::ColorParse)?;
    let rgba = color.to_rgba8();
    Ok(u32::from_be_bytes([rgba.a, rgba.r, rgba.g, rgba.b]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_parsing() {
        let style = Style::from_json(
            r##"{
                "properties": [{ "name": "nightMode", "type": "boolean" }],
                "order": [
                    { "tag": "landuse", "objectType": 3, "order": 10 }
                ],
                "polygon": [
                    {
                        "tag": "landuse",
                        "value": "forest",
                        "color": "#228B22",
                        "if_else": [{ "nightMode": true, "color": "#0B2B0B" }]
                    }
                ],
                "line": [
                    { "strokeWidth": "2:1", "color": "red", "if": [{ "maxzoom": 10, "strokeWidth": 1.5 }] }
                ]
            }"##,
        )
        .unwrap();

        let night_mode = style.value_definition("nightMode").unwrap();
        assert_eq!(ValueClass::Input, night_mode.class);
        assert_eq!(DataType::Boolean, night_mode.data_type);

        let landuse = style.string_id("landuse");
        let forest = style.string_id("forest");
        assert_ne!(StringId::UNKNOWN, landuse);

        assert!(style.rule(RulesetType::Order, landuse, StringId::EMPTY).is_some());
        assert!(style.rule(RulesetType::Order, landuse, forest).is_none());

        let polygon = style.rule(RulesetType::Polygon, landuse, forest).unwrap();
        assert_eq!(
            Some(&RuleValue::Simple(Value::Color(0xFF22_8B22))),
            polygon.value_of(builtin::OUTPUT_COLOR)
        );
        assert_eq!(1, polygon.if_else_children().len());

        let line = style
            .rule(RulesetType::Line, StringId::EMPTY, StringId::EMPTY)
            .unwrap();
        assert_eq!(
            Some(&RuleValue::Complex(ComplexValue { dip: 2., px: 1. })),
            line.value_of(builtin::OUTPUT_STROKE_WIDTH)
        );
        assert_eq!(
            Some(&RuleValue::Simple(Value::Color(0xFFFF_0000))),
            line.value_of(builtin::OUTPUT_COLOR)
        );
        assert_eq!(1, line.if_children().len());
    }

    #[test]
    fn unknown_strings_do_not_collide_with_wildcard() {
        let style = StyleBuilder::new().build();
        assert_eq!(StringId::EMPTY, style.string_id(""));
        assert_eq!(StringId::UNKNOWN, style.string_id("highway"));
        assert_eq!(Some(""), style.lookup_string(StringId::EMPTY));
    }

    #[test]
    fn rules_with_the_same_key_are_grouped() {
        let mut builder = StyleBuilder::new();
        let primary = |color| {
            RuleDefinition::new()
                .with("tag", "highway")
                .with("value", "primary")
                .with("color", color)
        };

        builder
            .add_rule(RulesetType::Line, &primary("#FF0000"))
            .unwrap();
        builder
            .add_rule(RulesetType::Line, &primary("#00FF00"))
            .unwrap();
        builder
            .add_rule(RulesetType::Line, &primary("#0000FF"))
            .unwrap();
        let style = builder.build();

        let root = style
            .rule(
                RulesetType::Line,
                style.string_id("highway"),
                style.string_id("primary"),
            )
            .unwrap();
        assert!(root.is_wrapper);
        assert_eq!(3, root.if_else_children().len());
        assert_eq!(
            Some(&RuleValue::Simple(Value::Color(0xFFFF_0000))),
            root.if_else_children()[0].value_of(builtin::OUTPUT_COLOR)
        );
        assert_eq!(1, style.rule_count(RulesetType::Line));
    }

    #[test]
    fn colors() {
        assert_eq!(0xFF22_8B22, parse_color("#228B22").unwrap());
        assert_eq!(0x8012_3456, parse_color("#80123456").unwrap());
        assert_eq!(0xFF00_0000, parse_color("black").unwrap());
        assert!(matches!(
            parse_color("not a color"),
            Err(StyleError::ColorParse(_))
        ));
    }

    #[test]
    fn complex_values() {
        assert_eq!(
            Some(ComplexValue { dip: 3., px: 0. }),
            parse_complex("3:")
        );
        assert_eq!(
            Some(ComplexValue { dip: 0., px: 2. }),
            parse_complex(":2")
        );
        assert_eq!(None, parse_complex("a:b"));
    }

    #[test]
    fn invalid_definitions_are_rejected() {
        let mut builder = StyleBuilder::new();

        assert!(matches!(
            builder.add_rule(RulesetType::Order, &RuleDefinition::new().with("nope", 1)),
            Err(StyleError::UnknownValue(name)) if name == "nope"
        ));

        assert!(matches!(
            builder.add_rule(
                RulesetType::Order,
                &RuleDefinition::new().with("order", "ten")
            ),
            Err(StyleError::InvalidValue { .. })
        ));

        assert!(matches!(
            builder.define_property("color", DataType::Color),
            Err(StyleError::DuplicateDefinition(_))
        ));

        assert!(matches!(
            Style::from_json("{ not json"),
            Err(StyleError::Json(_))
        ));
    }
}
