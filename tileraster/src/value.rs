//! Definitions of style parameters and the values they take.

/// Index of a [`ValueDefinition`] in a style's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueDefId(pub(crate) usize);

impl ValueDefId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Id of a string interned in a style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(pub(crate) u32);

impl StringId {
    /// The empty string, used as a wildcard in rule keys.
    pub const EMPTY: Self = Self(0);

    /// A string the style does not know about. Never part of a rule key.
    pub const UNKNOWN: Self = Self(u32::MAX);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueClass {
    /// Compared against the evaluator's inputs.
    Input,
    /// Written to the evaluation result.
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Boolean,
    Integer,
    Float,
    String,
    Color,
}

/// Describes one named style parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueDefinition {
    pub id: ValueDefId,
    pub class: ValueClass,
    pub data_type: DataType,
    pub name: String,
}

/// A plain value. Colors are ARGB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i32),
    Float(f32),
    String(StringId),
    Color(u32),
}

impl Value {
    /// Integer representation used for exact comparisons.
    pub fn as_int(&self) -> i64 {
        match *self {
            Value::Boolean(b) => i64::from(b),
            Value::Integer(i) => i64::from(i),
            Value::Float(f) => f as i64,
            Value::String(s) => i64::from(s.0),
            Value::Color(c) => i64::from(c),
        }
    }

    pub fn as_float(&self) -> f32 {
        match *self {
            Value::Float(f) => f,
            other => other.as_int() as f32,
        }
    }

    /// Zero of the given type, which is what unset inputs hold.
    pub(crate) fn zero(data_type: DataType) -> Self {
        match data_type {
            DataType::Boolean => Value::Boolean(false),
            DataType::Integer => Value::Integer(0),
            DataType::Float => Value::Float(0.),
            DataType::String => Value::String(StringId::EMPTY),
            DataType::Color => Value::Color(0),
        }
    }
}

/// Length depending on the display density: `dip * density + px`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComplexValue {
    pub dip: f32,
    pub px: f32,
}

impl ComplexValue {
    pub fn evaluate_float(&self, density: f32) -> f32 {
        self.dip * density + self.px
    }

    pub fn evaluate_int(&self, density: f32) -> i32 {
        self.evaluate_float(density).round() as i32
    }
}

/// Value stored on a rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleValue {
    Simple(Value),
    Complex(ComplexValue),
}

impl RuleValue {
    pub fn resolve_float(&self, density: f32) -> f32 {
        match self {
            RuleValue::Simple(value) => value.as_float(),
            RuleValue::Complex(complex) => complex.evaluate_float(density),
        }
    }

    pub fn resolve_int(&self, density: f32) -> i64 {
        match self {
            RuleValue::Simple(value) => value.as_int(),
            RuleValue::Complex(complex) => i64::from(complex.evaluate_int(density)),
        }
    }
}

/// Approximate equality with the same tolerance as Qt's `qFuzzyCompare`. Note that nothing is
/// fuzzy-equal to zero except zero itself.
pub fn fuzzy_eq_f32(a: f32, b: f32) -> bool {
    (a - b).abs() * 100_000. <= a.abs().min(b.abs())
}

pub fn fuzzy_eq_f64(a: f64, b: f64) -> bool {
    (a - b).abs() * 1_000_000_000_000. <= a.abs().min(b.abs())
}

/// Built-in value definitions. Their ids are the same in every style.
pub mod builtin {
    use super::{DataType, ValueClass, ValueDefId};

    pub const INPUT_TAG: ValueDefId = ValueDefId(0);
    pub const INPUT_VALUE: ValueDefId = ValueDefId(1);
    pub const INPUT_ADDITIONAL: ValueDefId = ValueDefId(2);
    pub const INPUT_MINZOOM: ValueDefId = ValueDefId(3);
    pub const INPUT_MAXZOOM: ValueDefId = ValueDefId(4);
    pub const INPUT_LAYER: ValueDefId = ValueDefId(5);
    pub const INPUT_AREA: ValueDefId = ValueDefId(6);
    pub const INPUT_POINT: ValueDefId = ValueDefId(7);
    pub const INPUT_CYCLE: ValueDefId = ValueDefId(8);

    pub const OUTPUT_OBJECT_TYPE: ValueDefId = ValueDefId(9);
    pub const OUTPUT_ORDER: ValueDefId = ValueDefId(10);
    pub const OUTPUT_SHADOW_LEVEL: ValueDefId = ValueDefId(11);
    pub const OUTPUT_SHADER: ValueDefId = ValueDefId(12);
    pub const OUTPUT_SHADOW_COLOR: ValueDefId = ValueDefId(13);
    pub const OUTPUT_SHADOW_RADIUS: ValueDefId = ValueDefId(14);

    pub const OUTPUT_COLOR: ValueDefId = ValueDefId(15);
    pub const OUTPUT_STROKE_WIDTH: ValueDefId = ValueDefId(16);
    pub const OUTPUT_CAP: ValueDefId = ValueDefId(17);
    pub const OUTPUT_PATH_EFFECT: ValueDefId = ValueDefId(18);

    pub const OUTPUT_COLOR_2: ValueDefId = ValueDefId(19);
    pub const OUTPUT_STROKE_WIDTH_2: ValueDefId = ValueDefId(20);
    pub const OUTPUT_CAP_2: ValueDefId = ValueDefId(21);
    pub const OUTPUT_PATH_EFFECT_2: ValueDefId = ValueDefId(22);

    pub const OUTPUT_COLOR_0: ValueDefId = ValueDefId(23);
    pub const OUTPUT_STROKE_WIDTH_0: ValueDefId = ValueDefId(24);
    pub const OUTPUT_CAP_0: ValueDefId = ValueDefId(25);
    pub const OUTPUT_PATH_EFFECT_0: ValueDefId = ValueDefId(26);

    pub const OUTPUT_COLOR__1: ValueDefId = ValueDefId(27);
    pub const OUTPUT_STROKE_WIDTH__1: ValueDefId = ValueDefId(28);
    pub const OUTPUT_CAP__1: ValueDefId = ValueDefId(29);
    pub const OUTPUT_PATH_EFFECT__1: ValueDefId = ValueDefId(30);

    pub const OUTPUT_COLOR_3: ValueDefId = ValueDefId(31);
    pub const OUTPUT_STROKE_WIDTH_3: ValueDefId = ValueDefId(32);
    pub const OUTPUT_CAP_3: ValueDefId = ValueDefId(33);
    pub const OUTPUT_PATH_EFFECT_3: ValueDefId = ValueDefId(34);

    use DataType::{Boolean, Color, Float, Integer, String};
    use ValueClass::{Input, Output};

    /// Name, class and type of every built-in, indexed by id.
    pub(crate) const DEFINITIONS: &[(&str, ValueClass, DataType)] = &[
        ("tag", Input, String),
        ("value", Input, String),
        ("additional", Input, String),
        ("minzoom", Input, Integer),
        ("maxzoom", Input, Integer),
        ("layer", Input, Integer),
        ("area", Input, Boolean),
        ("point", Input, Boolean),
        ("cycle", Input, Boolean),
        ("objectType", Output, Integer),
        ("order", Output, Integer),
        ("shadowLevel", Output, Integer),
        ("shader", Output, String),
        ("shadowColor", Output, Color),
        ("shadowRadius", Output, Integer),
        ("color", Output, Color),
        ("strokeWidth", Output, Float),
        ("cap", Output, String),
        ("pathEffect", Output, String),
        ("color_2", Output, Color),
        ("strokeWidth_2", Output, Float),
        ("cap_2", Output, String),
        ("pathEffect_2", Output, String),
        ("color_0", Output, Color),
        ("strokeWidth_0", Output, Float),
        ("cap_0", Output, String),
        ("pathEffect_0", Output, String),
        ("color__1", Output, Color),
        ("strokeWidth__1", Output, Float),
        ("cap__1", Output, String),
        ("pathEffect__1", Output, String),
        ("color_3", Output, Color),
        ("strokeWidth_3", Output, Float),
        ("cap_3", Output, String),
        ("pathEffect_3", Output, String),
    ];
}
