use crate::value::{DataType, RuleValue, ValueClass, ValueDefId};

/// One condition or output of a rule, with its definition flattened in.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleEntry {
    pub definition: ValueDefId,
    pub class: ValueClass,
    pub data_type: DataType,
    pub value: RuleValue,
}

/// Node of a rule tree: input conditions which all must match, outputs which are written when
/// they do, and two kinds of children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rule {
    pub(crate) entries: Vec<RuleEntry>,
    /// Tried in order, the first matching one wins.
    pub(crate) if_else_children: Vec<Rule>,
    /// All evaluated, regardless of each other's outcome.
    pub(crate) if_children: Vec<Rule>,
    /// Set on the rules created to group several root rules under one key.
    pub(crate) is_wrapper: bool,
}

impl Rule {
    pub fn entries(&self) -> &[RuleEntry] {
        &self.entries
    }

    pub fn if_else_children(&self) -> &[Rule] {
        &self.if_else_children
    }

    pub fn if_children(&self) -> &[Rule] {
        &self.if_children
    }

    pub(crate) fn value_of(&self, definition: ValueDefId) -> Option<&RuleValue> {
        self.entries
            .iter()
            .find(|entry| entry.definition == definition)
            .map(|entry| &entry.value)
    }

    pub(crate) fn inputs(&self) -> impl Iterator<Item = &RuleEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.class == ValueClass::Input)
    }

    pub(crate) fn outputs(&self) -> impl Iterator<Item = &RuleEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.class == ValueClass::Output)
    }
}
