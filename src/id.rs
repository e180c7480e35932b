//! Identifier types for scenarios, busses and components.
use std::fmt;
use std::rc::Rc;

/// Define a cheaply cloneable string identifier type
macro_rules! define_id_type {
    ($name:ident) => {
        #[derive(
            Clone, std::hash::Hash, PartialEq, Eq, PartialOrd, Ord, Debug, serde::Deserialize,
            serde::Serialize,
        )]
        /// An ID type (e.g. `ScenarioID`, `BusID`, etc.)
        pub struct $name(pub std::rc::Rc<str>);

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(std::rc::Rc::from(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(std::rc::Rc::from(s))
            }
        }

        impl $name {
            /// Create a new ID from a string slice
            pub fn new(id: &str) -> Self {
                $name(std::rc::Rc::from(id))
            }

            /// The ID as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}
pub(crate) use define_id_type;

define_id_type! {ScenarioID}

/// The label of an uncertain variable: its group plus its name.
///
/// Rendered as `<group>.<name>` in the model-run table header.
#[derive(Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct VariableKey {
    /// The group the variable belongs to (e.g. `price`)
    pub group: Rc<str>,
    /// The variable name, matching a scalar parameter name
    pub name: Rc<str>,
}

impl VariableKey {
    /// Create a new [`VariableKey`]
    pub fn new(group: &str, name: &str) -> Self {
        Self {
            group: Rc::from(group),
            name: Rc::from(name),
        }
    }

    /// Parse a `<group>.<name>` column label
    pub fn parse(label: &str) -> Option<Self> {
        let (group, name) = label.split_once('.')?;
        if group.is_empty() || name.is_empty() {
            return None;
        }

        Some(Self::new(group, name))
    }
}

impl fmt::Display for VariableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}
