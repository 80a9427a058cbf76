// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Property values carried by stage and pad descriptions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A declarative value for one stage or pad property.
///
/// Every variant except [`PropertyValue::Stage`] has a canonical text form
/// (see [`PropertyValue::serialize`]) that the media runtime deserializes
/// against the property's declared type, so an enum property can be given
/// either its nick (`"dmabuf"`) or its number (`5`).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    /// Boolean property.
    Bool(bool),
    /// Signed integer property (any width).
    Int(i64),
    /// Unsigned integer property (any width).
    #[serde(rename = "uint")]
    UInt(u64),
    /// Floating point property.
    Double(f64),
    /// String, enum nick or any value given in serialized form.
    Str(String),
    /// Caps in string form, e.g. `video/x-raw,format=NV12`.
    Caps(String),
    /// Structure in string form, e.g. `QNNExternalDelegate,backend_type=htp;`.
    Structure(String),
    /// Fraction such as a framerate.
    Fraction {
        /// Numerator.
        numerator: i32,
        /// Denominator.
        denominator: i32,
    },
    /// Two-element integer array (`<x, y>`), used for compositor geometry.
    Point {
        /// First element.
        x: i32,
        /// Second element.
        y: i32,
    },
    /// Another stage of the same graph, set as an object-valued property.
    ///
    /// The referenced stage is embedded: it is created and configured but
    /// not added to the graph nor linked.
    Stage(String),
}

impl PropertyValue {
    /// Text form understood by the runtime's value deserializer.
    ///
    /// Returns `None` for [`PropertyValue::Stage`], which has no text form.
    pub fn serialize(&self) -> Option<String> {
        let text = match self {
            PropertyValue::Bool(v) => v.to_string(),
            PropertyValue::Int(v) => v.to_string(),
            PropertyValue::UInt(v) => v.to_string(),
            PropertyValue::Double(v) => v.to_string(),
            PropertyValue::Str(v) | PropertyValue::Caps(v) | PropertyValue::Structure(v) => {
                v.clone()
            }
            PropertyValue::Fraction {
                numerator,
                denominator,
            } => format!("{}/{}", numerator, denominator),
            PropertyValue::Point { x, y } => format!("<{}, {}>", x, y),
            PropertyValue::Stage(_) => return None,
        };
        Some(text)
    }

    /// Name of the referenced stage, for [`PropertyValue::Stage`].
    pub fn stage_ref(&self) -> Option<&str> {
        match self {
            PropertyValue::Stage(name) => Some(name.as_str()),
            _ => None,
        }
    }

    /// Caps value.
    pub fn caps(caps: impl Into<String>) -> Self {
        PropertyValue::Caps(caps.into())
    }

    /// Structure value.
    pub fn structure(structure: impl Into<String>) -> Self {
        PropertyValue::Structure(structure.into())
    }

    /// Reference to another stage.
    pub fn stage(name: impl Into<String>) -> Self {
        PropertyValue::Stage(name.into())
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.serialize() {
            Some(text) => f.write_str(&text),
            None => write!(f, "<stage {}>", self.stage_ref().unwrap_or_default()),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Int(v.into())
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<u32> for PropertyValue {
    fn from(v: u32) -> Self {
        PropertyValue::UInt(v.into())
    }
}

impl From<u64> for PropertyValue {
    fn from(v: u64) -> Self {
        PropertyValue::UInt(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Double(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Str(v.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Str(v)
    }
}

impl From<&String> for PropertyValue {
    fn from(v: &String) -> Self {
        PropertyValue::Str(v.clone())
    }
}

/// One named property assignment.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Property {
    /// Property name as declared by the plugin.
    pub name: String,
    /// Value to assign.
    pub value: PropertyValue,
}

impl Property {
    /// Creates a property assignment.
    pub fn new(name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        Property {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_forms() {
        assert_eq!(PropertyValue::from(true).serialize().unwrap(), "true");
        assert_eq!(PropertyValue::from(5).serialize().unwrap(), "5");
        assert_eq!(PropertyValue::from(75.5).serialize().unwrap(), "75.5");
        assert_eq!(
            PropertyValue::Point { x: 960, y: 540 }.serialize().unwrap(),
            "<960, 540>"
        );
        assert_eq!(
            PropertyValue::Fraction {
                numerator: 30,
                denominator: 1
            }
            .serialize()
            .unwrap(),
            "30/1"
        );
        assert_eq!(PropertyValue::stage("waylandsink").serialize(), None);
    }
}
