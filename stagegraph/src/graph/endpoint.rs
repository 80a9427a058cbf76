// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Link chain endpoints: a stage, optionally narrowed to one pad.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::property::{Property, PropertyValue};

/// Which pad of a stage an endpoint refers to.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PadSpec {
    /// A pad that exists as soon as the stage is created (`video_0`, `sink`).
    Static(String),
    /// A pad allocated on demand from a template (`sink_%u`, `src_%u`).
    Request(String),
}

impl PadSpec {
    /// Pad name or template name.
    pub fn name(&self) -> &str {
        match self {
            PadSpec::Static(name) | PadSpec::Request(name) => name,
        }
    }
}

/// One element of a link chain.
///
/// The text form is `stage` (the runtime picks compatible pads),
/// `stage.pad` (a static pad) or `stage.template_%u` (a request pad: the
/// template contains a `%`). Only the first and last endpoint of a chain
/// may select a pad.
///
/// In JSON an endpoint is either its text form or an object with `stage`,
/// `pad` and `pad_properties` keys.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(from = "EndpointRepr", into = "EndpointRepr")]
pub struct Endpoint {
    /// Stage name.
    pub stage: String,

    /// Pad selection; `None` lets the runtime choose.
    pub pad: Option<PadSpec>,

    /// Properties set on the pad that ends up linked at this endpoint.
    pub pad_properties: Vec<Property>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum EndpointRepr {
    Text(String),
    Full {
        stage: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pad: Option<PadSpec>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pad_properties: Vec<Property>,
    },
}

impl From<EndpointRepr> for Endpoint {
    fn from(repr: EndpointRepr) -> Self {
        match repr {
            EndpointRepr::Text(text) => Endpoint::from(text.as_str()),
            EndpointRepr::Full {
                stage,
                pad,
                pad_properties,
            } => Endpoint {
                stage,
                pad,
                pad_properties,
            },
        }
    }
}

impl From<Endpoint> for EndpointRepr {
    fn from(endpoint: Endpoint) -> Self {
        let text_round_trips = match &endpoint.pad {
            Some(PadSpec::Request(template)) => template.contains('%'),
            Some(PadSpec::Static(name)) => !name.contains('%'),
            None => true,
        };
        if text_round_trips && endpoint.pad_properties.is_empty() {
            EndpointRepr::Text(endpoint.to_string())
        } else {
            EndpointRepr::Full {
                stage: endpoint.stage,
                pad: endpoint.pad,
                pad_properties: endpoint.pad_properties,
            }
        }
    }
}

impl Endpoint {
    /// Endpoint on `stage` without pad selection.
    pub fn new(stage: impl Into<String>) -> Self {
        Endpoint {
            stage: stage.into(),
            pad: None,
            pad_properties: Vec::new(),
        }
    }

    /// Endpoint on a request pad of `stage`.
    pub fn request(stage: impl Into<String>, template: impl Into<String>) -> Self {
        Endpoint {
            pad: Some(PadSpec::Request(template.into())),
            ..Endpoint::new(stage)
        }
    }

    /// Adds a property for the linked pad.
    pub fn with_pad_property(
        mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.pad_properties.push(Property::new(name, value));
        self
    }
}

impl From<&str> for Endpoint {
    fn from(text: &str) -> Self {
        match text.split_once('.') {
            Some((stage, pad)) if !pad.is_empty() => {
                let pad = if pad.contains('%') {
                    PadSpec::Request(pad.to_owned())
                } else {
                    PadSpec::Static(pad.to_owned())
                };
                Endpoint {
                    pad: Some(pad),
                    ..Endpoint::new(stage)
                }
            }
            Some((stage, _)) => Endpoint::new(stage),
            None => Endpoint::new(text),
        }
    }
}

impl From<String> for Endpoint {
    fn from(text: String) -> Self {
        Endpoint::from(text.as_str())
    }
}

impl From<&String> for Endpoint {
    fn from(text: &String) -> Self {
        Endpoint::from(text.as_str())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pad {
            Some(pad) => write!(f, "{}.{}", self.stage, pad.name()),
            None => f.write_str(&self.stage),
        }
    }
}
