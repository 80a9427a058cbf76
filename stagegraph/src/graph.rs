// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Declarative graph descriptions.
//!
//! A [`GraphSpec`] is a table of named stages plus an ordered list of link
//! chains. It carries no runtime objects: it can be built in code, checked
//! with [`GraphSpec::validate`], serialized to JSON, and handed to
//! [`crate::GraphBuilder`] to instantiate it on a backend.
//!
//! ```
//! use stagegraph::GraphSpec;
//!
//! let mut graph = GraphSpec::new("camera-encode");
//! graph.stage("qtiqmmfsrc", "camsrc").set("camera", 0);
//! graph.stage("v4l2h264enc", "encoder").set("capture-io-mode", 5);
//! graph.stage("h264parse", "parser");
//! graph.stage("mp4mux", "mux");
//! graph.stage("filesink", "sink").set("location", "/tmp/out.mp4");
//! graph.chain(["camsrc", "encoder", "parser", "mux", "sink"]);
//!
//! assert!(graph.validate().is_ok());
//! ```

pub mod endpoint;
pub mod property;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use endpoint::{Endpoint, PadSpec};
pub use property::{Property, PropertyValue};

/// Description of one stage.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StageSpec {
    /// Unique name within the graph.
    pub name: String,

    /// Plugin type identifier (element factory name).
    #[serde(rename = "type")]
    pub type_id: String,

    /// Properties, applied in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<Property>,
}

impl StageSpec {
    /// Creates a stage description without properties.
    pub fn new(type_id: impl Into<String>, name: impl Into<String>) -> Self {
        StageSpec {
            name: name.into(),
            type_id: type_id.into(),
            properties: Vec::new(),
        }
    }

    /// Sets a property, replacing an earlier assignment of the same name.
    pub fn set(&mut self, name: &str, value: impl Into<PropertyValue>) -> &mut Self {
        let value = value.into();
        match self.properties.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.value = value,
            None => self.properties.push(Property::new(name, value)),
        }
        self
    }

    /// Value assigned to `name`, if any.
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}

/// An ordered list of endpoints linked pairwise, upstream first.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(transparent)]
pub struct LinkChain {
    /// Endpoints in data-flow order.
    pub endpoints: Vec<Endpoint>,
}

impl LinkChain {
    /// Adjacent `(upstream, downstream)` pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (&Endpoint, &Endpoint)> {
        self.endpoints.windows(2).map(|pair| (&pair[0], &pair[1]))
    }
}

/// A complete pipeline description.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct GraphSpec {
    /// Pipeline name.
    pub name: String,

    /// Stage table. A name may be declared more than once with the same
    /// type; it is created once.
    pub stages: Vec<StageSpec>,

    /// Link chains.
    pub chains: Vec<LinkChain>,
}

impl GraphSpec {
    /// Creates an empty graph.
    pub fn new(name: impl Into<String>) -> Self {
        GraphSpec {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Declares a stage and returns it for configuration.
    ///
    /// Declaring an existing name with the same type returns the existing
    /// description. A different type is recorded as a second declaration so
    /// that [`GraphSpec::validate`] reports the conflict.
    pub fn stage(&mut self, type_id: &str, name: &str) -> &mut StageSpec {
        let position = self
            .stages
            .iter()
            .position(|s| s.name == name && s.type_id == type_id);
        let index = match position {
            Some(index) => index,
            None => {
                self.stages.push(StageSpec::new(type_id, name));
                self.stages.len() - 1
            }
        };
        &mut self.stages[index]
    }

    /// Appends a link chain.
    pub fn chain<I, E>(&mut self, endpoints: I) -> &mut Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Endpoint>,
    {
        self.chains.push(LinkChain {
            endpoints: endpoints.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// First declaration of `name`.
    pub fn find(&self, name: &str) -> Option<&StageSpec> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Mutable access to the first declaration of `name`.
    pub fn find_mut(&mut self, name: &str) -> Option<&mut StageSpec> {
        self.stages.iter_mut().find(|s| s.name == name)
    }

    /// Stage names in declaration order, without repetitions.
    pub fn stage_names(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.stages
            .iter()
            .map(|s| s.name.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }

    /// Stages referenced by another stage's object-valued property.
    pub fn embedded_stages(&self) -> BTreeSet<&str> {
        self.stages
            .iter()
            .flat_map(|s| s.properties.iter())
            .filter_map(|p| p.value.stage_ref())
            .collect()
    }

    /// Checks that the description can be built.
    ///
    /// - every name maps to a single type,
    /// - every chain has at least two endpoints,
    /// - every endpoint and stage-valued property names a declared stage,
    /// - embedded stages are never linked,
    /// - only the ends of a chain select pads.
    pub fn validate(&self) -> Result<()> {
        let mut types: BTreeMap<&str, &str> = BTreeMap::new();
        for stage in &self.stages {
            if stage.name.is_empty() {
                return Err(Error::config("stage with an empty name"));
            }
            if let Some(first) = types.insert(&stage.name, &stage.type_id) {
                if first != stage.type_id {
                    return Err(Error::ConflictingStage {
                        name: stage.name.clone(),
                        first: first.to_owned(),
                        second: stage.type_id.clone(),
                    });
                }
            }
        }

        let embedded = self.embedded_stages();
        if let Some(missing) = embedded.iter().find(|name| !types.contains_key(*name)) {
            return Err(Error::UnknownStage((*missing).to_owned()));
        }

        for (index, chain) in self.chains.iter().enumerate() {
            if chain.endpoints.len() < 2 {
                return Err(Error::ShortChain { index });
            }
            for endpoint in &chain.endpoints {
                if !types.contains_key(endpoint.stage.as_str()) {
                    return Err(Error::UnknownStage(endpoint.stage.clone()));
                }
                if embedded.contains(endpoint.stage.as_str()) {
                    return Err(Error::EmbeddedStageLinked(endpoint.stage.clone()));
                }
            }
            let last = chain.endpoints.len() - 1;
            for endpoint in &chain.endpoints[1..last] {
                if endpoint.pad.is_some() || !endpoint.pad_properties.is_empty() {
                    return Err(Error::config(format!(
                        "chain {} selects a pad on interior stage \"{}\"",
                        index, endpoint
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection_graph() -> GraphSpec {
        let mut graph = GraphSpec::new("detection");
        graph.stage("videotestsrc", "src");
        graph.stage("tee", "split");
        graph.stage("qtimetamux", "metamux");
        graph.stage("qtimlvdetection", "detection");
        graph.stage("waylandsink", "display");
        graph.chain(["src", "split"]);
        graph.chain(["split", "detection", "metamux"]);
        graph.chain(["split", "metamux", "display"]);
        graph
    }

    #[test]
    fn complete_graph_validates() {
        detection_graph().validate().unwrap();
    }

    #[test]
    fn forward_reference_is_rejected() {
        let mut graph = detection_graph();
        graph.chain(["display", "encoder"]);
        match graph.validate() {
            Err(Error::UnknownStage(name)) => assert_eq!(name, "encoder"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn redeclaring_a_stage_is_idempotent() {
        let mut graph = detection_graph();
        graph.stage("tee", "split").set("allow-not-linked", true);
        assert_eq!(graph.stage_names().len(), 5);
        assert_eq!(
            graph.find("split").unwrap().get("allow-not-linked"),
            Some(&PropertyValue::Bool(true))
        );
        graph.validate().unwrap();
    }

    #[test]
    fn conflicting_types_are_rejected() {
        let mut graph = detection_graph();
        graph.stage("queue", "split");
        assert!(matches!(
            graph.validate(),
            Err(Error::ConflictingStage { .. })
        ));
    }

    #[test]
    fn short_chain_is_rejected() {
        let mut graph = detection_graph();
        graph.chain(["display"]);
        assert!(matches!(
            graph.validate(),
            Err(Error::ShortChain { index: 3 })
        ));
    }

    #[test]
    fn embedded_stage_cannot_be_linked() {
        let mut graph = GraphSpec::new("fps");
        graph.stage("waylandsink", "waylandsink");
        graph
            .stage("fpsdisplaysink", "fpsdisplaysink")
            .set("video-sink", PropertyValue::stage("waylandsink"));
        graph.stage("videotestsrc", "src");
        graph.chain(["src", "fpsdisplaysink"]);
        graph.validate().unwrap();

        graph.chain(["src", "waylandsink"]);
        assert!(matches!(
            graph.validate(),
            Err(Error::EmbeddedStageLinked(name)) if name == "waylandsink"
        ));
    }

    #[test]
    fn interior_pads_are_rejected() {
        let mut graph = detection_graph();
        graph.chain(["src", "split.src_%u", "display"]);
        assert!(matches!(graph.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn set_replaces_previous_value() {
        let mut stage = StageSpec::new("queue", "queue0");
        stage.set("max-size-buffers", 2).set("max-size-buffers", 4);
        assert_eq!(stage.properties.len(), 1);
        assert_eq!(stage.get("max-size-buffers"), Some(&PropertyValue::Int(4)));
    }
}
