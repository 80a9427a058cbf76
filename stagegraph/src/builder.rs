// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Instantiation of a [`GraphSpec`] on a media runtime.
//!
//! The runtime is abstracted by [`Backend`]. [`GraphBuilder::build`] drives it
//! in a fixed order:
//!
//! 1. validate the description,
//! 2. create every stage, failing on the first unavailable type,
//! 3. apply stage properties,
//! 4. add every non-embedded stage to the graph,
//! 5. link the chains: static pads immediately, pads of dynamic producers
//!    through a [`DynamicLinks`] route,
//! 6. watch every dynamic producer that has routes.
//!
//! Any failure aborts the build. Nothing is retried and the partially built
//! graph is dropped by the caller.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::dispatch::{DynamicLinks, dynamic_pad_pattern};
use crate::error::{Error, Result};
use crate::graph::{Endpoint, GraphSpec, PadSpec, Property, PropertyValue};

/// Construction, linking and property-setting primitives of a media runtime.
pub trait Backend {
    /// Handle to one created stage.
    type Stage: Clone;

    /// Creates a stage of plugin type `type_id` named `name`.
    ///
    /// Fails with [`Error::StageCreation`] when the type is unavailable.
    fn create_stage(&mut self, type_id: &str, name: &str) -> Result<Self::Stage>;

    /// Adds a created stage to the graph.
    fn add_stage(&mut self, stage: &Self::Stage) -> Result<()>;

    /// Sets a value property on a stage.
    fn set_property(&self, stage: &Self::Stage, property: &Property) -> Result<()>;

    /// Sets an object-valued property of `stage` to another stage.
    fn set_stage_property(&self, stage: &Self::Stage, name: &str, value: &Self::Stage)
    -> Result<()>;

    /// Allocates a new pad from `template` and returns its name.
    fn request_pad(&self, stage: &Self::Stage, template: &str) -> Result<String>;

    /// Links `upstream` to `downstream`. A `None` pad lets the runtime pick
    /// a compatible one.
    fn link(
        &self,
        upstream: &Self::Stage,
        upstream_pad: Option<&str>,
        downstream: &Self::Stage,
        downstream_pad: Option<&str>,
    ) -> Result<()>;

    /// Sets a property on pad `pad` of `stage`.
    fn set_pad_property(&self, stage: &Self::Stage, pad: &str, property: &Property) -> Result<()>;

    /// Routes pads announced later by `producer` through `links`.
    fn watch_dynamic_pads(
        &self,
        producer: &Self::Stage,
        links: Arc<Mutex<DynamicLinks>>,
    ) -> Result<()>;
}

/// Result of a successful build.
#[derive(Debug)]
pub struct BuiltGraph<S> {
    /// Pipeline name.
    pub name: String,

    /// Every created stage by name, embedded stages included.
    pub stages: BTreeMap<String, S>,

    /// Routes waiting for dynamic pads.
    pub links: Arc<Mutex<DynamicLinks>>,
}

impl<S> BuiltGraph<S> {
    /// Looks a stage up by name.
    pub fn stage(&self, name: &str) -> Result<&S> {
        self.stages
            .get(name)
            .ok_or_else(|| Error::UnknownStage(name.to_owned()))
    }
}

/// Drives a [`Backend`] through the construction of one graph.
pub struct GraphBuilder<'a, B: Backend> {
    backend: &'a mut B,
}

impl<'a, B: Backend> GraphBuilder<'a, B> {
    /// Creates a builder on `backend`.
    pub fn new(backend: &'a mut B) -> Self {
        GraphBuilder { backend }
    }

    /// Builds `spec`.
    pub fn build(self, spec: &GraphSpec) -> Result<BuiltGraph<B::Stage>> {
        spec.validate()?;

        let mut stages: BTreeMap<String, B::Stage> = BTreeMap::new();
        let mut types: BTreeMap<&str, &str> = BTreeMap::new();
        for stage in &spec.stages {
            if stages.contains_key(&stage.name) {
                continue;
            }
            debug!("Creating {} ({})", stage.name, stage.type_id);
            let created = self.backend.create_stage(&stage.type_id, &stage.name)?;
            stages.insert(stage.name.clone(), created);
            types.insert(&stage.name, &stage.type_id);
        }

        for stage in &spec.stages {
            let target = lookup(&stages, &stage.name)?;
            for property in &stage.properties {
                match &property.value {
                    PropertyValue::Stage(inner) => {
                        let inner = lookup(&stages, inner)?;
                        self.backend
                            .set_stage_property(target, &property.name, inner)?;
                    }
                    _ => self.backend.set_property(target, property)?,
                }
            }
        }

        let embedded = spec.embedded_stages();
        for name in spec.stage_names() {
            if !embedded.contains(name) {
                let stage = lookup(&stages, name)?;
                self.backend.add_stage(stage)?;
            }
        }

        let mut links = DynamicLinks::new();
        for chain in &spec.chains {
            for (upstream, downstream) in chain.pairs() {
                let upstream_type = types.get(upstream.stage.as_str()).copied().unwrap_or_default();
                match dynamic_pad_pattern(upstream_type) {
                    Some(pattern) => {
                        let pattern = match &upstream.pad {
                            Some(PadSpec::Static(name)) => name.as_str(),
                            Some(PadSpec::Request(template)) => template_prefix(template),
                            None => pattern,
                        };
                        links
                            .register(upstream.stage.clone(), pattern, downstream.clone())
                            .pad_properties
                            .clone_from(&upstream.pad_properties);
                    }
                    None => self.link_static(&stages, upstream, downstream)?,
                }
            }
        }

        let links = Arc::new(Mutex::new(links));
        let producers: Vec<String> = links
            .lock()
            .map_err(|_| Error::Runtime("dynamic link table poisoned".to_owned()))?
            .producers()
            .map(str::to_owned)
            .collect();
        for producer in &producers {
            debug!("Watching {} for new pads", producer);
            let stage = lookup(&stages, producer)?;
            self.backend.watch_dynamic_pads(stage, Arc::clone(&links))?;
        }

        info!(
            "Built graph {} ({} stages, {} dynamic producers)",
            spec.name,
            stages.len(),
            producers.len()
        );

        Ok(BuiltGraph {
            name: spec.name.clone(),
            stages,
            links,
        })
    }

    fn link_static(
        &self,
        stages: &BTreeMap<String, B::Stage>,
        upstream: &Endpoint,
        downstream: &Endpoint,
    ) -> Result<()> {
        let up = lookup(stages, &upstream.stage)?;
        let down = lookup(stages, &downstream.stage)?;

        let up_pad = resolve_pad(&*self.backend, up, upstream)?;
        let down_pad = resolve_pad(&*self.backend, down, downstream)?;

        debug!("Linking {} -> {}", upstream, downstream);
        self.backend
            .link(up, up_pad.as_deref(), down, down_pad.as_deref())?;

        apply_pad_properties(&*self.backend, up, up_pad.as_deref(), upstream)?;
        apply_pad_properties(&*self.backend, down, down_pad.as_deref(), downstream)
    }
}

/// Fixed part of a pad template: `audio_%u` matches pads containing `audio_`.
fn template_prefix(template: &str) -> &str {
    template.split('%').next().unwrap_or(template)
}

fn lookup<'s, S>(stages: &'s BTreeMap<String, S>, name: &str) -> Result<&'s S> {
    stages
        .get(name)
        .ok_or_else(|| Error::UnknownStage(name.to_owned()))
}

/// Pad name to link at `endpoint`, requesting a new pad if needed.
pub fn resolve_pad<B: Backend + ?Sized>(
    backend: &B,
    stage: &B::Stage,
    endpoint: &Endpoint,
) -> Result<Option<String>> {
    match &endpoint.pad {
        None => Ok(None),
        Some(PadSpec::Static(name)) => Ok(Some(name.clone())),
        Some(PadSpec::Request(template)) => backend.request_pad(stage, template).map(Some),
    }
}

/// Applies the pad properties of `endpoint` to the pad it was linked on.
pub fn apply_pad_properties<B: Backend + ?Sized>(
    backend: &B,
    stage: &B::Stage,
    pad: Option<&str>,
    endpoint: &Endpoint,
) -> Result<()> {
    if endpoint.pad_properties.is_empty() {
        return Ok(());
    }
    let pad = pad.ok_or_else(|| {
        Error::config(format!(
            "pad properties on \"{}\" need an explicit pad",
            endpoint
        ))
    })?;
    for property in &endpoint.pad_properties {
        backend.set_pad_property(stage, pad, property)?;
    }
    Ok(())
}
