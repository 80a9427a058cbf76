// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Recording test doubles for the runtime traits.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stagegraph::{
    Backend, DynamicLinks, Error, PipelineControl, Property, PropertyValue, Result,
};

/// Ensures logging is initialized only once across all tests of a binary.
static LOG_ONCE: std::sync::Once = std::sync::Once::new();

/// Installs the fmt subscriber (respects `RUST_LOG`).
pub fn setup_logging() {
    LOG_ONCE.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::builder()
                    .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .with_test_writer()
            .init();
    });
}

/// One call made on [`FakeBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create { type_id: String, name: String },
    Add(String),
    SetProperty { stage: String, name: String, value: PropertyValue },
    SetStageProperty { stage: String, name: String, value: String },
    RequestPad { stage: String, pad: String },
    Link {
        upstream: String,
        upstream_pad: Option<String>,
        downstream: String,
        downstream_pad: Option<String>,
    },
    SetPadProperty { stage: String, pad: String, name: String },
    Watch(String),
}

/// Backend that records calls instead of creating anything. Stages are
/// their names.
#[derive(Default)]
pub struct FakeBackend {
    /// Plugin types reported as unavailable.
    pub missing_types: Vec<String>,
    /// `(upstream, downstream)` pairs whose link fails.
    pub rejected_links: Vec<(String, String)>,
    pub calls: RefCell<Vec<Call>>,
    pub watches: RefCell<Vec<(String, Arc<Mutex<DynamicLinks>>)>>,
    pad_counters: RefCell<BTreeMap<(String, String), usize>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without(types: &[&str]) -> Self {
        FakeBackend {
            missing_types: types.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Position of the first call matching `pred`.
    pub fn position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls.borrow().iter().position(pred)
    }

    /// Position of the last call matching `pred`.
    pub fn last_position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls.borrow().iter().rposition(pred)
    }

    pub fn links(&self) -> Vec<(String, String)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::Link {
                    upstream,
                    downstream,
                    ..
                } => Some((upstream.clone(), downstream.clone())),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl Backend for FakeBackend {
    type Stage = String;

    fn create_stage(&mut self, type_id: &str, name: &str) -> Result<String> {
        if self.missing_types.iter().any(|t| t == type_id) {
            return Err(Error::StageCreation {
                name: name.to_owned(),
                type_id: type_id.to_owned(),
            });
        }
        self.record(Call::Create {
            type_id: type_id.to_owned(),
            name: name.to_owned(),
        });
        Ok(name.to_owned())
    }

    fn add_stage(&mut self, stage: &String) -> Result<()> {
        self.record(Call::Add(stage.clone()));
        Ok(())
    }

    fn set_property(&self, stage: &String, property: &Property) -> Result<()> {
        self.record(Call::SetProperty {
            stage: stage.clone(),
            name: property.name.clone(),
            value: property.value.clone(),
        });
        Ok(())
    }

    fn set_stage_property(&self, stage: &String, name: &str, value: &String) -> Result<()> {
        self.record(Call::SetStageProperty {
            stage: stage.clone(),
            name: name.to_owned(),
            value: value.clone(),
        });
        Ok(())
    }

    fn request_pad(&self, stage: &String, template: &str) -> Result<String> {
        let mut counters = self.pad_counters.borrow_mut();
        let counter = counters
            .entry((stage.clone(), template.to_owned()))
            .or_default();
        let pad = template.replace("%u", &counter.to_string());
        *counter += 1;
        self.record(Call::RequestPad {
            stage: stage.clone(),
            pad: pad.clone(),
        });
        Ok(pad)
    }

    fn link(
        &self,
        upstream: &String,
        upstream_pad: Option<&str>,
        downstream: &String,
        downstream_pad: Option<&str>,
    ) -> Result<()> {
        if self
            .rejected_links
            .iter()
            .any(|(up, down)| up == upstream && down == downstream)
        {
            return Err(Error::Link {
                upstream: upstream.clone(),
                downstream: downstream.clone(),
                reason: "incompatible caps".to_owned(),
            });
        }
        self.record(Call::Link {
            upstream: upstream.clone(),
            upstream_pad: upstream_pad.map(str::to_owned),
            downstream: downstream.clone(),
            downstream_pad: downstream_pad.map(str::to_owned),
        });
        Ok(())
    }

    fn set_pad_property(&self, stage: &String, pad: &str, property: &Property) -> Result<()> {
        self.record(Call::SetPadProperty {
            stage: stage.clone(),
            pad: pad.to_owned(),
            name: property.name.clone(),
        });
        Ok(())
    }

    fn watch_dynamic_pads(
        &self,
        producer: &String,
        links: Arc<Mutex<DynamicLinks>>,
    ) -> Result<()> {
        self.record(Call::Watch(producer.clone()));
        self.watches.borrow_mut().push((producer.clone(), links));
        Ok(())
    }
}

/// Pipeline double counting the calls the controller makes.
#[derive(Debug, Default)]
pub struct FakePipeline {
    /// Answer to the state query.
    pub reports_playing: bool,
    /// Whether end-of-stream injection is refused.
    pub refuses_eos: bool,
    /// Whether starting fails.
    pub start_fails: bool,
    pub starts: Cell<usize>,
    pub eos_sent: Cell<usize>,
    pub stops: Cell<usize>,
    pub state_queries: Cell<usize>,
}

impl FakePipeline {
    pub fn playing() -> Self {
        FakePipeline {
            reports_playing: true,
            ..Default::default()
        }
    }
}

impl PipelineControl for FakePipeline {
    fn start(&self) -> Result<()> {
        if self.start_fails {
            return Err(Error::Runtime("state change to playing failed".to_owned()));
        }
        self.starts.set(self.starts.get() + 1);
        Ok(())
    }

    fn is_playing(&self, _timeout: Duration) -> bool {
        self.state_queries.set(self.state_queries.get() + 1);
        self.reports_playing
    }

    fn send_eos(&self) -> bool {
        self.eos_sent.set(self.eos_sent.get() + 1);
        !self.refuses_eos
    }

    fn stop(&self) {
        self.stops.set(self.stops.get() + 1);
    }
}
