// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! GStreamer implementation of the graph construction and pipeline control
//! traits.
//!
//! Property values arrive in their text form and are deserialized against the
//! property's own type, the way `gst-launch-1.0` does it. This makes enum
//! nicks, caps, structures and value arrays (`<x, y>`) work without any
//! per-plugin knowledge.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gst::prelude::*;
use gstreamer as gst;
use stagegraph::{
    Backend, Dispatch, DynamicLinks, Endpoint, Error, PadSpec, PipelineControl, Property, Result,
};
use tracing::{debug, info, warn};

/// Builds one `gst::Pipeline`. Stages are elements.
#[derive(Debug)]
pub struct GstBackend {
    pipeline: gst::Pipeline,
}

impl GstBackend {
    /// Creates an empty pipeline named `name`.
    pub fn new(name: &str) -> Self {
        GstBackend {
            pipeline: gst::Pipeline::with_name(name),
        }
    }

    /// The pipeline being built.
    pub fn pipeline(&self) -> &gst::Pipeline {
        &self.pipeline
    }

    /// Hands the built pipeline over to its controller.
    pub fn into_pipeline(self) -> GstPipeline {
        GstPipeline {
            pipeline: self.pipeline,
        }
    }
}

impl Backend for GstBackend {
    type Stage = gst::Element;

    fn create_stage(&mut self, type_id: &str, name: &str) -> Result<gst::Element> {
        gst::ElementFactory::make(type_id)
            .name(name)
            .build()
            .map_err(|_| Error::StageCreation {
                name: name.to_owned(),
                type_id: type_id.to_owned(),
            })
    }

    fn add_stage(&mut self, stage: &gst::Element) -> Result<()> {
        self.pipeline.add(stage).map_err(|err| {
            Error::Runtime(format!(
                "Unable to add {} to {}: {}",
                stage.name(),
                self.pipeline.name(),
                err
            ))
        })
    }

    fn set_property(&self, stage: &gst::Element, property: &Property) -> Result<()> {
        set_object_property(stage, &stage.name(), property)
    }

    fn set_stage_property(
        &self,
        stage: &gst::Element,
        name: &str,
        value: &gst::Element,
    ) -> Result<()> {
        let target = stage.name();
        let pspec = writable_pspec(stage, &target, name)?;
        if !value.type_().is_a(pspec.value_type()) {
            return Err(Error::property(
                target.as_str(),
                name,
                format!(
                    "{} is a {}, expected a {}",
                    value.name(),
                    value.type_().name(),
                    pspec.value_type().name()
                ),
            ));
        }
        debug!("Setting {}.{} = {}", target, name, value.name());
        stage.set_property_from_value(name, &value.to_value());
        Ok(())
    }

    fn request_pad(&self, stage: &gst::Element, template: &str) -> Result<String> {
        stage
            .request_pad_simple(template)
            .map(|pad| pad.name().to_string())
            .ok_or_else(|| Error::PadRequest {
                stage: stage.name().to_string(),
                template: template.to_owned(),
            })
    }

    fn link(
        &self,
        upstream: &gst::Element,
        upstream_pad: Option<&str>,
        downstream: &gst::Element,
        downstream_pad: Option<&str>,
    ) -> Result<()> {
        upstream
            .link_pads(upstream_pad, downstream, downstream_pad)
            .map_err(|err| Error::Link {
                upstream: upstream.name().to_string(),
                downstream: downstream.name().to_string(),
                reason: err.to_string(),
            })
    }

    fn set_pad_property(&self, stage: &gst::Element, pad: &str, property: &Property) -> Result<()> {
        let target = format!("{}.{}", stage.name(), pad);
        let pad = stage
            .static_pad(pad)
            .ok_or_else(|| Error::property(target.as_str(), &property.name, "no such pad"))?;
        set_object_property(&pad, &target, property)
    }

    fn watch_dynamic_pads(
        &self,
        producer: &gst::Element,
        links: Arc<Mutex<DynamicLinks>>,
    ) -> Result<()> {
        producer.connect_pad_added(move |producer, pad| on_pad_added(producer, pad, &links));
        Ok(())
    }
}

/// Looks `name` up on `object` and checks that it can be set after
/// construction.
fn writable_pspec(
    object: &impl IsA<glib::Object>,
    target: &str,
    name: &str,
) -> Result<glib::ParamSpec> {
    let pspec = object
        .find_property(name)
        .ok_or_else(|| Error::property(target, name, "no such property"))?;
    let flags = pspec.flags();
    if !flags.contains(glib::ParamFlags::WRITABLE)
        || flags.contains(glib::ParamFlags::CONSTRUCT_ONLY)
    {
        return Err(Error::property(target, name, "property is not writable"));
    }
    Ok(pspec)
}

fn set_object_property(
    object: &impl IsA<glib::Object>,
    target: &str,
    property: &Property,
) -> Result<()> {
    let pspec = writable_pspec(object, target, &property.name)?;
    let value = property_value(&pspec, target, property)?;
    debug!("Setting {}.{} = {}", target, property.name, property.value);
    object.set_property_from_value(&property.name, &value);
    Ok(())
}

/// Converts `property` to a value of the type `pspec` expects.
fn property_value(
    pspec: &glib::ParamSpec,
    target: &str,
    property: &Property,
) -> Result<glib::Value> {
    let text = property.value.serialize().ok_or_else(|| {
        Error::property(target, &property.name, "a stage reference is not a value")
    })?;
    let value_type = pspec.value_type();
    let value = if value_type == glib::Type::STRING {
        text.to_value()
    } else {
        glib::Value::deserialize(&text, value_type).map_err(|_| {
            Error::property(
                target,
                &property.name,
                format!("\"{}\" is not a valid {}", text, value_type.name()),
            )
        })?
    };
    check_range(pspec, &value).map_err(|reason| Error::property(target, &property.name, reason))?;
    Ok(value)
}

// Out of range values would otherwise abort inside set_property_from_value.
fn check_range(pspec: &glib::ParamSpec, value: &glib::Value) -> core::result::Result<(), String> {
    if let Some(spec) = pspec.downcast_ref::<glib::ParamSpecInt>() {
        within(value.get::<i32>(), spec.minimum(), spec.maximum())
    } else if let Some(spec) = pspec.downcast_ref::<glib::ParamSpecUInt>() {
        within(value.get::<u32>(), spec.minimum(), spec.maximum())
    } else if let Some(spec) = pspec.downcast_ref::<glib::ParamSpecInt64>() {
        within(value.get::<i64>(), spec.minimum(), spec.maximum())
    } else if let Some(spec) = pspec.downcast_ref::<glib::ParamSpecUInt64>() {
        within(value.get::<u64>(), spec.minimum(), spec.maximum())
    } else if let Some(spec) = pspec.downcast_ref::<glib::ParamSpecDouble>() {
        within(value.get::<f64>(), spec.minimum(), spec.maximum())
    } else if let Some(spec) = pspec.downcast_ref::<glib::ParamSpecFloat>() {
        within(value.get::<f32>(), spec.minimum(), spec.maximum())
    } else {
        Ok(())
    }
}

fn within<T, E>(value: core::result::Result<T, E>, min: T, max: T) -> core::result::Result<(), String>
where
    T: PartialOrd + fmt::Display,
{
    match value {
        Ok(value) if value < min || value > max => {
            Err(format!("{} is outside [{}, {}]", value, min, max))
        }
        _ => Ok(()),
    }
}

/// Streaming-thread handler for `pad-added`.
///
/// A failed link is posted as an element error so that the run ends through
/// the bus instead of silently dropping the stream.
fn on_pad_added(producer: &gst::Element, pad: &gst::Pad, links: &Mutex<DynamicLinks>) {
    if pad.direction() != gst::PadDirection::Src {
        return;
    }

    let producer_name = producer.name();
    let pad_name = pad.name();
    let dispatch = match links.lock() {
        Ok(mut links) => links.dispatch(&producer_name, &pad_name),
        Err(_) => {
            warn!("Dynamic link table poisoned, dropping {}.{}", producer_name, pad_name);
            return;
        }
    };

    let Dispatch::Link {
        consumer,
        pad_properties,
    } = dispatch
    else {
        return;
    };
    match link_dynamic_pad(producer, pad, &consumer, &pad_properties) {
        Ok(()) => info!("Linked {}.{} -> {}", producer_name, pad_name, consumer),
        Err(err) => producer.post_error_message(gst::error_msg!(
            gst::StreamError::Failed,
            ("Unable to link pad {}.{}", producer_name, pad_name),
            ["{}", err]
        )),
    }
}

fn link_dynamic_pad(
    producer: &gst::Element,
    pad: &gst::Pad,
    consumer: &Endpoint,
    producer_pad_properties: &[Property],
) -> Result<()> {
    let bin = producer
        .parent()
        .and_then(|parent| parent.downcast::<gst::Bin>().ok())
        .ok_or_else(|| Error::Runtime(format!("{} is not in a bin", producer.name())))?;
    let target = bin
        .by_name(&consumer.stage)
        .ok_or_else(|| Error::UnknownStage(consumer.stage.clone()))?;

    let sink_pad = match &consumer.pad {
        None => target
            .static_pad("sink")
            .or_else(|| target.compatible_pad(pad, None)),
        Some(PadSpec::Static(name)) => target.static_pad(name),
        Some(PadSpec::Request(template)) => target.request_pad_simple(template),
    }
    .ok_or_else(|| Error::PadRequest {
        stage: consumer.stage.clone(),
        template: consumer
            .pad
            .as_ref()
            .map_or("sink", PadSpec::name)
            .to_owned(),
    })?;

    pad.link(&sink_pad).map_err(|err| Error::Link {
        upstream: producer.name().to_string(),
        downstream: consumer.stage.clone(),
        reason: err.to_string(),
    })?;

    let target_name = format!("{}.{}", consumer.stage, sink_pad.name());
    for property in &consumer.pad_properties {
        set_object_property(&sink_pad, &target_name, property)?;
    }
    let source_name = format!("{}.{}", producer.name(), pad.name());
    for property in producer_pad_properties {
        set_object_property(pad, &source_name, property)?;
    }
    Ok(())
}

/// Control handle of one built `gst::Pipeline`.
#[derive(Debug, Clone)]
pub struct GstPipeline {
    pipeline: gst::Pipeline,
}

impl GstPipeline {
    /// Pipeline name.
    pub fn name(&self) -> String {
        self.pipeline.name().to_string()
    }

    /// The pipeline's message bus.
    pub fn bus(&self) -> Result<gst::Bus> {
        self.pipeline
            .bus()
            .ok_or_else(|| Error::Runtime(format!("{} has no bus", self.pipeline.name())))
    }

    /// The underlying pipeline.
    pub fn pipeline(&self) -> &gst::Pipeline {
        &self.pipeline
    }
}

impl PipelineControl for GstPipeline {
    fn start(&self) -> Result<()> {
        self.pipeline
            .set_state(gst::State::Playing)
            .map(|_| ())
            .map_err(|err| {
                Error::Lifecycle(format!(
                    "Unable to set {} to playing: {}",
                    self.pipeline.name(),
                    err
                ))
            })
    }

    fn is_playing(&self, timeout: Duration) -> bool {
        let (result, current, _pending) = self.pipeline.state(bounded_clock_time(timeout));
        result.is_ok() && current == gst::State::Playing
    }

    fn send_eos(&self) -> bool {
        self.pipeline.send_event(gst::event::Eos::new())
    }

    fn stop(&self) {
        if let Err(err) = self.pipeline.set_state(gst::State::Null) {
            warn!("Unable to stop {}: {}", self.pipeline.name(), err);
        }
    }
}

/// `timeout` as a clock time, saturating at the longest finite wait.
fn bounded_clock_time(timeout: Duration) -> gst::ClockTime {
    gst::ClockTime::try_from(timeout).unwrap_or(gst::ClockTime::MAX)
}
