// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! # stagegraph
//!
//! Declarative media pipeline graphs and the lifecycle that runs them.
//!
//! ## Overview
//!
//! A pipeline is a set of named stages (plugin instances) connected by link
//! chains. This crate describes such a pipeline as plain data, checks it,
//! instantiates it on a media runtime and drives it from start to a clean
//! shutdown. It does not depend on any media framework: the runtime is
//! reached through the [`Backend`] and [`PipelineControl`] traits.
//!
//! ### Key Concepts
//!
//! - **Stage**: a named plugin instance with declarative properties ([`StageSpec`])
//! - **Link chain**: stages linked pairwise in data-flow order ([`LinkChain`])
//! - **Dynamic producer**: a stage that announces its source pads at runtime
//!   (demuxers, RTSP sources); links out of it go through [`DynamicLinks`]
//! - **Drain**: on interrupt, one end-of-stream is injected so that muxers
//!   finalize their output before the pipeline stops
//!
//! ## Architecture
//!
//! ```text
//! GraphSpec ──validate──► GraphBuilder<Backend> ──► BuiltGraph
//!                                 │                     │
//!                                 └─► DynamicLinks ◄────┘ (pad watches)
//!
//! Controller<PipelineControl>:  Stopped ─► Playing ─► Draining ─► Finished
//!
//! session::launch(Runner, [GraphSpec]) ─► exit code
//! ```
//!
//! ## Example
//!
//! ```
//! use stagegraph::{GraphSpec, PropertyValue, RtspEndpoint};
//!
//! # fn main() -> Result<(), stagegraph::Error> {
//! let server: RtspEndpoint = "rtsp://127.0.0.1:8900/live".parse()?;
//!
//! let mut graph = GraphSpec::new("rtsp-in");
//! graph.stage("rtspsrc", "rtspsrc").set("location", server.to_string());
//! graph.stage("rtph264depay", "depay");
//! graph
//!     .stage("capsfilter", "h264caps")
//!     .set("caps", PropertyValue::caps("video/x-h264,colorimetry=bt709"));
//! graph.stage("fakesink", "sink");
//! graph.chain(["rtspsrc", "depay", "h264caps", "sink"]);
//! graph.validate()?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod dispatch;
mod error;
mod lifecycle;
mod rtsp;

pub mod config;
pub mod graph;
pub mod session;
pub mod settings;

pub use builder::{Backend, BuiltGraph, GraphBuilder, apply_pad_properties, resolve_pad};
pub use config::{DisplayEnvironment, LifecycleConfig};
pub use dispatch::{DYNAMIC_PRODUCERS, Dispatch, DynamicLinks, Route, dynamic_pad_pattern};
pub use error::{Error, Result};
pub use graph::{Endpoint, GraphSpec, LinkChain, PadSpec, Property, PropertyValue, StageSpec};
pub use lifecycle::{
    BusEvent, Controller, EXIT_DRAIN_TIMEOUT, EXIT_FAILURE, EXIT_INTERRUPTED, EXIT_SUCCESS,
    LifecycleState, LoopAction, Outcome, PipelineControl,
};
pub use rtsp::RtspEndpoint;
pub use session::{Runner, launch};
