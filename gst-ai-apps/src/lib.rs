// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! # gst-ai-apps
//!
//! Camera, encode and on-device inference demos running on GStreamer.
//!
//! Every demo is a [`stagegraph::GraphSpec`] built from command-line options.
//! This crate provides the GStreamer side of the contract:
//!
//! - [`GstBackend`]: creates elements, sets properties from their text form,
//!   requests pads, links, and routes pads announced by demuxers and RTSP
//!   sources
//! - [`GstPipeline`]: starts, drains and stops a `gst::Pipeline`
//! - [`MainLoopRunner`]: one GLib main loop per process, with a SIGINT
//!   source, a bus watch per pipeline and a drain timer
//!
//! ## GStreamer Concepts (for non-GStreamer developers)
//! - **Element**: a processing unit (source, filter or sink); one per stage
//! - **Pad**: an element's input or output; linked pairwise
//! - **Request pad**: a pad created on demand from a template (`sink_%u`)
//! - **Sometimes pad**: a pad the element adds at runtime (`video_0` on a
//!   demuxer), reported through the `pad-added` signal
//! - **Bus**: the pipeline's message queue (errors, warnings, end of stream)

pub mod apps;
pub mod backend;
pub mod cli;
pub mod runner;

pub use backend::{GstBackend, GstPipeline};
pub use runner::MainLoopRunner;

/// Installs the fmt subscriber with an INFO default, respecting `RUST_LOG`.
///
/// GStreamer's own debug output stays under `GST_DEBUG`.
pub fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();
}
