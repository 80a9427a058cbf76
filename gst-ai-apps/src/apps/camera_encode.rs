// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Camera to H.264 MP4 recording.

use std::path::PathBuf;

use clap::Args;
use stagegraph::settings::require_writable_location;
use stagegraph::{GraphSpec, Result};

use super::{CameraFormatArgs, Source, add_file_writer};

/// Recording written when `--output` is not given.
pub const DEFAULT_OUTPUT: &str = "/opt/data/recording.mp4";

/// Options of the `camera-encode` demo.
#[derive(Debug, Clone, Args)]
pub struct CameraEncodeArgs {
    /// Camera id
    #[arg(short, long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=1))]
    pub camera: u32,

    #[command(flatten)]
    pub format: CameraFormatArgs,

    /// Output file
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,
}

impl CameraEncodeArgs {
    /// Validates the options and describes the pipeline.
    pub fn graph(&self) -> Result<GraphSpec> {
        require_writable_location(&self.output)?;
        let caps = self.format.caps()?;

        let mut graph = GraphSpec::new("camera-encode");
        graph.stage("queue", "queue0");
        Source::Camera(self.camera).add_to(&mut graph, &caps, None, "queue0");
        add_file_writer(&mut graph, "queue0", &self.output);
        Ok(graph)
    }
}
