// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Both cameras at once, one pipeline per camera.
//!
//! The two pipelines share the process's main loop and interrupt handler.
//! Side-by-side windows by default, one MP4 per camera with `--record`.

use std::path::PathBuf;

use clap::Args;
use stagegraph::settings::{CameraCaps, require_writable_location};
use stagegraph::{GraphSpec, Result};

use super::{CameraFormatArgs, Source, add_file_writer};

/// Camera ids, primary first.
pub const CAMERAS: [u32; 2] = [0, 1];

/// Size of each camera window.
pub const WINDOW: (i32, i32) = (640, 480);

/// Options of the `multi-camera` demo.
#[derive(Debug, Clone, Args)]
pub struct MultiCameraArgs {
    // Primary camera only; the secondary one keeps the default resolution.
    #[command(flatten)]
    pub format: CameraFormatArgs,

    /// Record to `cam_<id>.mp4` files instead of displaying
    #[arg(long)]
    pub record: bool,

    /// Directory of the recordings
    #[arg(long, default_value = "/opt")]
    pub record_dir: PathBuf,
}

impl MultiCameraArgs {
    /// Validates the options and describes one pipeline per camera.
    pub fn graphs(&self) -> Result<Vec<GraphSpec>> {
        let primary = self.format.caps()?;
        let secondary = CameraCaps::new(
            CameraFormatArgs::default().width,
            CameraFormatArgs::default().height,
            self.format.framerate,
        )?;

        CAMERAS
            .iter()
            .zip([primary, secondary])
            .map(|(&camera, caps)| self.camera_graph(camera, &caps))
            .collect()
    }

    fn camera_graph(&self, camera: u32, caps: &CameraCaps) -> Result<GraphSpec> {
        let mut graph = GraphSpec::new(format!("camera{}", camera));
        let source = Source::Camera(camera);

        if self.record {
            let output = self.record_dir.join(format!("cam_{}.mp4", camera));
            require_writable_location(&output)?;
            graph.stage("queue", "camqueue");
            source.add_to(&mut graph, caps, None, "camqueue");
            add_file_writer(&mut graph, "camqueue", &output);
            if let Some(mux) = graph.find_mut("mux") {
                mux.set("reserved-moov-update-period", 1_000_000u64)
                    .set("reserved-bytes-per-sec", 10_000u32)
                    .set("reserved-max-duration", 1_000_000_000u64);
            }
        } else {
            let x = i32::try_from(camera).unwrap_or_default() * WINDOW.0;
            graph
                .stage("waylandsink", "display")
                .set("x", x)
                .set("y", 0)
                .set("width", WINDOW.0)
                .set("height", WINDOW.1)
                .set("async", false)
                .set("sync", false);
            source.add_to(&mut graph, caps, None, "display");
        }
        Ok(graph)
    }
}
