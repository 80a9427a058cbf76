// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Numbered JPEG images shown as a slideshow.

use clap::Args;
use stagegraph::settings::{Framerate, require_file};
use stagegraph::{GraphSpec, PropertyValue, Result};

/// Image sequence read when `--location` is not given.
pub const DEFAULT_LOCATION: &str = "/etc/media/imagefiles_%d.jpg";

/// Options of the `jpeg-decode` demo.
#[derive(Debug, Clone, Args)]
pub struct JpegDecodeArgs {
    /// Image files, `%d` standing for the image number
    #[arg(short = 'i', long, default_value = DEFAULT_LOCATION)]
    pub location: String,

    /// Number of the first image
    #[arg(long, default_value_t = 1)]
    pub start_index: i32,

    /// Image width
    #[arg(short = 'W', long, default_value_t = 1280)]
    pub width: u32,

    /// Image height
    #[arg(short = 'H', long, default_value_t = 720)]
    pub height: u32,

    /// Images per second (N/D)
    #[arg(short = 'F', long, default_value = "2/1")]
    pub framerate: Framerate,
}

impl JpegDecodeArgs {
    /// Path of the first image.
    pub fn first_image(&self) -> String {
        self.location.replacen("%d", &self.start_index.to_string(), 1)
    }

    /// Validates the options and describes the pipeline.
    pub fn graph(&self) -> Result<GraphSpec> {
        require_file(self.first_image())?;

        let mut graph = GraphSpec::new("jpeg-decode");
        graph
            .stage("multifilesrc", "source")
            .set("location", &self.location)
            .set("index", self.start_index);
        graph.stage("capsfilter", "jpeg-caps").set(
            "caps",
            PropertyValue::caps(format!(
                "image/jpeg,width={},height={},framerate={}",
                self.width, self.height, self.framerate
            )),
        );
        graph.stage("jpegdec", "decoder");
        graph.stage("videoconvert", "convert");
        graph.stage("waylandsink", "display").set("fullscreen", true);
        graph.chain(["source", "jpeg-caps", "decoder", "convert", "display"]);
        Ok(graph)
    }
}
