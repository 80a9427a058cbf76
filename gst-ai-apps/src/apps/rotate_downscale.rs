// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Camera recording rotated and downscaled on the way to the encoder.

use std::path::PathBuf;

use clap::Args;
use stagegraph::settings::{CameraCaps, Framerate, require_writable_location};
use stagegraph::{GraphSpec, PropertyValue, Result};

use super::{Source, add_file_writer};

/// Recording written when `--output` is not given.
pub const DEFAULT_OUTPUT: &str = "/opt/data/test.mp4";

/// Options of the `camera-rotate-downscale` demo.
#[derive(Debug, Clone, Args)]
pub struct RotateDownscaleArgs {
    /// Camera id
    #[arg(short, long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=1))]
    pub camera: u32,

    /// Rotation applied by the transform
    #[arg(short, long, default_value = "90CW", value_parser = ["none", "90CW", "90CCW", "180"])]
    pub rotate: String,

    /// Width after the transform
    #[arg(short = 'W', long, default_value_t = 480)]
    pub width: u32,

    /// Height after the transform
    #[arg(short = 'H', long, default_value_t = 640)]
    pub height: u32,

    /// Output file
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,
}

impl RotateDownscaleArgs {
    /// Validates the options and describes the pipeline.
    pub fn graph(&self) -> Result<GraphSpec> {
        require_writable_location(&self.output)?;
        let camera_caps = CameraCaps::new(1920, 1080, Framerate::default())?.uncompressed();
        let scaled = CameraCaps::new(self.width, self.height, Framerate::default())?;

        let mut graph = GraphSpec::new("camera-rotate-downscale");
        graph.stage("queue", "queue0");
        graph.stage("qtivtransform", "transform").set("rotate", &self.rotate);
        graph.stage("capsfilter", "transform-caps").set(
            "caps",
            PropertyValue::caps(format!(
                "video/x-raw(memory:GBM),width={},height={},colorimetry=bt709",
                scaled.width, scaled.height
            )),
        );
        graph.stage("queue", "queue1");

        Source::Camera(self.camera).add_to(&mut graph, &camera_caps, None, "queue0");
        graph.chain(["queue0", "transform", "transform-caps", "queue1"]);
        add_file_writer(&mut graph, "queue1", &self.output);
        if let Some(encparse) = graph.find_mut("encparse") {
            encparse.set("config-interval", 1);
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: RotateDownscaleArgs,
    }

    #[test]
    fn transform_sits_between_camera_and_encoder() {
        let output = std::env::temp_dir().join("rotated.mp4");
        let args = TestCli::try_parse_from([
            "test",
            "--rotate",
            "90CCW",
            "--output",
            output.to_str().unwrap(),
        ])
        .unwrap()
        .args;
        let graph = args.graph().unwrap();
        graph.validate().unwrap();

        assert_eq!(
            graph.find("transform").and_then(|s| s.get("rotate")),
            Some(&PropertyValue::from("90CCW"))
        );
        assert_eq!(
            graph.find("transform-caps").and_then(|s| s.get("caps")),
            Some(&PropertyValue::caps(
                "video/x-raw(memory:GBM),width=480,height=640,colorimetry=bt709"
            ))
        );
        let stages: Vec<&str> = graph.chains[1]
            .endpoints
            .iter()
            .map(|endpoint| endpoint.stage.as_str())
            .collect();
        assert_eq!(stages, ["queue0", "transform", "transform-caps", "queue1"]);
    }

    #[test]
    fn unknown_rotation_is_a_usage_error() {
        assert!(TestCli::try_parse_from(["test", "--rotate", "45"]).is_err());
    }

    #[test]
    fn zero_size_is_rejected() {
        let args = TestCli::try_parse_from([
            "test",
            "-W",
            "0",
            "--output",
            std::env::temp_dir().join("rotated.mp4").to_str().unwrap(),
        ])
        .unwrap()
        .args;
        assert!(args.graph().unwrap_err().is_configuration());
    }
}
