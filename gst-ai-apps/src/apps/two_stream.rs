// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! One camera, two streams: a full resolution recording and a small
//! stream running object detection on the display.
//!
//! ```text
//! camsrc.video_0 (preview) -> caps -> queue0 -> encoder ... -> filesink
//! camsrc.video_1 (video) -> caps -> queue1 -> split -> queue2 -> metamux -> queue3 -> overlay -> display
//!                                               +-> converter -> inference -> detection -> metamux
//! ```

use std::path::PathBuf;

use clap::Args;
use stagegraph::settings::{
    CameraCaps, Framerate, MlFramework, QuantConstants, Runtime, Threshold, require_file,
    require_writable_location,
};
use stagegraph::{Endpoint, GraphSpec, PropertyValue, Result};

use super::add_file_writer;
use super::object_detection::DETECTION_CAPS;

/// Recording written when `--output` is not given.
pub const DEFAULT_OUTPUT: &str = "/opt/data/test.mp4";

/// Size of the detection stream.
pub const DETECTION_SIZE: (u32, u32) = (640, 360);

/// Options of the `camera-two-stream` demo.
#[derive(Debug, Clone, Args)]
pub struct TwoStreamArgs {
    /// Camera id
    #[arg(short, long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=1))]
    pub camera: u32,

    /// Width of the recorded stream
    #[arg(short = 'W', long, default_value_t = 1920)]
    pub width: u32,

    /// Height of the recorded stream
    #[arg(short = 'H', long, default_value_t = 1080)]
    pub height: u32,

    /// Recording
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Detection model (TFLite)
    #[arg(short, long, default_value = "/opt/data/YoloV8N_Detection_Quantized.tflite")]
    pub model: PathBuf,

    /// Detection labels
    #[arg(short, long, default_value = "/opt/data/yolov8n.labels")]
    pub labels: PathBuf,

    /// Detection constants
    #[arg(
        short = 'k',
        long,
        default_value = "YoloV8,q-offsets=<-107.0,-128.0,0.0>,q-scales=<3.093529462814331,0.00390625,1.0>;"
    )]
    pub constants: QuantConstants,

    /// Detection threshold in percent
    #[arg(short = 'p', long, default_value = "75")]
    pub threshold: Threshold,
}

impl TwoStreamArgs {
    /// Validates the options and describes the pipeline.
    pub fn graph(&self) -> Result<GraphSpec> {
        require_file(&self.model)?;
        require_file(&self.labels)?;
        require_writable_location(&self.output)?;
        let recorded = CameraCaps::new(self.width, self.height, Framerate::default())?;
        let detected =
            CameraCaps::new(DETECTION_SIZE.0, DETECTION_SIZE.1, Framerate::default())?.uncompressed();

        let mut graph = GraphSpec::new("camera-two-stream");
        graph.stage("qtiqmmfsrc", "camsrc").set("camera", self.camera);
        graph
            .stage("capsfilter", "preview-caps")
            .set("caps", PropertyValue::caps(format!("{},colorimetry=bt709", recorded)));
        graph.stage("capsfilter", "video-caps").set("caps", &detected);
        for index in 0..4 {
            graph.stage("queue", &format!("queue{}", index));
        }

        graph.chain([
            Endpoint::request("camsrc", "video_%u").with_pad_property("type", "preview"),
            Endpoint::from("preview-caps"),
            Endpoint::from("queue0"),
        ]);
        add_file_writer(&mut graph, "queue0", &self.output);
        if let Some(encparse) = graph.find_mut("encparse") {
            encparse.set("config-interval", 1);
        }

        graph.chain([
            Endpoint::request("camsrc", "video_%u").with_pad_property("type", "video"),
            Endpoint::from("video-caps"),
            Endpoint::from("queue1"),
        ]);
        graph.stage("tee", "split");
        graph.stage("qtimlvconverter", "converter");
        graph.stage("queue", "inference-queue");
        let inference = graph.stage(MlFramework::Tflite.stage_type(), "inference");
        inference.set("model", self.model.display().to_string());
        Runtime::Dsp.apply(MlFramework::Tflite, inference);
        graph.stage("queue", "detection-queue");
        graph
            .stage("qtimlvdetection", "detection")
            .set("threshold", self.threshold)
            .set("results", 4u32)
            .set("module", "yolov8")
            .set("constants", &self.constants)
            .set("labels", self.labels.display().to_string());
        graph
            .stage("capsfilter", "detcaps")
            .set("caps", PropertyValue::caps(DETECTION_CAPS));
        graph.stage("queue", "metadata-queue");
        graph.stage("qtimetamux", "metamux");
        graph.stage("qtioverlay", "overlay").set("engine", "gles");
        graph.stage("queue", "display-queue");
        graph
            .stage("waylandsink", "display")
            .set("sync", false)
            .set("fullscreen", true);

        graph.chain(["queue1", "split", "queue2", "metamux.sink"]);
        graph.chain([
            "split",
            "converter",
            "inference-queue",
            "inference",
            "detection-queue",
            "detection",
            "detcaps",
            "metadata-queue",
            "metamux.data_%u",
        ]);
        graph.chain(["metamux", "queue3", "overlay", "display-queue", "display"]);

        Ok(graph)
    }
}
