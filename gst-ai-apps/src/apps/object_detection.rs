// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Object detection with bounding-box overlay.
//!
//! ```text
//! source -> queue0 -> split -> queue1 -> converter -> queue2 -> inference
//!                       |        -> detection -> detcaps -> metamux
//!                       +-> queue3 -----------------------> metamux -> queue4 -> overlay -> sink
//! ```

use std::path::PathBuf;

use clap::Args;
use stagegraph::settings::{MlFramework, QuantConstants, Runtime, Threshold, require_file};
use stagegraph::{Error, GraphSpec, PropertyValue, Result};

use super::{CameraFormatArgs, SinkArgs, SourceArgs};

/// Post-processing module used when none is given.
pub const DEFAULT_MODULE: &str = "yolov8";

/// Maximum number of detections drawn per frame.
pub const DEFAULT_RESULTS: u32 = 10;

/// Caps of the detection metadata branch.
pub const DETECTION_CAPS: &str = "text/x-raw";

/// Options of the `object-detection` demo.
#[derive(Debug, Clone, Args)]
pub struct ObjectDetectionArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub format: CameraFormatArgs,

    /// Inference engine (snpe or tflite)
    #[arg(short = 'f', long)]
    pub ml_framework: MlFramework,

    /// Post-processing module
    #[arg(long, default_value = DEFAULT_MODULE)]
    pub module: String,

    /// Model file
    #[arg(short, long)]
    pub model: PathBuf,

    /// Labels file
    #[arg(short, long)]
    pub labels: PathBuf,

    /// Quantization constants, required with tflite
    #[arg(short = 'k', long)]
    pub constants: Option<QuantConstants>,

    /// Output layers, required with snpe
    #[arg(long, value_delimiter = ',')]
    pub layers: Vec<String>,

    /// Detection threshold in percent
    #[arg(short = 'p', long, default_value = "75")]
    pub threshold: Threshold,

    /// Hardware running the model (cpu, gpu or dsp)
    #[arg(long, default_value = "dsp")]
    pub runtime: Runtime,

    #[command(flatten)]
    pub sink: SinkArgs,
}

impl ObjectDetectionArgs {
    /// Validates the options and describes the pipeline.
    pub fn graph(&self) -> Result<GraphSpec> {
        match self.ml_framework {
            MlFramework::Tflite if self.constants.is_none() => {
                return Err(Error::config("--constants is required with tflite"));
            }
            MlFramework::Snpe if self.layers.is_empty() => {
                return Err(Error::config("--layers is required with snpe"));
            }
            _ => {}
        }
        require_file(&self.model)?;
        require_file(&self.labels)?;
        let source = self.source.source()?;
        let sink = self.sink.sink()?;
        let camera_caps = self.format.caps()?;

        let mut graph = GraphSpec::new("object-detection");
        for index in 0..5 {
            graph.stage("queue", &format!("queue{}", index));
        }
        graph.stage("tee", "split");
        graph.stage("qtimlvconverter", "converter");

        let inference = graph.stage(self.ml_framework.stage_type(), "inference");
        inference.set("model", self.model.display().to_string());
        self.runtime.apply(self.ml_framework, inference);
        if self.ml_framework == MlFramework::Snpe {
            inference.set("layers", layers_value(&self.layers));
        }

        let detection = graph.stage("qtimlvdetection", "detection");
        detection
            .set("threshold", self.threshold)
            .set("results", DEFAULT_RESULTS)
            .set("module", &self.module)
            .set("labels", self.labels.display().to_string());
        if let Some(constants) = &self.constants {
            detection.set("constants", constants);
        }

        graph
            .stage("capsfilter", "detcaps")
            .set("caps", PropertyValue::caps(DETECTION_CAPS));
        graph.stage("qtimetamux", "metamux");
        let overlay = graph.stage("qtioverlay", "overlay");
        if source.is_live() {
            overlay.set("engine", "gles");
        }

        source.add_to(&mut graph, &camera_caps, None, "queue0");
        graph.chain(["queue0", "split"]);
        graph.chain([
            "split",
            "queue1",
            "converter",
            "queue2",
            "inference",
            "detection",
            "detcaps",
            "metamux.data_%u",
        ]);
        graph.chain(["split", "queue3", "metamux.sink"]);
        graph.chain(["metamux", "queue4", "overlay"]);
        sink.add_to(&mut graph, "overlay", source.is_live());

        Ok(graph)
    }
}

/// `<"a", "b">` list form of output layer names.
fn layers_value(layers: &[String]) -> String {
    let quoted: Vec<String> = layers.iter().map(|layer| format!("\"{}\"", layer)).collect();
    format!("<{}>", quoted.join(", "))
}
