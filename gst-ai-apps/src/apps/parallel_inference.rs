// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Four models on one stream, composed in a 2x2 grid.
//!
//! Every branch feeds the composer twice: the untouched video as the tile
//! background, and the post-processed result drawn over it. Object
//! detection, classification, pose detection and segmentation run side by
//! side on the same frames.

use std::path::PathBuf;

use clap::Args;
use stagegraph::settings::{
    CameraCaps, Framerate, MlFramework, QuantConstants, Runtime, require_file,
};
use stagegraph::{Endpoint, GraphSpec, PropertyValue, Result};

use super::SourceArgs;

/// Delegate options tuned for concurrent models on the HTP.
pub const HTP_DELEGATE_OPTIONS: &str = "QNNExternalDelegate,backend_type=htp,htp_device_id=(string)0,htp_performance_mode=(string)2;";

/// Width and height of one grid tile.
pub const TILE: (i32, i32) = (960, 540);

/// `extra-operation` value selecting softmax on classification scores.
const CLASSIFICATION_SOFTMAX: i32 = 1;

/// Static description of one inference branch.
#[derive(Debug, Clone, Copy)]
pub struct Branch {
    /// Short name used in stage names.
    pub name: &'static str,
    /// Post-processing plugin.
    pub postproc: &'static str,
    /// Post-processing module.
    pub module: &'static str,
    /// Confidence threshold, for modules that take one.
    pub threshold: Option<f64>,
    /// Result count, for modules that take one.
    pub results: Option<u32>,
    /// Format of the post-processed frames.
    pub caps: &'static str,
    /// Top-left corner of the branch's tile.
    pub origin: (i32, i32),
}

/// The four branches in grid order.
pub const BRANCHES: [Branch; 4] = [
    Branch {
        name: "detection",
        postproc: "qtimlvdetection",
        module: "yolov8",
        threshold: Some(40.0),
        results: Some(10),
        caps: "video/x-raw,format=BGRA,width=640,height=360",
        origin: (0, 0),
    },
    Branch {
        name: "classification",
        postproc: "qtimlvclassification",
        module: "mobilenet",
        threshold: Some(40.0),
        results: Some(2),
        caps: "video/x-raw,format=BGRA,width=640,height=360",
        origin: (960, 0),
    },
    Branch {
        name: "pose",
        postproc: "qtimlvpose",
        module: "hrnet",
        threshold: Some(40.0),
        results: Some(2),
        caps: "video/x-raw,format=BGRA,width=640,height=360",
        origin: (0, 540),
    },
    Branch {
        name: "segmentation",
        postproc: "qtimlvsegmentation",
        module: "deeplab-argmax",
        threshold: None,
        results: None,
        caps: "video/x-raw,width=256,height=144",
        origin: (960, 540),
    },
];

/// Options of the `parallel-inference` demo.
#[derive(Debug, Clone, Args)]
pub struct ParallelInferenceArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Object detection model
    #[arg(long, default_value = "/etc/models/YOLOv8-Detection-Quantized.tflite")]
    pub detection_model: PathBuf,

    /// Object detection labels
    #[arg(long, default_value = "/etc/labels/yolov8.labels")]
    pub detection_labels: PathBuf,

    /// Object detection constants
    #[arg(
        long,
        default_value = "YOLOv8,q-offsets=<21.0, 0.0, 0.0>,q-scales=<3.093529462814331, 0.00390625, 1.0>;"
    )]
    pub detection_constants: QuantConstants,

    /// Classification model
    #[arg(long, default_value = "/etc/models/inception_v3_quantized.tflite")]
    pub classification_model: PathBuf,

    /// Classification labels
    #[arg(long, default_value = "/etc/labels/classification.labels")]
    pub classification_labels: PathBuf,

    /// Classification constants
    #[arg(long, default_value = "Mobilenet,q-offsets=<38.0>,q-scales=<0.17039915919303894>;")]
    pub classification_constants: QuantConstants,

    /// Pose detection model
    #[arg(long, default_value = "/etc/models/hrnet_pose_quantized.tflite")]
    pub pose_model: PathBuf,

    /// Pose detection labels
    #[arg(long, default_value = "/etc/labels/posenet_mobilenet_v1.labels")]
    pub pose_labels: PathBuf,

    /// Pose detection constants
    #[arg(long, default_value = "Posenet,q-offsets=<8.0>,q-scales=<0.0040499246679246426>;")]
    pub pose_constants: QuantConstants,

    /// Segmentation model
    #[arg(long, default_value = "/etc/models/deeplabv3_plus_mobilenet_quantized.tflite")]
    pub segmentation_model: PathBuf,

    /// Segmentation labels
    #[arg(long, default_value = "/etc/labels/deeplabv3_resnet50.labels")]
    pub segmentation_labels: PathBuf,

    /// Segmentation constants
    #[arg(long, default_value = "deeplab,q-offsets=<0.0>,q-scales=<1.0>;")]
    pub segmentation_constants: QuantConstants,
}

impl ParallelInferenceArgs {
    /// Model, labels and constants of each branch, in [`BRANCHES`] order.
    pub fn models(&self) -> [(&PathBuf, &PathBuf, &QuantConstants); 4] {
        [
            (
                &self.detection_model,
                &self.detection_labels,
                &self.detection_constants,
            ),
            (
                &self.classification_model,
                &self.classification_labels,
                &self.classification_constants,
            ),
            (&self.pose_model, &self.pose_labels, &self.pose_constants),
            (
                &self.segmentation_model,
                &self.segmentation_labels,
                &self.segmentation_constants,
            ),
        ]
    }

    /// Validates the options and describes the pipeline.
    pub fn graph(&self) -> Result<GraphSpec> {
        for (model, labels, _) in self.models() {
            require_file(model)?;
            require_file(labels)?;
        }
        let source = self.source.source()?;
        let camera_caps = CameraCaps {
            memory_gbm: false,
            ..CameraCaps::new(1920, 1080, Framerate::default())?.uncompressed()
        };

        let mut graph = GraphSpec::new("parallel-inference");
        graph.stage("queue", "queue0");
        graph.stage("tee", "split");
        graph.stage("qtivcomposer", "composer");
        source.add_to(&mut graph, &camera_caps, Some("video/x-raw,format=NV12"), "queue0");
        graph.chain(["queue0", "split"]);

        for (index, (branch, (model, labels, constants))) in
            BRANCHES.iter().zip(self.models()).enumerate()
        {
            let queues: Vec<String> = (1..=5).map(|n| format!("queue{}", 5 * index + n)).collect();
            for queue in &queues {
                graph.stage("queue", queue);
            }
            let converter = format!("converter-{}", branch.name);
            let inference = format!("inference-{}", branch.name);
            let postproc = format!("postproc-{}", branch.name);
            let caps = format!("caps-{}", branch.name);

            graph.stage("qtimlvconverter", &converter);

            let stage = graph.stage(MlFramework::Tflite.stage_type(), &inference);
            stage.set("model", model.display().to_string());
            Runtime::Dsp.apply(MlFramework::Tflite, stage);
            stage.set(
                "external-delegate-options",
                PropertyValue::structure(HTP_DELEGATE_OPTIONS),
            );

            let stage = graph.stage(branch.postproc, &postproc);
            stage
                .set("module", branch.module)
                .set("labels", labels.display().to_string())
                .set("constants", constants);
            if let Some(threshold) = branch.threshold {
                stage.set("threshold", threshold);
            }
            if let Some(results) = branch.results {
                stage.set("results", results);
            }
            if branch.postproc == "qtimlvclassification" {
                stage.set("extra-operation", CLASSIFICATION_SOFTMAX);
            }

            graph
                .stage("capsfilter", &caps)
                .set("caps", PropertyValue::caps(branch.caps));

            graph.chain([
                Endpoint::from("split"),
                Endpoint::from(&queues[0]),
                tile_pad(branch.origin, TILE),
            ]);
            graph.chain([
                Endpoint::from("split"),
                Endpoint::from(&queues[1]),
                Endpoint::from(&converter),
                Endpoint::from(&queues[2]),
                Endpoint::from(&inference),
                Endpoint::from(&queues[3]),
                Endpoint::from(&postproc),
                Endpoint::from(&caps),
                Endpoint::from(&queues[4]),
                result_pad(branch),
            ]);
        }

        graph.stage("queue", "queue21");
        graph
            .stage("waylandsink", "waylandsink")
            .set("sync", true)
            .set("fullscreen", true);
        graph
            .stage("fpsdisplaysink", "fpsdisplaysink")
            .set("sync", true)
            .set("signal-fps-measurements", true)
            .set("text-overlay", true)
            .set("video-sink", PropertyValue::stage("waylandsink"));
        graph.chain(["composer", "queue21", "fpsdisplaysink"]);

        Ok(graph)
    }
}

/// New composer input placed at `origin` with size `size`.
fn tile_pad(origin: (i32, i32), size: (i32, i32)) -> Endpoint {
    Endpoint::request("composer", "sink_%u")
        .with_pad_property(
            "position",
            PropertyValue::Point {
                x: origin.0,
                y: origin.1,
            },
        )
        .with_pad_property(
            "dimensions",
            PropertyValue::Point {
                x: size.0,
                y: size.1,
            },
        )
}

/// Composer input for the post-processed frames of `branch`.
///
/// Classification labels go in a small inset, segmentation masks are
/// blended over the whole tile.
fn result_pad(branch: &Branch) -> Endpoint {
    match branch.postproc {
        "qtimlvclassification" => tile_pad(
            (branch.origin.0 + 30, branch.origin.1 + 45),
            (TILE.0 / 3, TILE.1 / 3),
        ),
        "qtimlvsegmentation" => tile_pad(branch.origin, TILE).with_pad_property("alpha", 0.5),
        _ => tile_pad(branch.origin, TILE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: ParallelInferenceArgs,
    }

    fn args() -> ParallelInferenceArgs {
        let mut argv = vec!["test"];
        for flag in [
            "--detection-model",
            "--detection-labels",
            "--classification-model",
            "--classification-labels",
            "--pose-model",
            "--pose-labels",
            "--segmentation-model",
            "--segmentation-labels",
        ] {
            argv.push(flag);
            argv.push("Cargo.toml");
        }
        TestCli::try_parse_from(argv).unwrap().args
    }

    #[test]
    fn default_constants_parse() {
        let args = args();
        assert_eq!(args.detection_constants.scales.len(), 3);
        assert_eq!(args.segmentation_constants.model, "deeplab");
    }

    #[test]
    fn eight_composer_inputs() {
        let graph = args().graph().unwrap();
        graph.validate().unwrap();

        let composer_inputs: Vec<&Endpoint> = graph
            .chains
            .iter()
            .filter_map(|chain| chain.endpoints.last())
            .filter(|endpoint| endpoint.stage == "composer")
            .collect();
        assert_eq!(composer_inputs.len(), 8);
        assert!(composer_inputs.iter().all(|endpoint| endpoint.pad_properties.len() >= 2));

        let segmentation = composer_inputs[7];
        assert!(segmentation.pad_properties.iter().any(|p| p.name == "alpha"));
    }

    #[test]
    fn display_sink_is_embedded() {
        let graph = args().graph().unwrap();
        assert!(graph.embedded_stages().contains("waylandsink"));
        assert!(
            graph
                .chains
                .iter()
                .all(|chain| chain.endpoints.iter().all(|e| e.stage != "waylandsink"))
        );
    }

    #[test]
    fn missing_model_is_rejected() {
        let mut args = args();
        args.pose_model = "/etc/models/missing.tflite".into();
        assert!(args.graph().unwrap_err().is_configuration());
    }
}
