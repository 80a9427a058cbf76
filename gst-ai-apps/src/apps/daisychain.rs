// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Object detection followed by pose estimation on the detected regions.
//!
//! The detection metadata travels with the frames into the second model,
//! which only looks at the detected regions. Two of those regions are cut
//! out and shown as insets on both sides of the full frame.
//!
//! ```text
//! source -> split0 -> queue1 -> metamux0 -> split1 -> queue2 -> metamux1 -> split2 -> queue3 -> composer
//!             +-> detection branch -> metamux0   +-> pose branch -> metamux1    +-> vsplit -> insets -> composer
//! ```

use std::path::PathBuf;

use clap::Args;
use stagegraph::settings::{
    CameraCaps, Framerate, MlFramework, QuantConstants, Runtime, require_file,
};
use stagegraph::{Endpoint, GraphSpec, PropertyValue, Result};

use super::SourceArgs;
use super::object_detection::DETECTION_CAPS;

/// Format of the cut-out regions.
pub const INSET_CAPS: &str = "video/x-raw(memory:GBM),format=RGBA,width=240,height=480";

/// Size of the composed frame.
pub const FRAME: (i32, i32) = (1920, 1080);

/// Size of one inset.
pub const INSET: (i32, i32) = (240, 480);

/// Options of the `daisychain-detection-pose` demo.
#[derive(Debug, Clone, Args)]
pub struct DaisychainArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Object detection model
    #[arg(long, default_value = "/opt/YOLOv8-Detection-Quantized.tflite")]
    pub detection_model: PathBuf,

    /// Object detection labels
    #[arg(long, default_value = "/opt/yolov8.labels")]
    pub detection_labels: PathBuf,

    /// Object detection constants
    #[arg(
        long,
        default_value = "YOLOv8,q-offsets=<21.0, 0.0, 0.0>,q-scales=<3.093529462814331, 0.00390625, 1.0>;"
    )]
    pub detection_constants: QuantConstants,

    /// Pose model
    #[arg(long, default_value = "/opt/hrnet_pose_quantized.tflite")]
    pub pose_model: PathBuf,

    /// Pose labels
    #[arg(long, default_value = "/opt/hrnet_pose.labels")]
    pub pose_labels: PathBuf,

    /// Pose constants
    #[arg(long, default_value = "hrnet,q-offsets=<8.0>,q-scales=<0.0040499246679246426>;")]
    pub pose_constants: QuantConstants,
}

/// One model of the chain.
struct Model<'a> {
    name: &'static str,
    converter_mode: &'static str,
    postproc: &'static str,
    module: &'static str,
    threshold: f64,
    results: u32,
    model: &'a PathBuf,
    labels: &'a PathBuf,
    constants: &'a QuantConstants,
}

impl DaisychainArgs {
    /// Validates the options and describes the pipeline.
    pub fn graph(&self) -> Result<GraphSpec> {
        for path in [
            &self.detection_model,
            &self.detection_labels,
            &self.pose_model,
            &self.pose_labels,
        ] {
            require_file(path)?;
        }
        let source = self.source.source()?;
        let camera_caps = CameraCaps::new(1920, 1080, Framerate::default())?;

        let stages = [
            Model {
                name: "detection",
                converter_mode: "image-batch-non-cumulative",
                postproc: "qtimlvdetection",
                module: "yolov8",
                threshold: 40.0,
                results: 4,
                model: &self.detection_model,
                labels: &self.detection_labels,
                constants: &self.detection_constants,
            },
            Model {
                name: "pose",
                converter_mode: "roi-batch-cumulative",
                postproc: "qtimlvpose",
                module: "hrnet",
                threshold: 51.0,
                results: 1,
                model: &self.pose_model,
                labels: &self.pose_labels,
                constants: &self.pose_constants,
            },
        ];

        let mut graph = GraphSpec::new("daisychain-detection-pose");
        graph.stage("queue", "queue0");
        source.add_to(&mut graph, &camera_caps, None, "queue0");

        let mut upstream = "queue0".to_owned();
        for (index, stage) in stages.iter().enumerate() {
            let split = format!("split{}", index);
            let queue = format!("queue{}", index + 1);
            let metamux = format!("metamux{}", index);
            add_model(&mut graph, stage, &split, &metamux);
            graph.stage("tee", &split);
            graph.stage("queue", &queue);
            graph.stage("qtimetamux", &metamux);
            graph.chain([
                Endpoint::from(&upstream),
                Endpoint::from(&split),
                Endpoint::from(&queue),
                Endpoint::from(format!("{}.sink", metamux)),
            ]);
            upstream = metamux;
        }

        graph.stage("tee", "split2");
        graph.stage("queue", "queue3");
        graph.stage("qtivsplit", "vsplit");
        graph.stage("qtivcomposer", "composer");
        graph.chain([upstream.as_str(), "split2"]);
        graph.chain([
            Endpoint::from("split2"),
            Endpoint::from("queue3"),
            composer_pad((0, 0), FRAME),
        ]);
        graph.chain(["split2", "vsplit"]);
        for (index, x) in [0, FRAME.0 - INSET.0].into_iter().enumerate() {
            let caps = format!("inset-caps{}", index);
            let queue = format!("inset-queue{}", index);
            graph
                .stage("capsfilter", &caps)
                .set("caps", PropertyValue::caps(INSET_CAPS));
            graph.stage("queue", &queue);
            graph.chain([
                Endpoint::request("vsplit", "src_%u").with_pad_property("mode", "single-roi-meta"),
                Endpoint::from(&caps),
                Endpoint::from(&queue),
                composer_pad((x, 0), INSET),
            ]);
        }

        graph.stage("qtioverlay", "overlay").set("engine", "gles");
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
        graph.chain(["composer", "overlay", "fpsdisplaysink"]);

        Ok(graph)
    }
}

/// Adds the inference branch of `stage` from `split` into `metamux`.
fn add_model(graph: &mut GraphSpec, stage: &Model<'_>, split: &str, metamux: &str) {
    let queue = format!("{}-queue", stage.name);
    let converter = format!("{}-converter", stage.name);
    let inference = format!("{}-inference", stage.name);
    let caps = format!("{}-caps", stage.name);

    graph.stage("queue", &queue);
    let converter_stage = graph.stage("qtimlvconverter", &converter);
    converter_stage.set("mode", stage.converter_mode);
    if stage.converter_mode.starts_with("roi") {
        converter_stage.set("image-disposition", "centre");
    }

    let inference_stage = graph.stage(MlFramework::Tflite.stage_type(), &inference);
    inference_stage.set("model", stage.model.display().to_string());
    Runtime::Dsp.apply(MlFramework::Tflite, inference_stage);

    graph
        .stage(stage.postproc, stage.name)
        .set("module", stage.module)
        .set("threshold", stage.threshold)
        .set("results", stage.results)
        .set("labels", stage.labels.display().to_string())
        .set("constants", stage.constants);
    graph
        .stage("capsfilter", &caps)
        .set("caps", PropertyValue::caps(DETECTION_CAPS));

    graph.chain([
        Endpoint::from(split),
        Endpoint::from(&queue),
        Endpoint::from(&converter),
        Endpoint::from(&inference),
        Endpoint::from(stage.name),
        Endpoint::from(&caps),
        Endpoint::request(metamux, "data_%u"),
    ]);
}

/// New composer input placed at `origin` with size `size`.
fn composer_pad(origin: (i32, i32), size: (i32, i32)) -> Endpoint {
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

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use stagegraph::PadSpec;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: DaisychainArgs,
    }

    fn parse(extra: &[&str]) -> DaisychainArgs {
        let mut argv = vec!["test"];
        for flag in [
            "--detection-model",
            "--detection-labels",
            "--pose-model",
            "--pose-labels",
        ] {
            argv.push(flag);
            argv.push("Cargo.toml");
        }
        argv.extend_from_slice(extra);
        TestCli::try_parse_from(argv).unwrap().args
    }

    #[test]
    fn pose_runs_on_detected_regions() {
        let graph = parse(&[]).graph().unwrap();
        graph.validate().unwrap();

        let converter = graph.find("pose-converter").unwrap();
        assert_eq!(
            converter.get("mode"),
            Some(&PropertyValue::from("roi-batch-cumulative"))
        );
        assert_eq!(
            converter.get("image-disposition"),
            Some(&PropertyValue::from("centre"))
        );
        assert!(graph.find("detection-converter").unwrap().get("image-disposition").is_none());
        assert_eq!(
            graph.find("pose").and_then(|s| s.get("threshold")),
            Some(&PropertyValue::Double(51.0))
        );

        let into_pose = graph
            .chains
            .iter()
            .find(|chain| chain.endpoints[0].stage == "split1")
            .unwrap();
        assert_eq!(into_pose.endpoints.last().unwrap().stage, "metamux1");
    }

    #[test]
    fn insets_sit_on_both_sides() {
        let graph = parse(&[]).graph().unwrap();

        let insets: Vec<&Endpoint> = graph
            .chains
            .iter()
            .filter(|chain| chain.endpoints[0].stage == "vsplit")
            .map(|chain| chain.endpoints.last().unwrap())
            .collect();
        assert_eq!(insets.len(), 2);
        let positions: Vec<&PropertyValue> = insets
            .iter()
            .map(|endpoint| &endpoint.pad_properties[0].value)
            .collect();
        assert_eq!(
            positions,
            [
                &PropertyValue::Point { x: 0, y: 0 },
                &PropertyValue::Point { x: 1680, y: 0 }
            ]
        );
        for inset in insets {
            assert_eq!(inset.pad, Some(PadSpec::Request("sink_%u".into())));
        }
    }

    #[test]
    fn file_input_is_decoded() {
        let graph = parse(&["--file-path", "Cargo.toml"]).graph().unwrap();
        graph.validate().unwrap();
        assert!(graph.find("demux").is_some());
        assert!(graph.find("camsrc").is_none());
    }
}
