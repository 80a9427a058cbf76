// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use std::process::ExitCode;

use clap::Parser;
use gst_ai_apps::cli::{self, Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();
    gst_ai_apps::setup_logging();
    ExitCode::from(cli::run(&cli))
}
