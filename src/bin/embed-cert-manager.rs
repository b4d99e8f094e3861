// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Certificate renewal for embedded hosts.
//!
//! Runs every job found in `<config>/jobs.d/` once and exits. Intended to be
//! started from cron or a systemd timer.
//!
//! # Usage
//!
//! ```text
//! embed-cert-manager [OPTIONS]
//!
//! Options:
//!   -c, --config <DIR>  Configuration directory [default: /etc/embed-cert-manager.d]
//!   -f, --force         Renew even if the current certificate is still valid
//!   -v, --verbose       Enable verbose output
//!   -q, --quiet         Suppress non-error output
//!   -h, --help          Print help
//!   -V, --version       Print version
//! ```
//!
//! The exit status is non-zero when the configuration cannot be loaded or any
//! job failed.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use embed_cert_manager::config::{DEFAULT_CONFIG_DIR, JobLoader};
use embed_cert_manager::job::JobRunner;
use embed_cert_manager::logging::{self, LogLevel};
use embed_cert_manager::remote::SshExecutor;

/// Certificate renewal for embedded hosts
#[derive(Parser)]
#[command(name = "embed-cert-manager")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Renew embedded host certificates through EJBCA", long_about = None)]
struct Cli {
    /// Configuration directory
    #[arg(short, long, value_name = "DIR", default_value = DEFAULT_CONFIG_DIR)]
    config: PathBuf,

    /// Renew even if the current certificate is still valid
    #[arg(short, long)]
    force: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(LogLevel::from_flags(cli.verbose, cli.quiet)) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> ExitCode {
    tracing::info!("Using configuration in {}", cli.config.display());

    let jobs = match JobLoader::new().with_path(&cli.config).load() {
        Ok(jobs) => jobs,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let runner = JobRunner::new(Arc::new(SshExecutor::new())).with_force(cli.force);
    let failed = runner.run_all(&jobs).await;

    if failed > 0 {
        tracing::error!("{} of {} job(s) failed", failed, jobs.len());
        ExitCode::FAILURE
    } else {
        tracing::info!("All {} job(s) done", jobs.len());
        ExitCode::SUCCESS
    }
}
