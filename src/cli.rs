// src/cli.rs
//! CLI definitions for riddler
//!
//! One command: convert a container into a bundle directory.

use clap::Parser;
use riddler::docker::DEFAULT_HOST;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "riddler")]
#[command(author = "Riddler Contributors")]
#[command(version)]
#[command(
    about = "Convert a docker container into bundle descriptors (config.json, runtime.json)",
    long_about = None
)]
pub struct Cli {
    /// Container name or ID
    pub container: String,

    /// Daemon socket or address to connect to
    #[arg(long, env = "DOCKER_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Directory to write config.json and runtime.json into
    #[arg(long, default_value = ".")]
    pub bundle: PathBuf,

    /// Hook as phase:executable [args] (repeatable)
    #[arg(long = "hook", value_name = "PHASE:EXEC")]
    pub hooks: Vec<String>,

    /// Root filesystem path to write instead of the storage driver's
    #[arg(long)]
    pub rootfs: Option<PathBuf>,

    /// Overwrite existing descriptors
    #[arg(short, long)]
    pub force: bool,

    /// Debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Read the container from saved `docker inspect` output instead of the daemon
    #[arg(long, value_name = "FILE")]
    pub inspect_file: Option<PathBuf>,

    /// Saved `docker info` output to use with --inspect-file
    #[arg(long, value_name = "FILE", requires = "inspect_file")]
    pub info_file: Option<PathBuf>,
}
