// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("riddler")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Riddler Contributors")
        .about("Convert a docker container into bundle descriptors (config.json, runtime.json)")
        .arg(Arg::new("container").required(true).help("Container name or ID"))
        .arg(
            Arg::new("host")
                .long("host")
                .env("DOCKER_HOST")
                .default_value("unix:///var/run/docker.sock")
                .help("Daemon socket or address to connect to"),
        )
        .arg(
            Arg::new("bundle")
                .long("bundle")
                .value_name("DIR")
                .default_value(".")
                .help("Directory to write config.json and runtime.json into"),
        )
        .arg(
            Arg::new("hook")
                .long("hook")
                .value_name("PHASE:EXEC")
                .action(ArgAction::Append)
                .help("Hook as phase:executable [args] (repeatable)"),
        )
        .arg(
            Arg::new("rootfs")
                .long("rootfs")
                .value_name("PATH")
                .help("Root filesystem path to write instead of the storage driver's"),
        )
        .arg(
            Arg::new("force")
                .short('f')
                .long("force")
                .action(ArgAction::SetTrue)
                .help("Overwrite existing descriptors"),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .action(ArgAction::SetTrue)
                .help("Debug logging"),
        )
        .arg(
            Arg::new("inspect_file")
                .long("inspect-file")
                .value_name("FILE")
                .help("Read the container from saved docker inspect output instead of the daemon"),
        )
        .arg(
            Arg::new("info_file")
                .long("info-file")
                .value_name("FILE")
                .help("Saved docker info output to use with --inspect-file"),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("riddler.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
