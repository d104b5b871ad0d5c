// src/lib.rs

//! Riddler
//!
//! Converts a container known to a docker daemon into an open-container
//! runtime bundle: `config.json` (process, root filesystem, mounts) and
//! `runtime.json` (hooks, namespaces, resources, security settings).
//!
//! # Architecture
//!
//! - `docker`: inspection snapshots and daemon info, from a live daemon or saved files
//! - `capability`: default capability templates and add/drop mapping
//! - `hooks`: `phase:executable args` declarations compiled to resolved hooks
//! - `translate`: snapshot to descriptors, plus the full conversion pipeline
//! - `spec`: the descriptor documents as written
//! - `bundle`: rendering and writing both documents

pub mod bundle;
pub mod capability;
pub mod docker;
mod error;
pub mod hooks;
pub mod spec;
pub mod translate;

pub use bundle::Bundle;
pub use capability::{CapabilitySet, map_capabilities};
pub use docker::{ContainerSnapshot, DaemonClient, DaemonInfo, DaemonSource, InspectFiles};
pub use error::{Error, Result};
pub use hooks::{HookError, HookPhase, HookSet, compile_hooks, parse_hook};
pub use spec::{ProcessSpec, RuntimeSpec};
pub use translate::{ConvertOptions, Peers, convert, convert_with, translate};
