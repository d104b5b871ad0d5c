// src/translate/mod.rs

//! Container snapshot to bundle translation
//!
//! [`convert`] is the whole pipeline against a [`DaemonSource`]:
//!
//! 1. compile `--hook` declarations
//! 2. inspect the container and fetch daemon info
//! 3. inspect peers whose namespaces are joined
//! 4. translate the process half, select capabilities, translate the runtime half
//! 5. merge the compiled hooks into the runtime half
//!
//! Hooks are compiled before any daemon call, so a bad declaration costs
//! nothing. Any error aborts the pipeline before a [`Bundle`] exists.
//! [`translate`] is steps 4-5 over inputs that were already fetched.

mod devices;
mod process;
mod runtime;
mod users;

pub use devices::{DEFAULT_ALLOWED, device_rules, parse_cgroup_rule, probe_host_device};
pub use process::{
    lookup_root, merge_env, platform, process_args, resolve_rootfs, translate_mount,
    translate_process,
};
pub use runtime::{
    NamespaceMode, cgroups_path, joined_peers, translate_resources, translate_runtime,
};
pub use users::{NOBODY, UserLookup};

use crate::bundle::Bundle;
use crate::capability::container_capabilities;
use crate::docker::{ContainerSnapshot, DaemonError, DaemonInfo, DaemonSource};
use crate::error::{Error, Result};
use crate::hooks::{ExecutableResolver, HookSet, SearchPath, compile_hooks};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

/// Peer container reference to the pid of its main process
pub type Peers = BTreeMap<String, u32>;

/// Caller choices that are not part of the daemon's data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Root filesystem path written to `config.json`, overriding the storage driver's
    pub rootfs: Option<PathBuf>,
    /// Bundle directory; a relative `rootfs` is read from under it
    pub bundle: Option<PathBuf>,
}

/// Translate already-fetched inputs into a bundle
pub fn translate(
    snapshot: &ContainerSnapshot,
    info: &DaemonInfo,
    peers: &Peers,
    hooks: &HookSet,
    options: &ConvertOptions,
) -> Result<Bundle> {
    let config = translate_process(snapshot, info, options)?;
    let capabilities = container_capabilities(snapshot.require_host_config()?, info);
    let mut runtime = translate_runtime(snapshot, info, &capabilities, peers)?;
    runtime.merge_hooks(hooks.to_spec());
    Ok(Bundle { config, runtime })
}

/// Inspect every joined peer and record the pid of its main process
pub fn resolve_peers(source: &dyn DaemonSource, snapshot: &ContainerSnapshot) -> Result<Peers> {
    let mut peers = Peers::new();
    let Some(host) = snapshot.host_config.as_ref() else {
        return Ok(peers);
    };

    for (kind, peer) in joined_peers(host) {
        debug!("Inspecting namespace peer {}", peer);
        let inspected = source.inspect_container(&peer)?;
        // Sources may fall back to a default container; a peer must be the one named
        if !inspected.matches(&peer) {
            return Err(Error::fetch(
                format!("inspecting container ({})", peer),
                DaemonError::NotFound(peer),
            ));
        }
        let pid = inspected
            .state
            .as_ref()
            .filter(|state| state.running)
            .and_then(|state| u32::try_from(state.pid).ok())
            .filter(|pid| *pid > 0)
            .ok_or_else(|| Error::UnresolvedPeer {
                kind: kind.as_str(),
                peer: peer.clone(),
                reason: "container is not running".to_string(),
            })?;
        peers.insert(peer, pid);
    }
    Ok(peers)
}

/// Full pipeline with hooks resolved on `PATH`
pub fn convert<S: AsRef<str>>(
    source: &dyn DaemonSource,
    container: &str,
    raw_hooks: &[S],
    options: &ConvertOptions,
) -> Result<Bundle> {
    convert_with(source, container, raw_hooks, options, &SearchPath)
}

/// Full pipeline with a caller-provided hook resolver
pub fn convert_with<S: AsRef<str>>(
    source: &dyn DaemonSource,
    container: &str,
    raw_hooks: &[S],
    options: &ConvertOptions,
    resolver: &dyn ExecutableResolver,
) -> Result<Bundle> {
    let hooks = compile_hooks(raw_hooks, resolver)?;
    debug!("Compiled {} hooks", hooks.len());

    let snapshot = source.inspect_container(container)?;
    let info = source.info()?;
    let peers = resolve_peers(source, &snapshot)?;

    let bundle = translate(&snapshot, &info, &peers, &hooks, options)?;
    info!("Translated container {}", snapshot.display_name());
    Ok(bundle)
}
