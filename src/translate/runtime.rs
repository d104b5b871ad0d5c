// src/translate/runtime.rs

//! Runtime half of the translation: `runtime.json`
//!
//! Namespaces, resource limits, devices and security settings come from the
//! container's `HostConfig`, which is the one structural requirement here.
//! Hooks are left empty; the pipeline merges them in afterwards.

use super::Peers;
use super::devices::device_rules;
use crate::capability::CapabilitySet;
use crate::docker::{ContainerSnapshot, DaemonInfo, HostConfig, Ulimit};
use crate::error::{Error, Result};
use crate::spec::{
    BlockIo, Cpu, Linux, Memory, Namespace, NamespaceKind, Pids, Resources, Rlimit, RuntimeSpec,
};
use tracing::debug;

/// Prefix of a namespace mode that joins another container
const CONTAINER_PREFIX: &str = "container:";

/// `SecurityOpt` entries that set no_new_privileges
const NO_NEW_PRIVILEGES: &[&str] = &[
    "no-new-privileges",
    "no-new-privileges:true",
    "no-new-privileges=true",
];

/// Cgroup parent under the cgroupfs driver
const CGROUPFS_PARENT: &str = "/docker";

/// Slice used under the systemd driver when the container names none
const SYSTEMD_SLICE: &str = "system.slice";

/// How a container gets one namespace kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceMode {
    /// Fresh namespace owned by the container
    Private,
    /// The host's namespace; nothing is written
    Host,
    /// Another container's namespace
    Container(String),
}

impl NamespaceMode {
    /// Interpret a daemon mode string; anything unrecognized is private
    pub fn parse(mode: &str) -> Self {
        if mode == "host" {
            Self::Host
        } else if let Some(peer) = mode.strip_prefix(CONTAINER_PREFIX) {
            Self::Container(peer.to_string())
        } else {
            Self::Private
        }
    }
}

/// Namespace mode per kind, in descriptor order
pub fn namespace_modes(
    host: &HostConfig,
    info: &DaemonInfo,
) -> Vec<(NamespaceKind, NamespaceMode)> {
    let mut modes = vec![
        (NamespaceKind::Pid, NamespaceMode::parse(&host.pid_mode)),
        (NamespaceKind::Network, NamespaceMode::parse(&host.network_mode)),
        (NamespaceKind::Ipc, NamespaceMode::parse(&host.ipc_mode)),
        (NamespaceKind::Uts, NamespaceMode::parse(&host.uts_mode)),
        (NamespaceKind::Mount, NamespaceMode::Private),
    ];
    if info.userns_remap() && host.userns_mode != "host" {
        modes.push((NamespaceKind::User, NamespaceMode::Private));
    }
    if host.cgroupns_mode == "private" {
        modes.push((NamespaceKind::Cgroup, NamespaceMode::Private));
    }
    modes
}

/// Peer containers whose namespaces are joined, each with the first kind joined
pub fn joined_peers(host: &HostConfig) -> Vec<(NamespaceKind, String)> {
    let modes = [
        (NamespaceKind::Pid, &host.pid_mode),
        (NamespaceKind::Network, &host.network_mode),
        (NamespaceKind::Ipc, &host.ipc_mode),
        (NamespaceKind::Uts, &host.uts_mode),
    ];
    let mut peers: Vec<(NamespaceKind, String)> = Vec::new();
    for (kind, mode) in modes {
        if let NamespaceMode::Container(peer) = NamespaceMode::parse(mode) {
            if !peers.iter().any(|(_, p)| *p == peer) {
                peers.push((kind, peer));
            }
        }
    }
    peers
}

/// Namespace entries; `Host` modes are omitted
pub fn translate_namespaces(
    snapshot: &ContainerSnapshot,
    host: &HostConfig,
    info: &DaemonInfo,
    peers: &Peers,
) -> Result<Vec<Namespace>> {
    let mut namespaces = Vec::new();
    for (kind, mode) in namespace_modes(host, info) {
        match mode {
            NamespaceMode::Host => {
                debug!("Sharing host {} namespace", kind.as_str());
            }
            NamespaceMode::Private => namespaces.push(Namespace { kind, path: None }),
            NamespaceMode::Container(peer) => {
                let pid = peers.get(&peer).ok_or_else(|| Error::UnresolvedPeer {
                    kind: kind.as_str(),
                    peer: peer.clone(),
                    reason: format!("not inspected while converting {}", snapshot.display_name()),
                })?;
                namespaces.push(Namespace {
                    kind,
                    path: Some(format!("/proc/{}/ns/{}", pid, kind.proc_name())),
                });
            }
        }
    }
    Ok(namespaces)
}

fn positive(value: i64) -> Option<i64> {
    (value > 0).then_some(value)
}

/// Cgroup limits; zero and negative values are unset
pub fn translate_resources(host: &HostConfig) -> Resources {
    let memory = Memory {
        limit: positive(host.memory),
        reservation: positive(host.memory_reservation),
        swap: if host.memory_swap == -1 {
            Some(-1)
        } else {
            positive(host.memory_swap)
        },
        kernel: positive(host.kernel_memory),
        swappiness: host
            .memory_swappiness
            .filter(|s| (0..=100).contains(s))
            .map(|s| s as u64),
    };

    let cpu = Cpu {
        shares: positive(host.cpu_shares).map(|v| v as u64),
        quota: positive(host.cpu_quota),
        period: positive(host.cpu_period).map(|v| v as u64),
        cpus: Some(host.cpuset_cpus.clone()).filter(|s| !s.is_empty()),
        mems: Some(host.cpuset_mems.clone()).filter(|s| !s.is_empty()),
    };

    Resources {
        devices: Vec::new(),
        disable_oom_killer: host.oom_kill_disable.filter(|disabled| *disabled),
        oom_score_adj: (host.oom_score_adj != 0).then_some(host.oom_score_adj),
        memory,
        cpu,
        pids: host.pids_limit.and_then(positive).map(|limit| Pids { limit }),
        block_io: BlockIo {
            blkio_weight: (host.blkio_weight > 0).then_some(host.blkio_weight),
        },
    }
}

/// `--ulimit nofile=...` becomes `RLIMIT_NOFILE`; negative means unlimited
pub fn translate_rlimits(ulimits: &[Ulimit]) -> Vec<Rlimit> {
    let limit = |v: i64| u64::try_from(v).unwrap_or(u64::MAX);
    ulimits
        .iter()
        .filter(|u| !u.name.is_empty())
        .map(|u| Rlimit {
            kind: format!("RLIMIT_{}", u.name.to_uppercase()),
            hard: limit(u.hard),
            soft: limit(u.soft),
        })
        .collect()
}

/// Cgroup path for the container under the daemon's cgroup driver
pub fn cgroups_path(snapshot: &ContainerSnapshot, host: &HostConfig, info: &DaemonInfo) -> String {
    let parent = host.cgroup_parent.trim_end_matches('/');
    if info.systemd_cgroups() {
        let slice = if parent.is_empty() { SYSTEMD_SLICE } else { parent };
        format!("{}:docker:{}", slice, snapshot.id)
    } else {
        let parent = if parent.is_empty() { CGROUPFS_PARENT } else { parent };
        format!("{}/{}", parent, snapshot.id)
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Build the runtime descriptor with empty hook lists
pub fn translate_runtime(
    snapshot: &ContainerSnapshot,
    info: &DaemonInfo,
    capabilities: &CapabilitySet,
    peers: &Peers,
) -> Result<RuntimeSpec> {
    let host = snapshot.require_host_config()?;
    let namespaces = translate_namespaces(snapshot, host, info, peers)?;

    let private_uts = namespaces
        .iter()
        .any(|ns| ns.kind == NamespaceKind::Uts && ns.path.is_none());
    let hostname = snapshot
        .config
        .as_ref()
        .filter(|_| private_uts)
        .and_then(|c| non_empty(&c.hostname));

    let (device_cgroup, devices) = device_rules(host);
    let mut resources = translate_resources(host);
    resources.devices = device_cgroup;

    let no_new_privileges = host
        .security_opt
        .iter()
        .any(|opt| NO_NEW_PRIVILEGES.contains(&opt.as_str()));

    debug!(
        "Runtime for {}: {} namespaces, {} device rules",
        snapshot.display_name(),
        namespaces.len(),
        resources.devices.len()
    );

    Ok(RuntimeSpec {
        hostname,
        hooks: Default::default(),
        linux: Linux {
            capabilities: capabilities.iter().map(str::to_string).collect(),
            namespaces,
            resources,
            devices,
            rlimits: translate_rlimits(&host.ulimits),
            sysctl: host.sysctls.clone(),
            cgroups_path: cgroups_path(snapshot, host, info),
            apparmor_profile: non_empty(&snapshot.app_armor_profile),
            selinux_process_label: non_empty(&snapshot.process_label),
            mount_label: non_empty(&snapshot.mount_label),
            no_new_privileges,
            masked_paths: host.masked_paths.clone(),
            readonly_paths: host.readonly_paths.clone(),
        },
    })
}
