// src/docker/mod.rs

//! Daemon-side data: container inspection snapshots and daemon info
//!
//! These types mirror the subset of the Docker Engine API documents that the
//! translators read:
//!
//! - `GET /containers/{id}/json` -> [`ContainerSnapshot`]
//! - `GET /info` -> [`DaemonInfo`]
//!
//! The daemon serializes empty slices and maps as `null`, so every collection
//! field tolerates `null` and decodes it as empty. `Config` and `HostConfig`
//! stay optional so a structurally missing section can be told apart from a
//! zero-valued one.

mod client;

pub use client::{DEFAULT_HOST, DaemonClient, DaemonError, DaemonSource, InspectFiles};

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Decode `null` as the type's default value
fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Point-in-time inspection of one container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSnapshot {
    #[serde(default, deserialize_with = "nullable")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    /// Resolved executable of the container's main process
    #[serde(default, deserialize_with = "nullable")]
    pub path: String,
    /// Resolved arguments of the container's main process
    #[serde(default, deserialize_with = "nullable")]
    pub args: Vec<String>,
    #[serde(default)]
    pub state: Option<ContainerState>,
    #[serde(default)]
    pub config: Option<ContainerConfig>,
    #[serde(default)]
    pub host_config: Option<HostConfig>,
    #[serde(default)]
    pub graph_driver: Option<GraphDriver>,
    #[serde(default, deserialize_with = "nullable")]
    pub mounts: Vec<MountPoint>,
    #[serde(default, deserialize_with = "nullable")]
    pub resolv_conf_path: String,
    #[serde(default, deserialize_with = "nullable")]
    pub hostname_path: String,
    #[serde(default, deserialize_with = "nullable")]
    pub hosts_path: String,
    #[serde(default, deserialize_with = "nullable")]
    pub app_armor_profile: String,
    #[serde(default, deserialize_with = "nullable")]
    pub process_label: String,
    #[serde(default, deserialize_with = "nullable")]
    pub mount_label: String,
}

impl ContainerSnapshot {
    /// Short name without the daemon's leading slash, falling back to the ID
    pub fn display_name(&self) -> &str {
        let name = self.name.trim_start_matches('/');
        if name.is_empty() { &self.id } else { name }
    }

    /// The host configuration, which must be present for runtime translation
    pub fn require_host_config(&self) -> Result<&HostConfig> {
        self.host_config.as_ref().ok_or_else(|| Error::MissingField {
            container: self.display_name().to_string(),
            field: "HostConfig",
        })
    }

    /// Whether `reference` is this container's full ID or its name
    pub fn matches_exactly(&self, reference: &str) -> bool {
        let reference = reference.trim_start_matches('/');
        !reference.is_empty()
            && (self.id == reference || self.name.trim_start_matches('/') == reference)
    }

    /// Whether `reference` names this container (ID, ID prefix, or name)
    pub fn matches(&self, reference: &str) -> bool {
        let reference = reference.trim_start_matches('/');
        if reference.is_empty() {
            return false;
        }
        (!self.id.is_empty() && self.id.starts_with(reference))
            || self.name.trim_start_matches('/') == reference
    }
}

/// Runtime state of a container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerState {
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub pid: i64,
}

/// Image-level and create-time process configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerConfig {
    #[serde(default, deserialize_with = "nullable")]
    pub hostname: String,
    #[serde(default, deserialize_with = "nullable")]
    pub domainname: String,
    #[serde(default, deserialize_with = "nullable")]
    pub user: String,
    #[serde(default, deserialize_with = "nullable")]
    pub env: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub cmd: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub entrypoint: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub working_dir: String,
    #[serde(default)]
    pub tty: bool,
}

/// Host-side settings: isolation modes, limits, and privileges
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostConfig {
    #[serde(default)]
    pub privileged: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub cap_add: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub cap_drop: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub security_opt: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub group_add: Vec<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub network_mode: String,
    #[serde(default, deserialize_with = "nullable")]
    pub pid_mode: String,
    #[serde(default, deserialize_with = "nullable")]
    pub ipc_mode: String,
    #[serde(rename = "UTSMode", default, deserialize_with = "nullable")]
    pub uts_mode: String,
    #[serde(default, deserialize_with = "nullable")]
    pub userns_mode: String,
    #[serde(default, deserialize_with = "nullable")]
    pub cgroupns_mode: String,
    #[serde(default, deserialize_with = "nullable")]
    pub cgroup_parent: String,

    #[serde(default)]
    pub readonly_rootfs: bool,
    #[serde(default)]
    pub shm_size: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub tmpfs: BTreeMap<String, String>,

    #[serde(default)]
    pub cpu_shares: i64,
    #[serde(default)]
    pub cpu_quota: i64,
    #[serde(default)]
    pub cpu_period: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub cpuset_cpus: String,
    #[serde(default, deserialize_with = "nullable")]
    pub cpuset_mems: String,
    #[serde(default)]
    pub memory: i64,
    #[serde(default)]
    pub memory_reservation: i64,
    #[serde(default)]
    pub memory_swap: i64,
    #[serde(default)]
    pub memory_swappiness: Option<i64>,
    #[serde(default)]
    pub kernel_memory: i64,
    #[serde(default)]
    pub blkio_weight: u16,
    #[serde(default)]
    pub pids_limit: Option<i64>,
    #[serde(default)]
    pub oom_kill_disable: Option<bool>,
    #[serde(default)]
    pub oom_score_adj: i64,

    #[serde(default, deserialize_with = "nullable")]
    pub devices: Vec<DeviceMapping>,
    #[serde(default, deserialize_with = "nullable")]
    pub device_cgroup_rules: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub ulimits: Vec<Ulimit>,
    #[serde(default, deserialize_with = "nullable")]
    pub sysctls: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "nullable")]
    pub masked_paths: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub readonly_paths: Vec<String>,
}

/// A host device exposed to the container (`--device`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceMapping {
    #[serde(default, deserialize_with = "nullable")]
    pub path_on_host: String,
    #[serde(default, deserialize_with = "nullable")]
    pub path_in_container: String,
    #[serde(default, deserialize_with = "nullable")]
    pub cgroup_permissions: String,
}

/// A resource limit (`--ulimit`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Ulimit {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default)]
    pub soft: i64,
    #[serde(default)]
    pub hard: i64,
}

/// Storage driver details; `Data` carries the driver's paths
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GraphDriver {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub data: BTreeMap<String, String>,
}

/// One entry of the container's mount list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MountPoint {
    /// `bind`, `volume` or `tmpfs`; older daemons leave this empty
    #[serde(default, deserialize_with = "nullable")]
    pub r#type: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub source: String,
    #[serde(default, deserialize_with = "nullable")]
    pub destination: String,
    #[serde(default, deserialize_with = "nullable")]
    pub driver: String,
    #[serde(default, deserialize_with = "nullable")]
    pub mode: String,
    #[serde(rename = "RW", default)]
    pub rw: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub propagation: String,
}

/// Daemon-wide information from `GET /info`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DaemonInfo {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub execution_driver: String,
    #[serde(rename = "OSType", default, deserialize_with = "nullable")]
    pub os_type: String,
    #[serde(default, deserialize_with = "nullable")]
    pub architecture: String,
    #[serde(default, deserialize_with = "nullable")]
    pub kernel_version: String,
    #[serde(default, deserialize_with = "nullable")]
    pub cgroup_driver: String,
    #[serde(default, deserialize_with = "nullable")]
    pub security_options: Vec<String>,
}

impl DaemonInfo {
    /// Whether the daemon runs containers in remapped user namespaces
    pub fn userns_remap(&self) -> bool {
        self.security_options
            .iter()
            .any(|opt| opt == "userns" || opt == "name=userns" || opt.starts_with("name=userns,"))
    }

    /// Whether container cgroups are managed through systemd
    pub fn systemd_cgroups(&self) -> bool {
        self.cgroup_driver == "systemd"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_tolerates_null_collections() {
        let snapshot: ContainerSnapshot = serde_json::from_value(json!({
            "Id": "4a1b",
            "Name": "/web",
            "Args": null,
            "Mounts": null,
            "Config": {"Env": null, "Cmd": null, "Entrypoint": null, "Tty": true},
            "HostConfig": {"CapAdd": null, "Sysctls": null, "Tmpfs": null, "UTSMode": "host"}
        }))
        .unwrap();

        assert!(snapshot.args.is_empty());
        assert!(snapshot.mounts.is_empty());
        let config = snapshot.config.as_ref().unwrap();
        assert!(config.env.is_empty());
        assert!(config.entrypoint.is_empty());
        assert!(config.tty);
        let host = snapshot.host_config.as_ref().unwrap();
        assert!(host.cap_add.is_empty());
        assert_eq!(host.uts_mode, "host");
    }

    #[test]
    fn test_missing_host_config_is_structural() {
        let snapshot: ContainerSnapshot =
            serde_json::from_value(json!({"Id": "4a1b", "Name": "/web"})).unwrap();
        let err = snapshot.require_host_config().unwrap_err();
        assert!(err.to_string().contains("HostConfig"));
        assert!(err.to_string().contains("web"));
    }

    #[test]
    fn test_snapshot_matches_reference() {
        let snapshot = ContainerSnapshot {
            id: "4a1b2c3d".to_string(),
            name: "/web".to_string(),
            ..Default::default()
        };
        assert!(snapshot.matches("web"));
        assert!(snapshot.matches("/web"));
        assert!(snapshot.matches("4a1b"));
        assert!(!snapshot.matches("db"));
        assert!(!snapshot.matches(""));

        assert!(snapshot.matches_exactly("4a1b2c3d"));
        assert!(snapshot.matches_exactly("/web"));
        assert!(!snapshot.matches_exactly("4a1b"));
    }

    #[test]
    fn test_daemon_info_flags() {
        let info: DaemonInfo = serde_json::from_value(json!({
            "OSType": "linux",
            "CgroupDriver": "systemd",
            "SecurityOptions": ["name=seccomp,profile=default", "name=userns"]
        }))
        .unwrap();
        assert_eq!(info.os_type, "linux");
        assert!(info.systemd_cgroups());
        assert!(info.userns_remap());
        assert!(!DaemonInfo::default().userns_remap());
    }
}
