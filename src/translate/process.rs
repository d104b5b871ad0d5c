// src/translate/process.rs

//! Process/bundle half of the translation: `config.json`
//!
//! Everything here is best effort except the root filesystem: a snapshot
//! without a resolvable rootfs cannot produce a usable bundle, any other gap
//! falls back to an empty or conventional default.

use super::ConvertOptions;
use super::users::UserLookup;
use crate::docker::{ContainerConfig, ContainerSnapshot, DaemonInfo, HostConfig, MountPoint};
use crate::error::{Error, Result};
use crate::spec::{Mount, Platform, Process, ProcessSpec, Root, SPEC_VERSION};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Working directory used when the image does not set one
pub const DEFAULT_CWD: &str = "/";

/// `GraphDriver.Data` keys holding the container's root filesystem, by preference
const ROOTFS_KEYS: &[&str] = &["MergedDir", "Mountpoint"];

/// Default `/dev/shm` size when the daemon does not record one
const DEFAULT_SHM_OPTION: &str = "size=65536k";

/// Options accepted as mount propagation modes
const PROPAGATION_MODES: &[&str] = &["private", "rprivate", "shared", "rshared", "slave", "rslave"];

/// Options `--tmpfs` mounts get when none are declared
const TMPFS_DEFAULT_OPTIONS: &[&str] = &["rw", "noexec", "nosuid", "nodev"];

/// Build the process/filesystem descriptor for a container
pub fn translate_process(
    snapshot: &ContainerSnapshot,
    info: &DaemonInfo,
    options: &ConvertOptions,
) -> Result<ProcessSpec> {
    let rootfs = resolve_rootfs(snapshot, options)?;
    debug!("Root filesystem for {}: {}", snapshot.display_name(), rootfs);

    let empty = ContainerConfig::default();
    let config = snapshot.config.as_ref().unwrap_or(&empty);
    let host = snapshot.host_config.as_ref();

    let user = UserLookup::from_rootfs(&lookup_root(&rootfs, options)).resolve(
        &config.user,
        host.map(|h| h.group_add.as_slice()).unwrap_or_default(),
    );

    let cwd = if config.working_dir.is_empty() {
        DEFAULT_CWD.to_string()
    } else {
        config.working_dir.clone()
    };

    Ok(ProcessSpec {
        version: SPEC_VERSION.to_string(),
        platform: platform(info),
        process: Process {
            terminal: config.tty,
            user,
            args: process_args(snapshot),
            env: merge_env(&config.env),
            cwd,
        },
        root: Root {
            path: rootfs,
            readonly: host.is_some_and(|h| h.readonly_rootfs),
        },
        mounts: translate_mounts(snapshot),
    })
}

/// Root filesystem from the override, else from the storage driver's data
pub fn resolve_rootfs(snapshot: &ContainerSnapshot, options: &ConvertOptions) -> Result<String> {
    if let Some(rootfs) = &options.rootfs {
        return Ok(rootfs.to_string_lossy().into_owned());
    }

    snapshot
        .graph_driver
        .as_ref()
        .and_then(|driver| {
            ROOTFS_KEYS
                .iter()
                .filter_map(|key| driver.data.get(*key))
                .find(|path| !path.is_empty())
        })
        .cloned()
        .ok_or_else(|| Error::MissingRootfs(snapshot.display_name().to_string()))
}

/// Where the root filesystem is on this machine; relative paths are bundle-relative
pub fn lookup_root(rootfs: &str, options: &ConvertOptions) -> PathBuf {
    let path = Path::new(rootfs);
    match &options.bundle {
        Some(bundle) if path.is_relative() => bundle.join(path),
        _ => path.to_path_buf(),
    }
}

/// Entrypoint followed by command; the resolved path and args when both are empty
pub fn process_args(snapshot: &ContainerSnapshot) -> Vec<String> {
    let args: Vec<String> = snapshot
        .config
        .iter()
        .flat_map(|c| c.entrypoint.iter().chain(c.cmd.iter()))
        .cloned()
        .collect();
    if !args.is_empty() {
        return args;
    }

    std::iter::once(&snapshot.path)
        .filter(|p| !p.is_empty())
        .chain(snapshot.args.iter())
        .cloned()
        .collect()
}

/// Collapse duplicate keys: the last value wins, at the key's first position
pub fn merge_env(env: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(env.len());
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for entry in env {
        let key = entry.split_once('=').map_or(entry.as_str(), |(k, _)| k);
        match positions.get(key) {
            Some(&i) => merged[i] = entry.clone(),
            None => {
                positions.insert(key, merged.len());
                merged.push(entry.clone());
            }
        }
    }
    merged
}

/// Platform from the daemon, in Go-style architecture names
pub fn platform(info: &DaemonInfo) -> Platform {
    let os = if info.os_type.is_empty() {
        "linux".to_string()
    } else {
        info.os_type.clone()
    };
    let arch = if info.architecture.is_empty() {
        std::env::consts::ARCH
    } else {
        info.architecture.as_str()
    };
    Platform {
        os,
        arch: go_arch(arch).to_string(),
    }
}

fn go_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "armv7l" | "armv6l" | "armhf" | "arm" => "arm",
        "i386" | "i686" | "x86" => "386",
        "ppc64le" | "powerpc64le" => "ppc64le",
        "s390x" => "s390x",
        "riscv64" => "riscv64",
        other => other,
    }
}

/// How the daemon attached a mount record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountKind {
    Bind,
    Volume,
    Tmpfs,
    Other(String),
}

impl MountKind {
    /// Explicit `Type`, else volume when named and driver-backed, else bind
    pub fn of(mount: &MountPoint) -> Self {
        match mount.r#type.as_str() {
            "bind" => Self::Bind,
            "volume" => Self::Volume,
            "tmpfs" => Self::Tmpfs,
            "" if !mount.name.is_empty() && !mount.driver.is_empty() => Self::Volume,
            "" => Self::Bind,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Translate one daemon mount record
pub fn translate_mount(mount: &MountPoint) -> Mount {
    let kind = MountKind::of(mount);
    let mut options: Vec<String> = mount
        .mode
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect();
    let has = |options: &[String], names: &[&str]| {
        options.iter().any(|o| names.contains(&o.as_str()))
    };

    if matches!(kind, MountKind::Bind | MountKind::Volume) && !has(&options, &["bind", "rbind"]) {
        options.push("rbind".to_string());
    }
    if !has(&options, &["ro", "rw"]) {
        options.push(if mount.rw { "rw" } else { "ro" }.to_string());
    }
    if !mount.propagation.is_empty() && !has(&options, PROPAGATION_MODES) {
        options.push(mount.propagation.clone());
    }

    let (fs_type, source) = match kind {
        MountKind::Bind | MountKind::Volume => ("bind".to_string(), mount.source.clone()),
        MountKind::Tmpfs if mount.source.is_empty() => ("tmpfs".to_string(), "tmpfs".to_string()),
        MountKind::Tmpfs => ("tmpfs".to_string(), mount.source.clone()),
        MountKind::Other(t) => (t, mount.source.clone()),
    };

    Mount {
        destination: mount.destination.clone(),
        kind: fs_type,
        source,
        options,
    }
}

/// System mounts every container gets
fn default_mounts(host: Option<&HostConfig>) -> Vec<Mount> {
    let privileged = host.is_some_and(|h| h.privileged);
    let shm = match host {
        Some(h) if h.ipc_mode == "host" => {
            Mount::new("/dev/shm", "bind", "/dev/shm", &["rbind", "rprivate"])
        }
        _ => {
            let mut shm = Mount::new(
                "/dev/shm",
                "tmpfs",
                "shm",
                &["nosuid", "noexec", "nodev", "mode=1777"],
            );
            shm.options.push(match host {
                Some(h) if h.shm_size > 0 => format!("size={}", h.shm_size),
                _ => DEFAULT_SHM_OPTION.to_string(),
            });
            shm
        }
    };

    let mut sys = Mount::new("/sys", "sysfs", "sysfs", &["nosuid", "noexec", "nodev"]);
    let mut cgroup = Mount::new(
        "/sys/fs/cgroup",
        "cgroup",
        "cgroup",
        &["nosuid", "noexec", "nodev", "relatime"],
    );
    if !privileged {
        sys.options.push("ro".to_string());
        cgroup.options.push("ro".to_string());
    }

    vec![
        Mount::new("/proc", "proc", "proc", &["nosuid", "noexec", "nodev"]),
        Mount::new(
            "/dev",
            "tmpfs",
            "tmpfs",
            &["nosuid", "strictatime", "mode=755", "size=65536k"],
        ),
        Mount::new(
            "/dev/pts",
            "devpts",
            "devpts",
            &["nosuid", "noexec", "newinstance", "ptmxmode=0666", "mode=0620", "gid=5"],
        ),
        shm,
        Mount::new("/dev/mqueue", "mqueue", "mqueue", &["nosuid", "noexec", "nodev"]),
        sys,
        cgroup,
    ]
}

/// Daemon-managed `/etc` files
fn network_file_mounts(snapshot: &ContainerSnapshot) -> Vec<Mount> {
    [
        ("/etc/resolv.conf", &snapshot.resolv_conf_path),
        ("/etc/hostname", &snapshot.hostname_path),
        ("/etc/hosts", &snapshot.hosts_path),
    ]
    .into_iter()
    .filter(|(_, source)| !source.is_empty())
    .map(|(destination, source)| Mount::new(destination, "bind", source, &["rbind", "rprivate"]))
    .collect()
}

/// `--tmpfs` mounts, in destination order
fn tmpfs_mounts(host: Option<&HostConfig>) -> Vec<Mount> {
    let Some(host) = host else {
        return Vec::new();
    };
    host.tmpfs
        .iter()
        .map(|(destination, options)| {
            let mut options: Vec<String> = options
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
            if options.is_empty() {
                options = TMPFS_DEFAULT_OPTIONS.iter().map(|o| o.to_string()).collect();
            }
            Mount {
                destination: destination.clone(),
                kind: "tmpfs".to_string(),
                source: "tmpfs".to_string(),
                options,
            }
        })
        .collect()
}

fn destination_key(destination: &str) -> &str {
    let trimmed = destination.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

/// Keep mounts whose destination is not yet taken, then take theirs
fn keep_untaken(mounts: Vec<Mount>, taken: &mut HashSet<String>) -> Vec<Mount> {
    let kept: Vec<Mount> = mounts
        .into_iter()
        .filter(|m| {
            let free = !taken.contains(destination_key(&m.destination));
            if !free {
                debug!("Mount at {} overridden by container mount", m.destination);
            }
            free
        })
        .collect();
    taken.extend(kept.iter().map(|m| destination_key(&m.destination).to_string()));
    kept
}

/// Full mount list: defaults, daemon files, tmpfs, then container mounts
pub fn translate_mounts(snapshot: &ContainerSnapshot) -> Vec<Mount> {
    let host = snapshot.host_config.as_ref();
    let declared: Vec<Mount> = snapshot.mounts.iter().map(translate_mount).collect();

    let mut taken: HashSet<String> = declared
        .iter()
        .map(|m| destination_key(&m.destination).to_string())
        .collect();
    let tmpfs = keep_untaken(tmpfs_mounts(host), &mut taken);
    let files = keep_untaken(network_file_mounts(snapshot), &mut taken);
    let defaults = keep_untaken(default_mounts(host), &mut taken);

    let mut mounts = defaults;
    mounts.extend(files);
    mounts.extend(tmpfs);
    mounts.extend(declared);
    mounts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docker::GraphDriver;

    fn snapshot() -> ContainerSnapshot {
        ContainerSnapshot {
            id: "c0ffee".to_string(),
            name: "/sleeper".to_string(),
            config: Some(ContainerConfig {
                cmd: vec!["sleep".to_string(), "10".to_string()],
                env: vec!["A=1".to_string(), "A=2".to_string()],
                ..Default::default()
            }),
            host_config: Some(HostConfig::default()),
            graph_driver: Some(GraphDriver {
                name: "overlay2".to_string(),
                data: [("MergedDir".to_string(), "/var/lib/docker/overlay2/abc/merged".to_string())]
                    .into_iter()
                    .collect(),
            }),
            mounts: vec![MountPoint {
                r#type: "bind".to_string(),
                source: "/tmp".to_string(),
                destination: "/tmp".to_string(),
                rw: true,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn translate(snapshot: &ContainerSnapshot) -> ProcessSpec {
        translate_process(snapshot, &DaemonInfo::default(), &ConvertOptions::default()).unwrap()
    }

    #[test]
    fn test_sleep_example() {
        let spec = translate(&snapshot());
        assert_eq!(spec.process.args, vec!["sleep", "10"]);
        assert_eq!(spec.process.env, vec!["A=2"]);
        assert_eq!(spec.process.cwd, "/");
        assert_eq!(spec.root.path, "/var/lib/docker/overlay2/abc/merged");

        let user_mounts: Vec<&Mount> = spec
            .mounts
            .iter()
            .filter(|m| m.destination == "/tmp")
            .collect();
        assert_eq!(user_mounts.len(), 1);
        assert_eq!(user_mounts[0].kind, "bind");
        assert_eq!(user_mounts[0].source, "/tmp");
        assert_eq!(spec.mounts.last().unwrap(), user_mounts[0]);
    }

    #[test]
    fn test_entrypoint_precedes_cmd() {
        let mut snap = snapshot();
        if let Some(config) = snap.config.as_mut() {
            config.entrypoint = vec!["/docker-entrypoint.sh".to_string()];
            config.cmd = vec!["nginx".to_string(), "-g".to_string()];
        }
        assert_eq!(process_args(&snap), vec!["/docker-entrypoint.sh", "nginx", "-g"]);
    }

    #[test]
    fn test_args_fall_back_to_resolved_path() {
        let snap = ContainerSnapshot {
            path: "/bin/sh".to_string(),
            args: vec!["-c".to_string(), "true".to_string()],
            ..Default::default()
        };
        assert_eq!(process_args(&snap), vec!["/bin/sh", "-c", "true"]);
        assert!(process_args(&ContainerSnapshot::default()).is_empty());
    }

    #[test]
    fn test_merge_env_last_wins_at_first_position() {
        let env: Vec<String> = ["PATH=/bin", "A=1", "B", "A=2", "B=x"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(merge_env(&env), vec!["PATH=/bin", "A=2", "B=x"]);
    }

    #[test]
    fn test_missing_rootfs_is_fatal() {
        let mut snap = snapshot();
        snap.graph_driver = None;
        let err = translate_process(&snap, &DaemonInfo::default(), &ConvertOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::MissingRootfs(ref name) if name == "sleeper"));
    }

    #[test]
    fn test_rootfs_override() {
        let mut snap = snapshot();
        snap.graph_driver = None;
        let options = ConvertOptions {
            rootfs: Some(PathBuf::from("rootfs")),
            ..Default::default()
        };
        let spec = translate_process(&snap, &DaemonInfo::default(), &options).unwrap();
        assert_eq!(spec.root.path, "rootfs");
    }

    #[test]
    fn test_relative_rootfs_users_read_from_bundle() {
        let bundle = tempfile::tempdir().unwrap();
        let etc = bundle.path().join("rootfs").join("etc");
        std::fs::create_dir_all(&etc).unwrap();
        std::fs::write(etc.join("passwd"), "app:x:1000:1000::/home/app:/bin/sh\n").unwrap();
        std::fs::write(etc.join("group"), "app:x:1000:\n").unwrap();

        let mut snap = snapshot();
        snap.config.as_mut().unwrap().user = "app".to_string();
        let options = ConvertOptions {
            rootfs: Some(PathBuf::from("rootfs")),
            bundle: Some(bundle.path().to_path_buf()),
        };
        let spec = translate_process(&snap, &DaemonInfo::default(), &options).unwrap();
        assert_eq!(spec.root.path, "rootfs");
        assert_eq!((spec.process.user.uid, spec.process.user.gid), (1000, 1000));

        assert_eq!(lookup_root("/srv/rootfs", &options), PathBuf::from("/srv/rootfs"));
    }

    #[test]
    fn test_terminal_and_readonly_carried() {
        let mut snap = snapshot();
        snap.config.as_mut().unwrap().tty = true;
        snap.host_config.as_mut().unwrap().readonly_rootfs = true;
        let spec = translate(&snap);
        assert!(spec.process.terminal);
        assert!(spec.root.readonly);
    }

    #[test]
    fn test_missing_config_degrades() {
        let mut snap = snapshot();
        snap.config = None;
        snap.host_config = None;
        let spec = translate(&snap);
        assert!(spec.process.args.is_empty());
        assert!(spec.process.env.is_empty());
        assert!(!spec.process.terminal);
        assert_eq!(spec.process.cwd, DEFAULT_CWD);
    }

    #[test]
    fn test_platform_names() {
        let info = DaemonInfo {
            os_type: "linux".to_string(),
            architecture: "aarch64".to_string(),
            ..Default::default()
        };
        assert_eq!(platform(&info).arch, "arm64");
        assert_eq!(platform(&info).os, "linux");
        assert_eq!(go_arch("x86_64"), "amd64");
        assert_eq!(go_arch("mips64"), "mips64");
    }

    #[test]
    fn test_mount_kind_inference() {
        let volume = MountPoint {
            name: "data".to_string(),
            driver: "local".to_string(),
            ..Default::default()
        };
        assert_eq!(MountKind::of(&volume), MountKind::Volume);
        assert_eq!(MountKind::of(&MountPoint::default()), MountKind::Bind);
    }

    #[test]
    fn test_mount_options_verbatim_plus_implied() {
        let mount = MountPoint {
            r#type: "volume".to_string(),
            name: "data".to_string(),
            source: "/var/lib/docker/volumes/data/_data".to_string(),
            destination: "/data".to_string(),
            mode: "z,nocopy".to_string(),
            rw: false,
            propagation: "rshared".to_string(),
            ..Default::default()
        };
        let translated = translate_mount(&mount);
        assert_eq!(translated.kind, "bind");
        assert_eq!(translated.options, vec!["z", "nocopy", "rbind", "ro", "rshared"]);

        let explicit = MountPoint {
            mode: "ro,bind".to_string(),
            rw: true,
            ..mount
        };
        assert_eq!(translate_mount(&explicit).options, vec!["ro", "bind", "rshared"]);
    }

    #[test]
    fn test_tmpfs_mount_record() {
        let mount = MountPoint {
            r#type: "tmpfs".to_string(),
            destination: "/run".to_string(),
            rw: true,
            ..Default::default()
        };
        let translated = translate_mount(&mount);
        assert_eq!(translated.kind, "tmpfs");
        assert_eq!(translated.source, "tmpfs");
        assert_eq!(translated.options, vec!["rw"]);
    }

    #[test]
    fn test_default_mounts_yield_to_container_mounts() {
        let mut snap = snapshot();
        snap.resolv_conf_path = "/var/lib/docker/containers/c0ffee/resolv.conf".to_string();
        snap.mounts.push(MountPoint {
            r#type: "bind".to_string(),
            source: "/srv/shm".to_string(),
            destination: "/dev/shm/".to_string(),
            rw: true,
            ..Default::default()
        });
        snap.host_config
            .as_mut()
            .unwrap()
            .tmpfs
            .insert("/etc/resolv.conf".to_string(), String::new());

        let mounts = translate_mounts(&snap);
        let at = |dest: &str| {
            mounts
                .iter()
                .filter(|m| destination_key(&m.destination) == dest)
                .count()
        };
        assert_eq!(at("/dev/shm"), 1);
        assert_eq!(at("/etc/resolv.conf"), 1);
        assert_eq!(at("/proc"), 1);

        let resolv = mounts.iter().find(|m| m.destination == "/etc/resolv.conf").unwrap();
        assert_eq!(resolv.kind, "tmpfs");
        assert_eq!(resolv.options, TMPFS_DEFAULT_OPTIONS);
    }

    #[test]
    fn test_privileged_sysfs_is_writable() {
        let mut snap = snapshot();
        let sys = |snap: &ContainerSnapshot| {
            translate_mounts(snap)
                .into_iter()
                .find(|m| m.destination == "/sys")
                .unwrap()
        };
        assert!(sys(&snap).options.contains(&"ro".to_string()));
        snap.host_config.as_mut().unwrap().privileged = true;
        assert!(!sys(&snap).options.contains(&"ro".to_string()));
    }

    #[test]
    fn test_shm_size() {
        let mut snap = snapshot();
        snap.host_config.as_mut().unwrap().shm_size = 134217728;
        let mounts = translate_mounts(&snap);
        let shm = mounts.iter().find(|m| m.destination == "/dev/shm").unwrap();
        assert!(shm.options.contains(&"size=134217728".to_string()));
    }
}
