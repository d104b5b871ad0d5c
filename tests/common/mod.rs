// tests/common/mod.rs

//! Shared fixtures for integration tests.

#![allow(dead_code)]

use riddler::docker::{ContainerSnapshot, DaemonInfo, DaemonSource};
use riddler::hooks::ExecutableResolver;
use riddler::{Error, Result};
use serde_json::{Value, json};
use std::cell::Cell;
use std::path::{Path, PathBuf};

/// `docker inspect` output for a small web container.
pub fn web_inspect() -> Value {
    json!({
        "Id": "8dfafdbc3a40a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a",
        "Name": "/web",
        "Path": "nginx",
        "Args": ["-g", "daemon off;"],
        "State": {"Running": true, "Pid": 4321},
        "Config": {
            "Hostname": "8dfafdbc3a40",
            "User": "",
            "Env": [
                "PATH=/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin",
                "NGINX_VERSION=1.25.3"
            ],
            "Cmd": ["nginx", "-g", "daemon off;"],
            "Entrypoint": ["/docker-entrypoint.sh"],
            "WorkingDir": "",
            "Tty": false
        },
        "HostConfig": {
            "NetworkMode": "bridge",
            "PidMode": "",
            "IpcMode": "private",
            "UTSMode": "",
            "CapAdd": ["NET_ADMIN"],
            "CapDrop": ["MKNOD"],
            "Memory": 268435456,
            "MemorySwap": -1,
            "CpuShares": 0,
            "PidsLimit": null,
            "Ulimits": [{"Name": "nofile", "Soft": 1024, "Hard": 4096}],
            "Sysctls": {"net.ipv4.ip_forward": "1"},
            "Tmpfs": null,
            "Devices": null
        },
        "GraphDriver": {
            "Name": "overlay2",
            "Data": {"MergedDir": "/var/lib/docker/overlay2/5f1e/merged"}
        },
        "Mounts": [{
            "Type": "bind",
            "Source": "/srv/www",
            "Destination": "/usr/share/nginx/html",
            "Mode": "",
            "RW": false,
            "Propagation": "rprivate"
        }],
        "ResolvConfPath": "/var/lib/docker/containers/8dfafdbc3a40/resolv.conf",
        "HostnamePath": "/var/lib/docker/containers/8dfafdbc3a40/hostname",
        "HostsPath": "/var/lib/docker/containers/8dfafdbc3a40/hosts",
        "AppArmorProfile": "docker-default"
    })
}

/// A sidecar sharing the web container's network namespace.
pub fn sidecar_inspect() -> Value {
    json!({
        "Id": "51de0a2b9c8d7e6f",
        "Name": "/sidecar",
        "State": {"Running": true, "Pid": 5000},
        "Config": {"Cmd": ["sleep", "10"], "Env": ["A=1", "A=2"]},
        "HostConfig": {"NetworkMode": "container:web", "UTSMode": "host"},
        "GraphDriver": {
            "Name": "overlay2",
            "Data": {"MergedDir": "/var/lib/docker/overlay2/9a0b/merged"}
        },
        "Mounts": [{"Type": "bind", "Source": "/tmp", "Destination": "/tmp", "RW": true}]
    })
}

/// `docker info` output.
pub fn daemon_info() -> Value {
    json!({
        "Name": "buildhost",
        "ExecutionDriver": "native-0.2",
        "OSType": "linux",
        "Architecture": "x86_64",
        "CgroupDriver": "cgroupfs",
        "SecurityOptions": ["name=apparmor", "name=seccomp,profile=default"]
    })
}

/// In-memory daemon that counts every call.
pub struct FakeSource {
    pub containers: Vec<ContainerSnapshot>,
    pub info: DaemonInfo,
    pub calls: Cell<usize>,
}

impl FakeSource {
    pub fn new(containers: &[Value]) -> Self {
        Self {
            containers: containers
                .iter()
                .map(|c| serde_json::from_value(c.clone()).unwrap())
                .collect(),
            info: serde_json::from_value(daemon_info()).unwrap(),
            calls: Cell::new(0),
        }
    }
}

impl DaemonSource for FakeSource {
    fn inspect_container(&self, reference: &str) -> Result<ContainerSnapshot> {
        self.calls.set(self.calls.get() + 1);
        self.containers
            .iter()
            .find(|c| c.matches(reference))
            .cloned()
            .ok_or_else(|| Error::MissingField {
                container: reference.to_string(),
                field: "Id",
            })
    }

    fn info(&self) -> Result<DaemonInfo> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.info.clone())
    }
}

/// Resolves every hook executable under `/opt/hooks`.
pub struct HookDir;

impl ExecutableResolver for HookDir {
    fn resolve(&self, executable: &str) -> std::result::Result<PathBuf, String> {
        if executable.starts_with("missing") {
            return Err("executable file not found in $PATH".to_string());
        }
        Ok(Path::new("/opt/hooks").join(executable))
    }
}
