// src/capability/mod.rs
//! Linux capability lists for the runtime descriptor
//!
//! A container's capabilities are the execution driver's default template
//! adjusted by the container's `CapAdd` / `CapDrop` lists:
//!
//! 1. start from the template, in template order
//! 2. append each added capability that is not already present
//! 3. remove every occurrence of each dropped capability
//!
//! Drops are applied last, so a capability named in both lists is dropped.
//! Names are opaque strings here; the target runtime validates them.

use crate::docker::{DaemonInfo, HostConfig};
use tracing::{debug, warn};

/// Keyword accepted by the daemon in `CapAdd` / `CapDrop` meaning every capability
pub const ALL_KEYWORD: &str = "ALL";

/// Default capabilities granted by the native execution driver
pub const NATIVE_TEMPLATE: &[&str] = &[
    "CAP_CHOWN",
    "CAP_DAC_OVERRIDE",
    "CAP_FSETID",
    "CAP_FOWNER",
    "CAP_MKNOD",
    "CAP_NET_RAW",
    "CAP_SETGID",
    "CAP_SETUID",
    "CAP_SETFCAP",
    "CAP_SETPCAP",
    "CAP_NET_BIND_SERVICE",
    "CAP_SYS_CHROOT",
    "CAP_KILL",
    "CAP_AUDIT_WRITE",
];

/// Every capability known to the Linux kernel, in kernel numbering order
pub const ALL_CAPABILITIES: &[&str] = &[
    "CAP_CHOWN",
    "CAP_DAC_OVERRIDE",
    "CAP_DAC_READ_SEARCH",
    "CAP_FOWNER",
    "CAP_FSETID",
    "CAP_KILL",
    "CAP_SETGID",
    "CAP_SETUID",
    "CAP_SETPCAP",
    "CAP_LINUX_IMMUTABLE",
    "CAP_NET_BIND_SERVICE",
    "CAP_NET_BROADCAST",
    "CAP_NET_ADMIN",
    "CAP_NET_RAW",
    "CAP_IPC_LOCK",
    "CAP_IPC_OWNER",
    "CAP_SYS_MODULE",
    "CAP_SYS_RAWIO",
    "CAP_SYS_CHROOT",
    "CAP_SYS_PTRACE",
    "CAP_SYS_PACCT",
    "CAP_SYS_ADMIN",
    "CAP_SYS_BOOT",
    "CAP_SYS_NICE",
    "CAP_SYS_RESOURCE",
    "CAP_SYS_TIME",
    "CAP_SYS_TTY_CONFIG",
    "CAP_MKNOD",
    "CAP_LEASE",
    "CAP_AUDIT_WRITE",
    "CAP_AUDIT_CONTROL",
    "CAP_SETFCAP",
    "CAP_MAC_OVERRIDE",
    "CAP_MAC_ADMIN",
    "CAP_SYSLOG",
    "CAP_WAKE_ALARM",
    "CAP_BLOCK_SUSPEND",
    "CAP_AUDIT_READ",
    "CAP_PERFMON",
    "CAP_BPF",
    "CAP_CHECKPOINT_RESTORE",
];

/// Ordered, duplicate-free list of capability names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    names: Vec<String>,
}

impl CapabilitySet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set from a template, keeping the first occurrence of repeats
    pub fn from_template<I, S>(template: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for name in template {
            set.append(name.as_ref());
        }
        set
    }

    /// Append `name` unless it is already present; returns whether it was added
    pub fn append(&mut self, name: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        self.names.push(name.to_string());
        true
    }

    /// Remove every occurrence of `name`; returns whether anything was removed
    pub fn remove_all(&mut self, name: &str) -> bool {
        let before = self.names.len();
        self.names.retain(|n| n != name);
        self.names.len() != before
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.names
    }
}

/// Apply add/drop deltas to a template
///
/// The result holds the template (in its order) followed by newly added names
/// (in `add` order), minus every name in `drop`.
pub fn map_capabilities<T, A, D>(template: &[T], add: &[A], drop: &[D]) -> CapabilitySet
where
    T: AsRef<str>,
    A: AsRef<str>,
    D: AsRef<str>,
{
    let mut set = CapabilitySet::from_template(template);
    for name in add {
        set.append(name.as_ref());
    }
    for name in drop {
        set.remove_all(name.as_ref());
    }
    set
}

/// Default capability template for an execution driver
pub fn driver_template(driver: &str) -> &'static [&'static str] {
    if driver.is_empty() || driver.starts_with("native") {
        debug!("Using native capability template for driver {:?}", driver);
    } else {
        warn!(
            "Unknown execution driver {:?}, using native capability template",
            driver
        );
    }
    NATIVE_TEMPLATE
}

/// Canonical `CAP_`-prefixed upper-case form of a daemon capability name
pub fn canonical_name(name: &str) -> String {
    let upper = name.trim().to_uppercase();
    if upper == ALL_KEYWORD || upper.starts_with("CAP_") {
        upper
    } else {
        format!("CAP_{}", upper)
    }
}

/// Capabilities for a container, from its host config and the daemon defaults
///
/// Privileged containers, or an `ALL` in `CapAdd`, start from every capability;
/// an `ALL` in `CapDrop` starts from nothing.
pub fn container_capabilities(host: &HostConfig, info: &DaemonInfo) -> CapabilitySet {
    let add: Vec<String> = host.cap_add.iter().map(|c| canonical_name(c)).collect();
    let drop: Vec<String> = host.cap_drop.iter().map(|c| canonical_name(c)).collect();

    let template: &[&str] = if host.privileged || add.iter().any(|c| c == ALL_KEYWORD) {
        ALL_CAPABILITIES
    } else {
        driver_template(&info.execution_driver)
    };
    let template: &[&str] = if drop.iter().any(|c| c == ALL_KEYWORD) {
        &[]
    } else {
        template
    };

    let add: Vec<&String> = add.iter().filter(|c| *c != ALL_KEYWORD).collect();
    let drop: Vec<&String> = drop.iter().filter(|c| *c != ALL_KEYWORD).collect();
    let set = map_capabilities(template, &add, &drop);
    debug!("Container capabilities: {} entries", set.len());
    set
}
