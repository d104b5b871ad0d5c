// src/translate/devices.rs

//! Device cgroup rules and device nodes
//!
//! Rules are an ordered allow-list evaluated by the runtime front to back:
//! deny everything, then re-allow the devices every container needs, then the
//! devices and rules the container was created with.

use crate::docker::{DeviceMapping, HostConfig};
use crate::spec::{Device, DeviceRule};
use nix::sys::stat::{SFlag, major, minor, stat};
use std::path::Path;
use tracing::{debug, warn};

/// Devices every unprivileged container may use, in device cgroup syntax
pub const DEFAULT_ALLOWED: &[&str] = &[
    // mknod of any character or block device
    "c *:* m",
    "b *:* m",
    // /dev/null, /dev/zero, /dev/full
    "c 1:3 rwm",
    "c 1:5 rwm",
    "c 1:7 rwm",
    // /dev/random, /dev/urandom
    "c 1:8 rwm",
    "c 1:9 rwm",
    // /dev/tty, /dev/console, /dev/ptmx
    "c 5:0 rwm",
    "c 5:1 rwm",
    "c 5:2 rwm",
    // /dev/pts/*
    "c 136:* rwm",
    // /dev/net/tun
    "c 10:200 rwm",
];

/// Access granted when a `--device` mapping does not say
const DEFAULT_PERMISSIONS: &str = "rwm";

/// Rule granting every device
pub fn allow_all() -> DeviceRule {
    DeviceRule {
        allow: true,
        access: Some("rwm".to_string()),
        ..Default::default()
    }
}

/// Rule denying every device
pub fn deny_all() -> DeviceRule {
    DeviceRule {
        allow: false,
        access: Some("rwm".to_string()),
        ..Default::default()
    }
}

/// Parse `type major:minor access`, where major/minor may be `*`
pub fn parse_cgroup_rule(rule: &str) -> Option<DeviceRule> {
    let mut fields = rule.split_whitespace();
    let kind = fields.next()?;
    let numbers = fields.next()?;
    let access = fields.next()?;
    if fields.next().is_some() {
        return None;
    }

    if !matches!(kind, "a" | "b" | "c") {
        return None;
    }
    if access.is_empty() || !access.chars().all(|c| matches!(c, 'r' | 'w' | 'm')) {
        return None;
    }

    let (major, minor) = numbers.split_once(':')?;
    let number = |s: &str| -> Option<Option<i64>> {
        if s == "*" {
            Some(None)
        } else {
            s.parse::<i64>().ok().filter(|n| *n >= 0).map(Some)
        }
    };

    Some(DeviceRule {
        allow: true,
        kind: Some(kind.to_string()),
        major: number(major)?,
        minor: number(minor)?,
        access: Some(access.to_string()),
    })
}

/// Type and numbers of a device node on the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostDevice {
    /// `c` or `b`
    pub kind: char,
    pub major: i64,
    pub minor: i64,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
}

/// Stat a host path; `None` when it is unreadable or not a device node
pub fn probe_host_device(path: &Path) -> Option<HostDevice> {
    let st = match stat(path) {
        Ok(st) => st,
        Err(e) => {
            warn!("Cannot stat device {}: {}", path.display(), e);
            return None;
        }
    };

    let file_type = SFlag::from_bits_truncate(st.st_mode & SFlag::S_IFMT.bits());
    let kind = if file_type == SFlag::S_IFCHR {
        'c'
    } else if file_type == SFlag::S_IFBLK {
        'b'
    } else {
        warn!("{} is not a device node, skipping", path.display());
        return None;
    };

    Some(HostDevice {
        kind,
        major: major(st.st_rdev) as i64,
        minor: minor(st.st_rdev) as i64,
        mode: st.st_mode & 0o7777,
        uid: st.st_uid,
        gid: st.st_gid,
    })
}

/// Rule and node for one `--device` mapping
fn mapped_device(mapping: &DeviceMapping) -> Option<(DeviceRule, Device)> {
    let dev = probe_host_device(Path::new(&mapping.path_on_host))?;
    let access = if mapping.cgroup_permissions.is_empty() {
        DEFAULT_PERMISSIONS
    } else {
        mapping.cgroup_permissions.as_str()
    };
    let path = if mapping.path_in_container.is_empty() {
        &mapping.path_on_host
    } else {
        &mapping.path_in_container
    };
    debug!(
        "Mapping device {} ({} {}:{}) to {}",
        mapping.path_on_host, dev.kind, dev.major, dev.minor, path
    );

    let rule = DeviceRule {
        allow: true,
        kind: Some(dev.kind.to_string()),
        major: Some(dev.major),
        minor: Some(dev.minor),
        access: Some(access.to_string()),
    };
    let node = Device {
        path: path.clone(),
        kind: dev.kind.to_string(),
        major: dev.major,
        minor: dev.minor,
        file_mode: Some(dev.mode),
        uid: Some(dev.uid),
        gid: Some(dev.gid),
    };
    Some((rule, node))
}

/// Device cgroup rules and device nodes for a container
pub fn device_rules(host: &HostConfig) -> (Vec<DeviceRule>, Vec<Device>) {
    let mapped: Vec<(DeviceRule, Device)> = host.devices.iter().filter_map(mapped_device).collect();
    let nodes = mapped.iter().map(|(_, node)| node.clone()).collect();

    if host.privileged {
        return (vec![allow_all()], nodes);
    }

    let mut rules = vec![deny_all()];
    rules.extend(DEFAULT_ALLOWED.iter().filter_map(|r| parse_cgroup_rule(r)));
    rules.extend(mapped.into_iter().map(|(rule, _)| rule));
    for raw in &host.device_cgroup_rules {
        match parse_cgroup_rule(raw) {
            Some(rule) => rules.push(rule),
            None => warn!("Invalid device cgroup rule {:?}, skipping", raw),
        }
    }
    (rules, nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cgroup_rule() {
        assert_eq!(
            parse_cgroup_rule("c 1:3 rwm"),
            Some(DeviceRule {
                allow: true,
                kind: Some("c".to_string()),
                major: Some(1),
                minor: Some(3),
                access: Some("rwm".to_string()),
            })
        );
        let wildcard = parse_cgroup_rule("b 8:* r").unwrap();
        assert_eq!(wildcard.major, Some(8));
        assert_eq!(wildcard.minor, None);
    }

    #[test]
    fn test_parse_cgroup_rule_rejects_garbage() {
        for bad in [
            "",
            "c 1:3",
            "x 1:3 rwm",
            "c 1-3 rwm",
            "c 1:3 rwx",
            "c -1:3 r",
            "c 1:3 r extra",
        ] {
            assert!(parse_cgroup_rule(bad).is_none(), "{bad:?} parsed");
        }
    }

    #[test]
    fn test_default_rules_all_parse() {
        let parsed = DEFAULT_ALLOWED.iter().filter_map(|r| parse_cgroup_rule(r)).count();
        assert_eq!(parsed, DEFAULT_ALLOWED.len());
    }

    #[test]
    fn test_privileged_allows_everything() {
        let host = HostConfig {
            privileged: true,
            device_cgroup_rules: vec!["c 4:* rw".to_string()],
            ..Default::default()
        };
        let (rules, nodes) = device_rules(&host);
        assert_eq!(rules, vec![allow_all()]);
        assert!(nodes.is_empty());
    }

    #[test]
    fn test_rule_order() {
        let host = HostConfig {
            device_cgroup_rules: vec!["c 4:* rw".to_string(), "bogus".to_string()],
            ..Default::default()
        };
        let (rules, _) = device_rules(&host);
        assert_eq!(rules[0], deny_all());
        assert_eq!(rules.len(), 1 + DEFAULT_ALLOWED.len() + 1);
        let last = rules.last().unwrap();
        assert_eq!((last.major, last.minor), (Some(4), None));
    }

    #[test]
    fn test_mapped_host_device() {
        let host = HostConfig {
            devices: vec![
                DeviceMapping {
                    path_on_host: "/dev/null".to_string(),
                    path_in_container: "/dev/sink".to_string(),
                    cgroup_permissions: "rw".to_string(),
                },
                DeviceMapping {
                    path_on_host: "/dev/riddler-missing".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let (rules, nodes) = device_rules(&host);

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].path, "/dev/sink");
        assert_eq!((nodes[0].kind.as_str(), nodes[0].major, nodes[0].minor), ("c", 1, 3));

        let rule = &rules[1 + DEFAULT_ALLOWED.len()];
        assert_eq!(rule.major, Some(1));
        assert_eq!(rule.minor, Some(3));
        assert_eq!(rule.access.as_deref(), Some("rw"));
    }

    #[test]
    fn test_regular_file_is_not_a_device() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(probe_host_device(file.path()).is_none());
    }
}
