// src/translate/users.rs

//! Resolve `Config.User` and `HostConfig.GroupAdd` to numeric ids
//!
//! Names are looked up in the container's own `/etc/passwd` and `/etc/group`,
//! read from the root filesystem when it is readable from here.

use crate::spec::User;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Ids used when a named user or group cannot be resolved
pub const NOBODY: u32 = 65534;

#[derive(Debug, Clone, PartialEq, Eq)]
struct PasswdEntry {
    name: String,
    uid: u32,
    gid: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct GroupEntry {
    name: String,
    gid: u32,
    members: Vec<String>,
}

/// Parsed account databases of a root filesystem
#[derive(Debug, Clone, Default)]
pub struct UserLookup {
    passwd: Vec<PasswdEntry>,
    groups: Vec<GroupEntry>,
}

impl UserLookup {
    /// Read `etc/passwd` and `etc/group` under `root`; missing files are empty
    pub fn from_rootfs(root: &Path) -> Self {
        let read = |name: &str| {
            let path = root.join("etc").join(name);
            match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    debug!("Cannot read {}: {}", path.display(), e);
                    String::new()
                }
            }
        };
        Self::parse(&read("passwd"), &read("group"))
    }

    /// Build from file contents
    pub fn parse(passwd: &str, group: &str) -> Self {
        let passwd = records(passwd)
            .filter_map(|fields| {
                Some(PasswdEntry {
                    name: fields.first()?.to_string(),
                    uid: fields.get(2)?.parse().ok()?,
                    gid: fields.get(3)?.parse().ok()?,
                })
            })
            .collect();

        let groups = records(group)
            .filter_map(|fields| {
                Some(GroupEntry {
                    name: fields.first()?.to_string(),
                    gid: fields.get(2)?.parse().ok()?,
                    members: fields
                        .get(3)
                        .map(|m| {
                            m.split(',')
                                .map(str::trim)
                                .filter(|s| !s.is_empty())
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default(),
                })
            })
            .collect();

        Self { passwd, groups }
    }

    /// Resolve `user[:group]` plus extra groups into descriptor ids
    pub fn resolve(&self, spec: &str, group_add: &[String]) -> User {
        let (user_part, group_part) = match spec.split_once(':') {
            Some((u, g)) => (u, Some(g)),
            None => (spec, None),
        };

        let (uid, mut gid, username) = if user_part.is_empty() {
            (0, 0, self.passwd_by_uid(0).map(|p| p.name.clone()))
        } else if let Ok(uid) = user_part.parse::<u32>() {
            let entry = self.passwd_by_uid(uid);
            (uid, entry.map_or(0, |p| p.gid), entry.map(|p| p.name.clone()))
        } else if let Some(entry) = self.passwd.iter().find(|p| p.name == user_part) {
            (entry.uid, entry.gid, Some(entry.name.clone()))
        } else {
            warn!("Unable to find user {:?}, running as nobody", user_part);
            (NOBODY, NOBODY, None)
        };

        if let Some(group) = group_part.filter(|g| !g.is_empty()) {
            gid = self.group_id(group).unwrap_or_else(|| {
                warn!("Unable to find group {:?}, using nobody", group);
                NOBODY
            });
        }

        let mut additional_gids = Vec::new();
        if let Some(name) = &username {
            for group in self.groups.iter().filter(|g| g.members.iter().any(|m| m == name)) {
                push_unique(&mut additional_gids, group.gid);
            }
        }
        for group in group_add {
            match self.group_id(group) {
                Some(id) => push_unique(&mut additional_gids, id),
                None => warn!("Unable to find group {:?}, skipping", group),
            }
        }

        User {
            uid,
            gid,
            additional_gids,
        }
    }

    fn passwd_by_uid(&self, uid: u32) -> Option<&PasswdEntry> {
        self.passwd.iter().find(|p| p.uid == uid)
    }

    fn group_id(&self, group: &str) -> Option<u32> {
        group
            .parse::<u32>()
            .ok()
            .or_else(|| self.groups.iter().find(|g| g.name == group).map(|g| g.gid))
    }
}

fn records(content: &str) -> impl Iterator<Item = Vec<&str>> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.split(':').collect())
}

fn push_unique(ids: &mut Vec<u32>, id: u32) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}
