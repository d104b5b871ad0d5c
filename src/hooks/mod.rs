// src/hooks/mod.rs

//! Lifecycle hook declarations
//!
//! Hooks are declared on the command line as `phase:executable [arg ...]`,
//! for example `prestart:netns --config /etc/netns.json`. Compiling them is
//! split in two steps:
//!
//! - [`parse_hook`] is pure string handling: phase, executable token, args
//! - an [`ExecutableResolver`] turns the executable token into an absolute path
//!
//! [`compile_hooks`] runs both over every declaration and groups the results
//! by phase in declaration order. The first bad declaration aborts the whole
//! compilation; no partial [`HookSet`] is returned.

use crate::spec::{Hook, Hooks};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Errors from hook declarations
#[derive(Error, Debug)]
pub enum HookError {
    /// Declaration is not `phase:executable ...`
    #[error("parsing {raw:?} as phase:executable failed")]
    Malformed { raw: String },

    /// Phase is not one of the lifecycle phases
    #[error(
        "unrecognized hook phase {phase:?} in {raw:?}, try 'prestart', 'poststart', or 'poststop'"
    )]
    UnknownPhase { phase: String, raw: String },

    /// Executable could not be found on the search path
    #[error("looking up exec path for {executable:?} (from {raw:?}) failed: {reason}")]
    ExecutableNotFound {
        executable: String,
        raw: String,
        reason: String,
    },
}

/// Lifecycle phase a hook runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookPhase {
    /// After the container process is created, before the user process starts
    Prestart,
    /// After the user process has started
    Poststart,
    /// After the container process has stopped
    Poststop,
}

impl HookPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prestart => "prestart",
            Self::Poststart => "poststart",
            Self::Poststop => "poststop",
        }
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookPhase {
    type Err = ();

    /// Case-sensitive: `Prestart` is not a phase
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prestart" => Ok(Self::Prestart),
            "poststart" => Ok(Self::Poststart),
            "poststop" => Ok(Self::Poststop),
            _ => Err(()),
        }
    }
}

/// A parsed, not yet resolved, hook declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookDecl {
    pub phase: HookPhase,
    /// Executable token as written
    pub executable: String,
    pub args: Vec<String>,
    /// The declaration this was parsed from
    pub raw: String,
}

/// Parse `phase:executable [arg ...]` without touching the filesystem
pub fn parse_hook(raw: &str) -> Result<HookDecl, HookError> {
    let (phase, command) = raw.split_once(':').ok_or_else(|| HookError::Malformed {
        raw: raw.to_string(),
    })?;

    let phase = phase.parse::<HookPhase>().map_err(|_| HookError::UnknownPhase {
        phase: phase.to_string(),
        raw: raw.to_string(),
    })?;

    let mut words = command.split_whitespace();
    let executable = words.next().ok_or_else(|| HookError::Malformed {
        raw: raw.to_string(),
    })?;

    Ok(HookDecl {
        phase,
        executable: executable.to_string(),
        args: words.map(str::to_string).collect(),
        raw: raw.to_string(),
    })
}

/// Resolves an executable token to an absolute path
pub trait ExecutableResolver {
    /// Returns the absolute path, or a human-readable reason it was not found
    fn resolve(&self, executable: &str) -> Result<PathBuf, String>;
}

/// Resolver backed by the process `PATH`
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchPath;

impl ExecutableResolver for SearchPath {
    fn resolve(&self, executable: &str) -> Result<PathBuf, String> {
        let found = which::which(executable).map_err(|e| e.to_string())?;
        std::path::absolute(&found).map_err(|e| e.to_string())
    }
}

/// A resolved hook, ready for the runtime descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookEntry {
    pub phase: HookPhase,
    /// Absolute path of the executable
    pub path: PathBuf,
    /// Executable token as declared, used as argv[0]
    pub name: String,
    /// Arguments after the executable
    pub args: Vec<String>,
}

impl HookEntry {
    /// Descriptor form; `args` follows execv semantics, so it leads with argv[0]
    pub fn to_spec(&self) -> Hook {
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(self.name.clone());
        args.extend(self.args.iter().cloned());
        Hook {
            path: self.path.to_string_lossy().into_owned(),
            args,
            env: Vec::new(),
        }
    }
}

/// Resolve one parsed declaration
pub fn resolve_hook(
    decl: HookDecl,
    resolver: &dyn ExecutableResolver,
) -> Result<HookEntry, HookError> {
    let path = resolver
        .resolve(&decl.executable)
        .map_err(|reason| HookError::ExecutableNotFound {
            executable: decl.executable.clone(),
            raw: decl.raw.clone(),
            reason,
        })?;
    debug!("Resolved {} hook {} to {}", decl.phase, decl.executable, path.display());

    Ok(HookEntry {
        phase: decl.phase,
        path,
        name: decl.executable,
        args: decl.args,
    })
}

/// Hooks grouped by phase, each list in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookSet {
    pub prestart: Vec<HookEntry>,
    pub poststart: Vec<HookEntry>,
    pub poststop: Vec<HookEntry>,
}

impl HookSet {
    pub fn push(&mut self, entry: HookEntry) {
        match entry.phase {
            HookPhase::Prestart => self.prestart.push(entry),
            HookPhase::Poststart => self.poststart.push(entry),
            HookPhase::Poststop => self.poststop.push(entry),
        }
    }

    pub fn len(&self) -> usize {
        self.prestart.len() + self.poststart.len() + self.poststop.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Descriptor form of all three lists
    pub fn to_spec(&self) -> Hooks {
        Hooks {
            prestart: self.prestart.iter().map(HookEntry::to_spec).collect(),
            poststart: self.poststart.iter().map(HookEntry::to_spec).collect(),
            poststop: self.poststop.iter().map(HookEntry::to_spec).collect(),
        }
    }
}

/// Parse and resolve every declaration, all or nothing
pub fn compile_hooks<S: AsRef<str>>(
    raw: &[S],
    resolver: &dyn ExecutableResolver,
) -> Result<HookSet, HookError> {
    let mut hooks = HookSet::default();
    for declaration in raw {
        let decl = parse_hook(declaration.as_ref())?;
        hooks.push(resolve_hook(decl, resolver)?);
    }
    Ok(hooks)
}
