// src/bundle.rs

//! The pair of descriptors making up a bundle, and writing them to disk

use crate::error::{Error, Result};
use crate::spec::{CONFIG_FILE, ProcessSpec, RUNTIME_FILE, RuntimeSpec};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Indentation of written descriptors
const INDENT: &[u8] = b"    ";

/// A translated container, ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    /// `config.json`
    pub config: ProcessSpec,
    /// `runtime.json`
    pub runtime: RuntimeSpec,
}

/// Rendered file contents, `(config.json, runtime.json)`
pub type Rendered = (Vec<u8>, Vec<u8>);

fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut serializer =
        Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(INDENT));
    value.serialize(&mut serializer)?;
    out.push(b'\n');
    Ok(out)
}

impl Bundle {
    /// Render both documents; identical bundles give identical bytes
    pub fn render(&self) -> Result<Rendered> {
        Ok((to_pretty_json(&self.config)?, to_pretty_json(&self.runtime)?))
    }

    /// Write `config.json` and `runtime.json` into `dir`
    ///
    /// Without `force`, an existing descriptor is an error and nothing is
    /// written. Both documents are rendered and staged in temporary files
    /// before either is renamed into place. If the second rename fails, the
    /// freshly placed `config.json` is removed again.
    pub fn write(&self, dir: &Path, force: bool) -> Result<Vec<PathBuf>> {
        let config_path = dir.join(CONFIG_FILE);
        let runtime_path = dir.join(RUNTIME_FILE);

        if !force {
            for path in [&config_path, &runtime_path] {
                if path.exists() {
                    return Err(Error::FileExists(path.clone()));
                }
            }
        }

        let (config, runtime) = self.render()?;
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

        let staged_config = stage(dir, &config)?;
        let staged_runtime = stage(dir, &runtime)?;

        staged_config
            .persist(&config_path)
            .map_err(|e| Error::io(&config_path, e.error))?;
        debug!("Wrote {} ({} bytes)", config_path.display(), config.len());

        if let Err(e) = staged_runtime.persist(&runtime_path) {
            let _ = fs::remove_file(&config_path);
            return Err(Error::io(&runtime_path, e.error));
        }
        debug!("Wrote {} ({} bytes)", runtime_path.display(), runtime.len());
        info!("Saved bundle descriptors in {}", dir.display());

        Ok(vec![config_path, runtime_path])
    }
}

/// Write `content` to a synced temporary file in `dir`
fn stage(dir: &Path, content: &[u8]) -> Result<NamedTempFile> {
    let mut temp = NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
    temp.write_all(content).map_err(|e| Error::io(temp.path(), e))?;
    temp.as_file().sync_all().map_err(|e| Error::io(temp.path(), e))?;
    Ok(temp)
}
