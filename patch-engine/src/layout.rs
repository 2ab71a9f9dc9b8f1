use std::{
    fs,
    path::{Path, PathBuf},
};

use regex::Regex;
use tracing::info;

use crate::{
    error::{PatchError, Result},
    node_patch::NodeRole,
};

pub const BASE_PATCH: &str = "patch.yaml";
pub const SECRETS: &str = "secrets.yaml";
pub const TALOSCONFIG: &str = "talosconfig";
pub const COMMANDS: &str = "commands.md";

lazy_static::lazy_static! {
    static ref NODE_PATCH_NAME: Regex = Regex::new(r"^(cp|worker)([0-9]+)\.patch$").unwrap();
}

pub fn node_patch_name(role: NodeRole, index: usize) -> String {
    format!("{}{index}.patch", role.prefix())
}

pub fn node_config_name(role: NodeRole, index: usize) -> String {
    format!("{}{index}.yaml", role.prefix())
}

/// The working directory every generated file lives in.
#[derive(Debug, Clone)]
pub struct ConfigDir {
    root: PathBuf,
}

impl ConfigDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn base_patch(&self) -> PathBuf {
        self.path(BASE_PATCH)
    }

    pub fn node_patch(&self, role: NodeRole, index: usize) -> PathBuf {
        self.path(&node_patch_name(role, index))
    }

    pub fn node_config(&self, role: NodeRole, index: usize) -> PathBuf {
        self.path(&node_config_name(role, index))
    }

    pub fn template_config(&self, role: NodeRole) -> PathBuf {
        self.path(role.template_config())
    }

    pub fn talosconfig(&self) -> PathBuf {
        self.path(TALOSCONFIG)
    }

    /// Creates the directory. A non-empty directory is only accepted with
    /// `force`, in which case everything inside it is removed.
    pub fn prepare(&self, force: bool) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let entries: Vec<PathBuf> = fs::read_dir(&self.root)?
            .map(|e| e.map(|e| e.path()))
            .collect::<std::io::Result<_>>()?;
        if entries.is_empty() {
            return Ok(());
        }

        if !force {
            return Err(PatchError::Precondition(format!(
                "Config directory '{}' is not empty. Use --force to overwrite or clean it.",
                self.root.display()
            )));
        }

        for entry in entries {
            if entry.is_dir() {
                fs::remove_dir_all(&entry)?;
            } else {
                fs::remove_file(&entry)?;
            }
        }
        info!("Directory '{}' cleaned", self.root.display());
        Ok(())
    }

    /// Node patch files already present, ordered by role then index.
    pub fn existing_node_patches(&self) -> Result<Vec<(NodeRole, usize, PathBuf)>> {
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(caps) = name.to_str().and_then(|n| NODE_PATCH_NAME.captures(n)) else {
                continue;
            };
            let role = if &caps[1] == "cp" {
                NodeRole::ControlPlane
            } else {
                NodeRole::Worker
            };
            if let Ok(index) = caps[2].parse::<usize>() {
                found.push((role, index, entry.path()));
            }
        }
        found.sort_by_key(|(role, index, _)| (*role == NodeRole::Worker, *index));
        Ok(found)
    }
}
