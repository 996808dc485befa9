// Capture-session persistence
// Roles captured through the interception layer round-trip through a JSON
// document so a replay can run later from the CLI. Bodies are base64 inside
// the JSON form.

use crate::reporting::TOOL_TAG;
use crate::roles::{Role, RoleStore};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionDocument {
    pub tool: String,
    pub baseline_role: Option<String>,
    pub roles: Vec<Role>,
}

/// Snapshot the store into a session document.
pub fn session_document(store: &RoleStore) -> SessionDocument {
    let snapshot = store.snapshot();
    SessionDocument {
        tool: TOOL_TAG.to_string(),
        baseline_role: snapshot.baseline,
        roles: snapshot.roles,
    }
}

pub fn save_session(store: &RoleStore, path: &Path) -> Result<()> {
    let document = session_document(store);
    let json = serde_json::to_string_pretty(&document)?;
    fs::write(path, json).with_context(|| format!("writing session to {}", path.display()))?;
    Ok(())
}

/// Rebuild a role store from a session document on disk.
pub fn load_session(path: &Path) -> Result<RoleStore> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading session from {}", path.display()))?;
    let document: SessionDocument =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;

    let store = RoleStore::new();
    for role in document.roles {
        store.insert_role(role)?;
    }
    if let Some(baseline) = document.baseline_role {
        store.set_baseline(&baseline)?;
    }
    Ok(store)
}
