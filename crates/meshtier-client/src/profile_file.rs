// Copyright (C) 2025 Joseph Sacchini
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU Affero General Public License as published by the Free
// Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more
// details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use std::path::Path;

use meshtier_types::profile::ProfileSummary;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// On-disk list of named profiles.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProfilesToml {
    #[serde(default)]
    pub profiles: Vec<ProfileSummary>,
}

#[derive(Debug, Error)]
pub enum ProfileFileError {
    #[error("failed to read profiles: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse profiles: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize profiles: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("duplicate profile id: {0}")]
    DuplicateId(Uuid),

    #[error("profile name already in use: {0}")]
    DuplicateName(String),

    #[error("no profile named {0:?}")]
    NotFound(String),
}

impl ProfilesToml {
    pub fn find(&self, name: &str) -> Result<&ProfileSummary, ProfileFileError> {
        self.profiles
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ProfileFileError::NotFound(name.to_string()))
    }

    pub fn find_mut(&mut self, name: &str) -> Result<&mut ProfileSummary, ProfileFileError> {
        self.profiles
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| ProfileFileError::NotFound(name.to_string()))
    }

    /// Change a display name. The id stays the same.
    pub fn rename(&mut self, name: &str, new_name: &str) -> Result<(), ProfileFileError> {
        if name != new_name && self.profiles.iter().any(|p| p.name == new_name) {
            return Err(ProfileFileError::DuplicateName(new_name.to_string()));
        }
        let entry = self.find_mut(name)?;
        entry.name = new_name.to_string();
        info!(id = %entry.id, from = name, to = new_name, "renamed profile");
        Ok(())
    }
}

pub async fn load(path: &Path) -> Result<ProfilesToml, ProfileFileError> {
    debug!(path = %path.display(), "loading profiles");

    match tokio::fs::read_to_string(path).await {
        Ok(contents) => {
            let file: ProfilesToml = toml::from_str(&contents)?;
            info!(
                path = %path.display(),
                profile_count = file.profiles.len(),
                "loaded profiles"
            );
            for entry in &file.profiles {
                if entry.id != entry.profile.id {
                    warn!(
                        id = %entry.id,
                        profile_id = %entry.profile.id,
                        "profile id does not match its summary"
                    );
                }
            }
            Ok(file)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "profile file not found, starting with no profiles");
            Ok(ProfilesToml::default())
        }
        Err(e) => Err(ProfileFileError::Read(e)),
    }
}

pub async fn save(path: &Path, file: &ProfilesToml) -> Result<(), ProfileFileError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let contents = toml::to_string_pretty(file)?;
    tokio::fs::write(path, contents).await?;
    info!(
        path = %path.display(),
        profile_count = file.profiles.len(),
        "saved profiles"
    );
    Ok(())
}

pub fn validate_new_entry(file: &ProfilesToml, entry: &ProfileSummary) -> Result<(), ProfileFileError> {
    for existing in &file.profiles {
        if existing.id == entry.id {
            warn!(id = %entry.id, "profile id already present");
            return Err(ProfileFileError::DuplicateId(entry.id));
        }
        if existing.name == entry.name {
            warn!(name = %entry.name, "profile name already in use");
            return Err(ProfileFileError::DuplicateName(entry.name.clone()));
        }
    }
    debug!(name = %entry.name, id = %entry.id, "new profile validated");
    Ok(())
}
