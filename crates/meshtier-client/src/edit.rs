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

//! Conversions between form text and profile fields.
//!
//! The profile keeps real `Option`s. Only this layer maps an empty text
//! field to `None` and back, so "unset" never turns into `0` or `""` inside
//! the model.

use meshtier_types::flags::FeatureFlag;
use meshtier_types::profile::NetworkProfile;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("{field}: {text:?} is not a whole number")]
    NotANumber { field: &'static str, text: String },

    #[error("unknown flag {0:?}")]
    UnknownFlag(String),
}

/// Text for an optional string field; `None` shows as empty.
pub fn text_from_optional(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

/// Empty text clears the field.
pub fn optional_from_text(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// One entry per non-empty line, as typed into a multiline field.
pub fn lines_to_list(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn list_to_lines(items: &[String]) -> String {
    items.join("\n")
}

pub fn hostname_text(profile: &NetworkProfile) -> String {
    text_from_optional(profile.hostname.as_deref())
}

pub fn set_hostname_text(profile: &mut NetworkProfile, text: &str) {
    profile.hostname = optional_from_text(text);
}

pub fn mtu_text(profile: &NetworkProfile) -> String {
    profile.mtu.map(|m| m.to_string()).unwrap_or_default()
}

/// Empty text unsets the MTU; anything else must be an integer. Range is
/// left to validation.
pub fn set_mtu_text(profile: &mut NetworkProfile, text: &str) -> Result<(), FieldError> {
    if text.is_empty() {
        profile.mtu = None;
        return Ok(());
    }
    let mtu = text.parse().map_err(|_| FieldError::NotANumber {
        field: "mtu",
        text: text.to_string(),
    })?;
    profile.mtu = Some(mtu);
    Ok(())
}

/// Set a feature flag by its field name.
pub fn set_flag(profile: &mut NetworkProfile, key: &str, value: bool) -> Result<FeatureFlag, FieldError> {
    let flag = FeatureFlag::from_key(key).ok_or_else(|| FieldError::UnknownFlag(key.to_string()))?;
    flag.set(profile, value);
    Ok(flag)
}
