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

//! Segmented entry of a single IPv4 CIDR block (four octet fields plus a
//! prefix field), and the duplicate policy for committing the result into a
//! list such as `proxy_cidrs`.

use thiserror::Error;
use tracing::debug;

pub const DEFAULT_PREFIX: u8 = 24;

/// Which field is being edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    /// Octet field, 0 through 3.
    Octet(usize),
    Prefix,
    /// A CIDR was committed and no edit has happened since.
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CidrEditError {
    #[error("address incomplete: {valid} of 4 octets valid")]
    Incomplete { valid: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CidrEditor {
    octets: [String; 4],
    prefix: u8,
    focus: Focus,
}

impl Default for CidrEditor {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_octet(s: &str) -> Option<u8> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn after(index: usize) -> Focus {
    if index < 3 {
        Focus::Octet(index + 1)
    } else {
        Focus::Prefix
    }
}

impl CidrEditor {
    /// Blank octets (rendered as `0` placeholders) and a /24 prefix.
    pub fn new() -> Self {
        Self {
            octets: Default::default(),
            prefix: DEFAULT_PREFIX,
            focus: Focus::Octet(0),
        }
    }

    /// Seed the editor from existing text. Parts that don't parse are left
    /// at their defaults; this never fails.
    pub fn parse_for_edit(existing: &str) -> Self {
        let mut editor = Self::new();
        let parts: Vec<&str> = existing.split('/').collect();

        let octets: Vec<Option<u8>> = parts[0].split('.').map(parse_octet).collect();
        if octets.len() == 4 && octets.iter().all(Option::is_some) {
            for (slot, value) in editor.octets.iter_mut().zip(octets.into_iter().flatten()) {
                *slot = value.to_string();
            }
        }

        if let [_, prefix] = parts.as_slice() {
            match prefix.parse::<u8>() {
                Ok(p) if p <= 32 => editor.prefix = p,
                _ => {}
            }
        }

        debug!(existing, octets = ?editor.octets, prefix = editor.prefix, "seeded cidr editor");
        editor
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    /// Move focus explicitly, as when the user taps a field.
    pub fn focus_field(&mut self, focus: Focus) {
        if !matches!(focus, Focus::Octet(i) if i > 3) {
            self.focus = focus;
        }
    }

    pub fn octet(&self, index: usize) -> &str {
        self.octets.get(index).map_or("", String::as_str)
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Apply new text for octet `index`.
    ///
    /// Non-digits are dropped and values above 255 become `255`. Focus moves
    /// on once three digits are present or no further digit could stay in
    /// range. Clearing a non-empty field steps back to the previous field
    /// without touching its content.
    pub fn input_octet(&mut self, index: usize, text: &str) {
        let Some(slot) = self.octets.get_mut(index) else {
            return;
        };
        self.focus = Focus::Octet(index);

        if text.is_empty() {
            if !slot.is_empty() && index > 0 {
                self.focus = Focus::Octet(index - 1);
            }
            slot.clear();
            return;
        }

        let mut filtered: String = text.chars().filter(char::is_ascii_digit).collect();
        if filtered.is_empty() {
            slot.clear();
            return;
        }
        let value = filtered.parse::<u32>().unwrap_or(u32::MAX);
        if value > 255 {
            filtered = "255".into();
        }

        let full = filtered.len() >= 3 || value.min(255) > 25;
        *slot = filtered;
        if full {
            self.focus = after(index);
        }
    }

    /// Apply new text for the prefix field. Anything that isn't an integer
    /// is ignored; integers are clamped to `0..=32`.
    pub fn input_prefix(&mut self, text: &str) {
        self.focus = Focus::Prefix;
        let trimmed = text.strip_prefix('-').unwrap_or(text);
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return;
        }
        let value = text.parse::<i64>().unwrap_or(if text.starts_with('-') {
            i64::MIN
        } else {
            i64::MAX
        });
        self.set_prefix(value);
    }

    pub fn set_prefix(&mut self, value: i64) {
        self.prefix = value.clamp(0, 32) as u8;
    }

    /// Render `o1.o2.o3.o4/prefix`. Fails if any octet is blank or invalid.
    /// Repeating a commit without edits yields the same text.
    pub fn commit(&mut self) -> Result<String, CidrEditError> {
        let octets: Vec<u8> = self.octets.iter().filter_map(|o| parse_octet(o)).collect();
        if octets.len() != 4 {
            return Err(CidrEditError::Incomplete {
                valid: octets.len(),
            });
        }
        self.focus = Focus::Complete;
        Ok(format!(
            "{}.{}.{}.{}/{}",
            octets[0], octets[1], octets[2], octets[3], self.prefix
        ))
    }
}

/// Result of putting an edited CIDR back into its list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Added,
    Updated,
    /// The edited entry already held this value.
    Unchanged,
    /// A new entry equal to an existing one; nothing was added.
    AlreadyPresent,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CidrListError {
    #[error("{value} already exists at index {existing}")]
    Duplicate { value: String, existing: usize },

    #[error("no entry at index {0}")]
    NoSuchEntry(usize),
}

/// Store `value` into `list`, replacing entry `editing` or appending when
/// `None`. An edit that would duplicate another entry is rejected and the
/// list is left as it was.
pub fn commit_into(
    list: &mut Vec<String>,
    editing: Option<usize>,
    value: String,
) -> Result<CommitOutcome, CidrListError> {
    match editing {
        Some(index) => {
            if index >= list.len() {
                return Err(CidrListError::NoSuchEntry(index));
            }
            if list[index] == value {
                return Ok(CommitOutcome::Unchanged);
            }
            if let Some(existing) = list.iter().position(|c| *c == value) {
                debug!(value = %value, existing, index, "rejected duplicate cidr edit");
                return Err(CidrListError::Duplicate { value, existing });
            }
            debug!(value = %value, index, "updated cidr");
            list[index] = value;
            Ok(CommitOutcome::Updated)
        }
        None => {
            if list.contains(&value) {
                debug!(value = %value, "cidr already present");
                return Ok(CommitOutcome::AlreadyPresent);
            }
            debug!(value = %value, "added cidr");
            list.push(value);
            Ok(CommitOutcome::Added)
        }
    }
}
