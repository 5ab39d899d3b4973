//! The AWS shared-config file model.
//!
//! Parses the INI-style file (typically `~/.aws/config`) into an ordered
//! sequence of profile sections plus the `[sso-session]` sub-table, and
//! writes it back deterministically: sections keep first-seen order, new
//! sections append, and keys the parser does not recognise survive a
//! read/write round trip untouched.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const CONFIG_FILE_ENV: &str = "AWS_CONFIG_FILE";

/// Default location of the shared config file (`~/.aws/config`).
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".aws").join("config"))
        .unwrap_or_else(|| PathBuf::from(".aws/config"))
}

/// One `[profile NAME]` (or bare `[NAME]`, or `[default]`) section: an
/// ordered mapping of canonical key to value.
///
/// Keys are canonicalised to trimmed, lower-cased ASCII on the way in;
/// values keep their exact text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSection {
    name: String,
    values: Vec<(String, String)>,
}

impl ProfileSection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let key = canonical_key(key);
        self.values
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set a key, replacing in place when it already exists so the
    /// section's textual order stays stable.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let key = canonical_key(key);
        let value = value.into();
        if let Some(slot) = self.values.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.values.push((key, value));
        }
    }

    pub fn unset(&mut self, key: &str) {
        let key = canonical_key(key);
        self.values.retain(|(k, _)| *k != key);
    }

    /// All key/value pairs in textual order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// One `[sso-session NAME]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsoSessionSection {
    name: String,
    values: Vec<(String, String)>,
}

impl SsoSessionSection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let key = canonical_key(key);
        self.values
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let key = canonical_key(key);
        let value = value.into();
        if let Some(slot) = self.values.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.values.push((key, value));
        }
    }

    pub fn sso_start_url(&self) -> Option<&str> {
        self.get("sso_start_url")
    }

    pub fn sso_region(&self) -> Option<&str> {
        self.get("sso_region")
    }

    pub fn sso_registration_scopes(&self) -> Option<&str> {
        self.get("sso_registration_scopes")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// The parsed config file: ordered profile sections plus sso-sessions.
/// Profile names and sso-session names are each unique; a repeated
/// section header merges into the first occurrence.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    path: Option<PathBuf>,
    profiles: Vec<ProfileSection>,
    sso_sessions: Vec<SsoSessionSection>,
}

impl ConfigFile {
    /// Load from `path`. A missing file yields an empty config that will
    /// save back to the same path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self {
                path: Some(path.to_path_buf()),
                ..Default::default()
            });
        }
        let content = fs::read_to_string(path)?;
        let mut config = Self::parse(&content)?;
        config.path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Load from `AWS_CONFIG_FILE`, falling back to `~/.aws/config`.
    pub fn load_from_env() -> Result<Self> {
        let path = std::env::var(CONFIG_FILE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_config_path());
        Self::load(path)
    }

    /// Parse config text. `#` and `;` start full-line comments.
    pub fn parse(content: &str) -> Result<Self> {
        let mut config = Self::default();
        let mut current: Option<SectionRef> = None;

        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let header = header.strip_suffix(']').ok_or_else(|| {
                    Error::config(format!("line {}: unterminated section header", lineno + 1))
                })?;
                current = Some(config.open_section(header.trim())?);
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(Error::config(format!(
                    "line {}: expected 'key = value', got '{}'",
                    lineno + 1,
                    line
                )));
            };
            let key = key.trim();
            let value = value.trim();
            match current {
                Some(SectionRef::Profile(i)) => config.profiles[i].set(key, value),
                Some(SectionRef::SsoSession(i)) => config.sso_sessions[i].set(key, value),
                None => {
                    return Err(Error::config(format!(
                        "line {}: key outside of any section",
                        lineno + 1
                    )));
                }
            }
        }

        Ok(config)
    }

    fn open_section(&mut self, header: &str) -> Result<SectionRef> {
        if let Some(name) = header.strip_prefix("sso-session ") {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(Error::config("sso-session section with empty name"));
            }
            let idx = match self.sso_sessions.iter().position(|s| s.name == name) {
                Some(i) => i,
                None => {
                    self.sso_sessions.push(SsoSessionSection::new(name));
                    self.sso_sessions.len() - 1
                }
            };
            return Ok(SectionRef::SsoSession(idx));
        }

        // `[profile NAME]`, bare `[NAME]`, and `[default]` all name
        // profiles; the credentials file uses the bare form.
        let name = header.strip_prefix("profile ").unwrap_or(header).trim();
        if name.is_empty() {
            return Err(Error::config("profile section with empty name"));
        }
        let idx = match self.profiles.iter().position(|p| p.name == name) {
            Some(i) => i,
            None => {
                self.profiles.push(ProfileSection::new(name));
                self.profiles.len() - 1
            }
        };
        Ok(SectionRef::Profile(idx))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_ref().map(|p| p.as_path())
    }

    pub fn profiles(&self) -> &[ProfileSection] {
        &self.profiles
    }

    pub fn profile(&self, name: &str) -> Option<&ProfileSection> {
        self.profiles.iter().find(|p| p.name == name)
    }

    pub fn profile_names(&self) -> Vec<String> {
        self.profiles.iter().map(|p| p.name.clone()).collect()
    }

    pub fn sso_session(&self, name: &str) -> Option<&SsoSessionSection> {
        self.sso_sessions.iter().find(|s| s.name == name)
    }

    pub fn sso_session_names(&self) -> Vec<String> {
        self.sso_sessions.iter().map(|s| s.name.clone()).collect()
    }

    /// Add a profile section, or replace an existing one in place.
    pub fn add_profile(&mut self, section: ProfileSection) {
        if let Some(existing) = self.profiles.iter_mut().find(|p| p.name == section.name) {
            *existing = section;
        } else {
            self.profiles.push(section);
        }
    }

    /// Remove a profile section. Returns whether one was removed.
    pub fn remove_profile(&mut self, name: &str) -> bool {
        let before = self.profiles.len();
        self.profiles.retain(|p| p.name != name);
        self.profiles.len() < before
    }

    /// Serialise back to config-file text: profiles in first-seen order,
    /// then sso-sessions, with every key in its textual order.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for profile in &self.profiles {
            if !out.is_empty() {
                out.push('\n');
            }
            if profile.name == "default" {
                out.push_str("[default]\n");
            } else {
                out.push_str(&format!("[profile {}]\n", profile.name));
            }
            for (key, value) in profile.iter() {
                out.push_str(&format!("{} = {}\n", key, value));
            }
        }
        for session in &self.sso_sessions {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("[sso-session {}]\n", session.name));
            for (key, value) in session.iter() {
                out.push_str(&format!("{} = {}\n", key, value));
            }
        }
        out
    }

    /// Write back to the path the config was loaded from.
    pub fn save(&self) -> Result<()> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| Error::config("config file has no path to save to"))?;
        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.serialize())?;
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum SectionRef {
    Profile(usize),
    SsoSession(usize),
}

fn canonical_key(key: &str) -> String {
    key.trim().to_ascii_lowercase()
}
