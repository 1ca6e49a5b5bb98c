//! Minimal INI reader
//!
//! Understands the subset of Python `configparser` syntax that test ini files
//! use: `[section]` headers, `key = value` / `key: value` pairs, `#` and `;`
//! comment lines, indented continuation lines (blank lines between them stay
//! in the value) and a `[DEFAULT]` section whose options every other section
//! inherits. Keys are lower-cased, section names
//! are kept as written. Duplicate sections or keys are rejected.

use crate::error::{NodeInfraError, Result};
use std::path::Path;

const DEFAULT_SECTION: &str = "DEFAULT";

/// One `[section]` with its options in file order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniSection {
    name: String,
    options: Vec<(String, String)>,
}

impl IniSection {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            options: Vec::new(),
        }
    }

    /// Section name as written in the file
    pub fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut String> {
        self.options
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

/// A parsed INI document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    defaults: Vec<(String, String)>,
    sections: Vec<IniSection>,
}

impl IniDocument {
    /// Read and parse a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse INI text
    pub fn parse(text: &str) -> Result<Self> {
        let mut doc = IniDocument::default();
        // Index into `sections`, or None while inside [DEFAULT]
        let mut current: Option<Option<usize>> = None;
        let mut last_key: Option<String> = None;
        // Blank lines seen since `last_key`'s last value line
        let mut blank_run = 0;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let trimmed = raw.trim();

            if trimmed.is_empty() {
                blank_run += 1;
                continue;
            }
            if trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            let indented = raw.starts_with(' ') || raw.starts_with('\t');
            if indented {
                if let (Some(section), Some(key)) = (current, last_key.as_deref()) {
                    let value = doc
                        .value_mut(section, key)
                        .ok_or_else(|| syntax(line_no, "dangling continuation line"))?;
                    for _ in 0..blank_run {
                        value.push('\n');
                    }
                    if !value.is_empty() {
                        value.push('\n');
                    }
                    value.push_str(trimmed);
                    blank_run = 0;
                    continue;
                }
            }

            if trimmed.starts_with('[') {
                let name = trimmed
                    .strip_prefix('[')
                    .and_then(|s| s.strip_suffix(']'))
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| syntax(line_no, "malformed section header"))?;

                if name == DEFAULT_SECTION {
                    current = Some(None);
                } else {
                    if doc.section(name).is_some() {
                        return Err(syntax(line_no, &format!("section '{}' already exists", name)));
                    }
                    doc.sections.push(IniSection::new(name));
                    current = Some(Some(doc.sections.len() - 1));
                }
                last_key = None;
                blank_run = 0;
                continue;
            }

            let Some(section) = current else {
                return Err(syntax(line_no, "option found before any section header"));
            };

            let (key, value) = split_option(trimmed)
                .ok_or_else(|| syntax(line_no, "expected 'key = value'"))?;
            if key.is_empty() {
                return Err(syntax(line_no, "empty option name"));
            }

            let options = match section {
                None => &mut doc.defaults,
                Some(i) => &mut doc.sections[i].options,
            };
            if options.iter().any(|(k, _)| *k == key) {
                return Err(syntax(line_no, &format!("option '{}' already exists", key)));
            }
            options.push((key.clone(), value));
            last_key = Some(key);
            blank_run = 0;
        }

        Ok(doc)
    }

    fn value_mut(&mut self, section: Option<usize>, key: &str) -> Option<&mut String> {
        match section {
            None => self
                .defaults
                .iter_mut()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v),
            Some(i) => self.sections[i].get_mut(key),
        }
    }

    /// Section names in order of appearance, excluding `[DEFAULT]`
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }

    /// Check whether a section exists
    pub fn has_section(&self, name: &str) -> bool {
        self.section(name).is_some()
    }

    /// Look up a section by name
    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Option names of a section in order, followed by inherited defaults
    pub fn options(&self, section: &str) -> Vec<&str> {
        let Some(sec) = self.section(section) else {
            return Vec::new();
        };
        let mut keys: Vec<&str> = sec.options.iter().map(|(k, _)| k.as_str()).collect();
        for (k, _) in &self.defaults {
            if sec.get(k).is_none() {
                keys.push(k.as_str());
            }
        }
        keys
    }

    /// Option `(key, value)` pairs of a section, defaults included
    pub fn items(&self, section: &str) -> Vec<(&str, &str)> {
        self.options(section)
            .into_iter()
            .filter_map(|k| self.get(section, k).map(|v| (k, v)))
            .collect()
    }

    /// Value of `key` in `section`, falling back to `[DEFAULT]`
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        let key = key.to_ascii_lowercase();
        let sec = self.section(section)?;
        sec.get(&key).or_else(|| {
            self.defaults
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        })
    }
}

/// Split on the first `=` or `:`
fn split_option(line: &str) -> Option<(String, String)> {
    let pos = line.find(['=', ':'])?;
    let key = line[..pos].trim().to_ascii_lowercase();
    let value = line[pos + 1..].trim().to_string();
    Some((key, value))
}

fn syntax(line: usize, message: &str) -> NodeInfraError {
    NodeInfraError::IniSyntax {
        line,
        message: message.to_string(),
    }
}
