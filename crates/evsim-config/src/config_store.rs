//! Persist and restore configuration
//!
//! A store file holds attribute defaults, global values and the attribute
//! values of the live object graph. Raw text files carry one entry per
//! line:
//!
//! ```text
//! default fixture::Device::Mtu "1500"
//! global RngRun "1"
//! value /$fixture::NodeList/NodeList/0/$fixture::Node/Id "0"
//! ```
//!
//! Json files carry the same entries as a document with `defaults`,
//! `globals` and `values` arrays.

use std::fs;
use std::path::{Path, PathBuf};

use evsim_core::{log_function, log_info, KernelError, KernelResult, LogComponent};
use evsim_object::{AttributeChecker, AttributeFlags, AttributeValue, GlobalValue, SupportLevel, TypeId};
use serde::{Deserialize, Serialize};

use crate::attribute_iterator::collect_attribute_values;
use crate::config::Config;

static LOG: LogComponent = LogComponent::new("ConfigStore");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    Load,
    Save,
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileFormat {
    #[default]
    RawText,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEntry {
    pub name: String,
    pub value: String,
}

impl StoreEntry {
    fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Contents of a store file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(default)]
    pub defaults: Vec<StoreEntry>,
    #[serde(default)]
    pub globals: Vec<StoreEntry>,
    #[serde(default)]
    pub values: Vec<StoreEntry>,
}

fn malformed_line(line: &str) -> KernelError {
    KernelError::MalformedValue {
        expected: "config store line".into(),
        value: line.into(),
    }
}

impl StoreDocument {
    pub fn to_raw_text(&self) -> String {
        let mut text = String::new();
        let sections = [
            ("default", &self.defaults),
            ("global", &self.globals),
            ("value", &self.values),
        ];
        for (kind, entries) in sections {
            for entry in entries {
                text.push_str(&format!("{} {} \"{}\"\n", kind, entry.name, entry.value));
            }
        }
        text
    }

    /// Parse raw text; blank lines and `#` comments are skipped
    pub fn from_raw_text(text: &str) -> KernelResult<Self> {
        let mut document = Self::default();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (kind, rest) = line.split_once(char::is_whitespace).ok_or_else(|| malformed_line(line))?;
            let (name, quoted) = rest
                .trim_start()
                .split_once(char::is_whitespace)
                .ok_or_else(|| malformed_line(line))?;
            let value = quoted
                .trim()
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .ok_or_else(|| malformed_line(line))?;
            let entry = StoreEntry::new(name, value);
            match kind {
                "default" => document.defaults.push(entry),
                "global" => document.globals.push(entry),
                "value" => document.values.push(entry),
                _ => return Err(malformed_line(line)),
            }
        }
        Ok(document)
    }

    pub fn to_json(&self) -> KernelResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| KernelError::IoFailure(e.to_string()))
    }

    pub fn from_json(text: &str) -> KernelResult<Self> {
        serde_json::from_str(text).map_err(|e| KernelError::MalformedValue {
            expected: "config store document".into(),
            value: e.to_string(),
        })
    }

    pub fn render(&self, format: FileFormat) -> KernelResult<String> {
        match format {
            FileFormat::RawText => Ok(self.to_raw_text()),
            FileFormat::Json => self.to_json(),
        }
    }

    pub fn parse(text: &str, format: FileFormat) -> KernelResult<Self> {
        match format {
            FileFormat::RawText => Self::from_raw_text(text),
            FileFormat::Json => Self::from_json(text),
        }
    }
}

fn persistable(checker: &AttributeChecker) -> bool {
    !matches!(
        checker,
        AttributeChecker::Pointer { .. } | AttributeChecker::ObjectPtrContainer { .. }
    )
}

/// Construction defaults of every registered type, as `Type::Attribute`
pub fn collect_defaults(include_deprecated: bool) -> Vec<StoreEntry> {
    let mut entries = Vec::new();
    for tid in TypeId::registered() {
        for info in tid.attributes() {
            let skipped = match info.support_level {
                SupportLevel::Supported => false,
                SupportLevel::Deprecated => !include_deprecated,
                SupportLevel::Obsolete => true,
            };
            if skipped
                || !info.flags.contains(AttributeFlags::CONSTRUCT)
                || !info.accessor.has_setter()
                || !persistable(&info.checker)
                || matches!(info.initial_value, AttributeValue::Empty)
            {
                continue;
            }
            entries.push(StoreEntry::new(
                format!("{}::{}", tid.name(), info.name),
                info.initial_value.serialize_to_string(&info.checker),
            ));
        }
    }
    entries
}

pub fn collect_globals() -> Vec<StoreEntry> {
    GlobalValue::iter()
        .iter()
        .map(|g| StoreEntry::new(g.name.clone(), g.serialized()))
        .collect()
}

/// Saves or loads a store file
///
/// In `Save` mode both configure calls write the complete current
/// configuration. In `Load` mode `configure_defaults` applies defaults and
/// globals and `configure_attributes` applies per-object values, which
/// requires the object graph to exist.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    mode: Mode,
    format: FileFormat,
    filename: PathBuf,
    save_deprecated: bool,
}

impl ConfigStore {
    pub fn new(mode: Mode, format: FileFormat, filename: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            format,
            filename: filename.into(),
            save_deprecated: false,
        }
    }

    /// Also save deprecated attributes
    pub fn with_save_deprecated(mut self, save: bool) -> Self {
        self.save_deprecated = save;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// Current defaults, globals and attribute values
    pub fn snapshot(&self) -> StoreDocument {
        StoreDocument {
            defaults: collect_defaults(self.save_deprecated),
            globals: collect_globals(),
            values: collect_attribute_values(self.save_deprecated)
                .into_iter()
                .map(|(path, value)| StoreEntry::new(path, value))
                .collect(),
        }
    }

    pub fn save(&self) -> KernelResult<()> {
        let text = self.snapshot().render(self.format)?;
        fs::write(&self.filename, text)?;
        log_info!(LOG, "saved {}", self.filename.display());
        Ok(())
    }

    pub fn read(&self) -> KernelResult<StoreDocument> {
        let text = fs::read_to_string(&self.filename)?;
        StoreDocument::parse(&text, self.format)
    }

    pub fn configure_defaults(&self) -> KernelResult<()> {
        match self.mode {
            Mode::Load => {
                let document = self.read()?;
                for entry in &document.defaults {
                    Config::try_set_default(&entry.name, entry.value.as_str())?;
                }
                for entry in &document.globals {
                    Config::try_set_global(&entry.name, entry.value.as_str())?;
                }
                log_function!(
                    LOG,
                    "loaded {} defaults and {} globals",
                    document.defaults.len(),
                    document.globals.len()
                );
                Ok(())
            }
            Mode::Save => self.save(),
            Mode::None => Ok(()),
        }
    }

    pub fn configure_attributes(&self) -> KernelResult<()> {
        match self.mode {
            Mode::Load => {
                let document = self.read()?;
                for entry in &document.values {
                    Config::try_set(&entry.name, entry.value.as_str())?;
                }
                log_function!(LOG, "loaded {} values", document.values.len());
                Ok(())
            }
            Mode::Save => self.save(),
            Mode::None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{topology, Device, Ipv4};
    use evsim_object::{create_object, ObjectExt, ObjectType};

    fn scratch_file(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("evsim-config-store-{}-{}", std::process::id(), tag))
    }

    #[test]
    fn test_raw_text_lines() {
        let text = "# saved\n\ndefault fixture::Device::Mtu \"1500\"\nglobal RngRun \"2\"\nvalue /$x/Id \"a b\"\n";
        let document = StoreDocument::from_raw_text(text).unwrap();
        assert_eq!(document.defaults, vec![StoreEntry::new("fixture::Device::Mtu", "1500")]);
        assert_eq!(document.globals, vec![StoreEntry::new("RngRun", "2")]);
        assert_eq!(document.values, vec![StoreEntry::new("/$x/Id", "a b")]);
        assert_eq!(StoreDocument::from_raw_text(&document.to_raw_text()).unwrap(), document);

        assert!(StoreDocument::from_raw_text("default Mtu 1500").is_err());
        assert!(StoreDocument::from_raw_text("other a \"b\"").is_err());
    }

    #[test]
    fn test_json_document() {
        let document = StoreDocument::from_json(r#"{"globals":[{"name":"RngSeed","value":"3"}]}"#).unwrap();
        assert!(document.defaults.is_empty());
        assert_eq!(document.globals[0].value, "3");
        assert_eq!(StoreDocument::from_json("[").unwrap_err().kind(), "MalformedValue");
    }

    #[test]
    fn test_snapshot_contents() {
        let _list = topology(1);
        let document = ConfigStore::default().snapshot();
        assert!(document
            .defaults
            .contains(&StoreEntry::new("fixture::Device::Mtu", "1500")));
        assert!(!document.defaults.iter().any(|e| e.name.ends_with("::DeviceList")));
        assert!(document.globals.contains(&StoreEntry::new("RngRun", "1")));
        assert!(document
            .values
            .contains(&StoreEntry::new("/$fixture::NodeList/NodeList/0/$fixture::Node/$fixture::Ipv4/Ttl", "64")));
    }

    #[test]
    fn test_defaults_round_trip_through_raw_text() {
        Device::get_type_id();
        let file = scratch_file("defaults.txt");
        Config::set_default("fixture::Device::Mtu", 4000u16);
        ConfigStore::new(Mode::Save, FileFormat::RawText, &file)
            .configure_defaults()
            .unwrap();

        Config::reset();
        assert_eq!(create_object::<Device>().mtu(), 1500);

        ConfigStore::new(Mode::Load, FileFormat::RawText, &file)
            .configure_defaults()
            .unwrap();
        assert_eq!(create_object::<Device>().mtu(), 4000);
        fs::remove_file(&file).ok();
    }

    #[test]
    fn test_values_round_trip_through_json() {
        let list = topology(2);
        let file = scratch_file("values.json");
        Config::set("/NodeList/1/$fixture::Ipv4/Ttl", 5u8);
        ConfigStore::new(Mode::Save, FileFormat::Json, &file)
            .configure_attributes()
            .unwrap();

        Config::set("/NodeList/*/$fixture::Ipv4/Ttl", 64u8);
        ConfigStore::new(Mode::Load, FileFormat::Json, &file)
            .configure_attributes()
            .unwrap();
        let ttl: Vec<u8> = list
            .nodes()
            .iter()
            .map(|n| n.get_object::<Ipv4>().unwrap().ttl())
            .collect();
        assert_eq!(ttl, vec![64, 5]);
        fs::remove_file(&file).ok();
    }

    #[test]
    fn test_missing_file_is_io_failure() {
        let store = ConfigStore::new(Mode::Load, FileFormat::RawText, scratch_file("missing"));
        assert_eq!(store.configure_defaults().unwrap_err().kind(), "IoFailure");
        assert!(ConfigStore::new(Mode::None, FileFormat::Json, "unused").configure_attributes().is_ok());
    }
}
