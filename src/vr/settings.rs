//! Foveation settings and their persistence.
//!
//! Six user-tunable fields round-trip through a [`SettingsStore`] under
//! fixed key names. Values are not validated on load; out-of-range numbers
//! surface later as a degenerate layout.
//!
//! [`SexpSettingsFile`] persists a store as a flat s-expression plist:
//!
//! ```text
//! ("OpenXR_Foveated_Enabled" t "OpenXR_Foveated_CenterScale" 1.0 ...)
//! ```

use anyhow::Context;
use lexpr::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const KEY_ENABLED: &str = "OpenXR_Foveated_Enabled";
pub const KEY_CENTER_SCALE: &str = "OpenXR_Foveated_CenterScale";
pub const KEY_PERIPHERAL_SCALE: &str = "OpenXR_Foveated_PeripheralScale";
pub const KEY_CENTER_SIZE_X: &str = "OpenXR_Foveated_CenterSizeX";
pub const KEY_CENTER_SIZE_Y: &str = "OpenXR_Foveated_CenterSizeY";
pub const KEY_EYE_TRACKING: &str = "OpenXR_Foveated_EyeTracking";

// ── FoveationSettings ───────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FoveationSettings {
    pub enabled: bool,
    /// Resolution multiplier for the center inset (0.1–2.0 in the UI).
    pub center_resolution_scale: f32,
    /// Resolution multiplier for the periphery (0.1–1.0 in the UI).
    pub peripheral_resolution_scale: f32,
    /// Fraction of the view width covered by the inset.
    pub center_size_x: f32,
    /// Fraction of the view height covered by the inset.
    pub center_size_y: f32,
    pub use_eye_tracking: bool,
}

impl Default for FoveationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            center_resolution_scale: 1.0,
            peripheral_resolution_scale: 0.25,
            center_size_x: 0.5,
            center_size_y: 0.5,
            use_eye_tracking: false,
        }
    }
}

impl FoveationSettings {
    /// Read all fields from `store`. With `apply_defaults`, absent keys are
    /// written back with their default value.
    pub fn load(store: &mut dyn SettingsStore, apply_defaults: bool) -> Self {
        let d = Self::default();
        let settings = Self {
            enabled: store.get_or_set_bool(KEY_ENABLED, d.enabled, apply_defaults),
            center_resolution_scale: store.get_or_set_float(
                KEY_CENTER_SCALE,
                d.center_resolution_scale,
                apply_defaults,
            ),
            peripheral_resolution_scale: store.get_or_set_float(
                KEY_PERIPHERAL_SCALE,
                d.peripheral_resolution_scale,
                apply_defaults,
            ),
            center_size_x: store.get_or_set_float(KEY_CENTER_SIZE_X, d.center_size_x, apply_defaults),
            center_size_y: store.get_or_set_float(KEY_CENTER_SIZE_Y, d.center_size_y, apply_defaults),
            use_eye_tracking: store.get_or_set_bool(
                KEY_EYE_TRACKING,
                d.use_eye_tracking,
                apply_defaults,
            ),
        };
        debug!("foveation: settings loaded: {:?}", settings);
        settings
    }

    pub fn save(&self, store: &mut dyn SettingsStore) {
        store.set_bool(KEY_ENABLED, self.enabled);
        store.set_float(KEY_CENTER_SCALE, self.center_resolution_scale);
        store.set_float(KEY_PERIPHERAL_SCALE, self.peripheral_resolution_scale);
        store.set_float(KEY_CENTER_SIZE_X, self.center_size_x);
        store.set_float(KEY_CENTER_SIZE_Y, self.center_size_y);
        store.set_bool(KEY_EYE_TRACKING, self.use_eye_tracking);
    }

    /// Settings as an s-expression plist for IPC.
    pub fn to_sexp(&self) -> String {
        format!(
            "(:enabled {} :center-scale {:.2} :peripheral-scale {:.2} :center-size-x {:.2} :center-size-y {:.2} :eye-tracking {})",
            if self.enabled { "t" } else { "nil" },
            self.center_resolution_scale,
            self.peripheral_resolution_scale,
            self.center_size_x,
            self.center_size_y,
            if self.use_eye_tracking { "t" } else { "nil" },
        )
    }
}

// ── SettingsStore ───────────────────────────────────────────

/// A stored scalar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingValue {
    Bool(bool),
    Float(f32),
}

/// Key/value settings backend with `get_or_set` semantics.
pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<SettingValue>;
    fn set(&mut self, key: &str, value: SettingValue);

    /// Stored value, or `default`; with `set_default` an absent key is
    /// written first.
    fn get_or_set_bool(&mut self, key: &str, default: bool, set_default: bool) -> bool {
        match self.get(key) {
            Some(SettingValue::Bool(b)) => b,
            Some(SettingValue::Float(f)) => f != 0.0,
            None => {
                if set_default {
                    self.set(key, SettingValue::Bool(default));
                }
                default
            }
        }
    }

    fn get_or_set_float(&mut self, key: &str, default: f32, set_default: bool) -> f32 {
        match self.get(key) {
            Some(SettingValue::Float(f)) => f,
            Some(SettingValue::Bool(b)) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            None => {
                if set_default {
                    self.set(key, SettingValue::Float(default));
                }
                default
            }
        }
    }

    fn set_bool(&mut self, key: &str, value: bool) {
        self.set(key, SettingValue::Bool(value));
    }

    fn set_float(&mut self, key: &str, value: f32) {
        self.set(key, SettingValue::Float(value));
    }
}

/// In-process store.
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    values: BTreeMap<String, SettingValue>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SettingValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<SettingValue> {
        self.values.get(key).copied()
    }

    fn set(&mut self, key: &str, value: SettingValue) {
        self.values.insert(key.to_string(), value);
    }
}

// ── SexpSettingsFile ────────────────────────────────────────

/// Settings persisted to disk as an s-expression plist.
#[derive(Debug)]
pub struct SexpSettingsFile {
    path: PathBuf,
    values: MemorySettings,
    dirty: bool,
}

impl SexpSettingsFile {
    /// Open `path`; a missing file yields an empty store.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings {}", path.display()))?;
            parse_plist(&raw)
                .with_context(|| format!("malformed settings {}", path.display()))?
        } else {
            info!("foveation: no settings at {}, starting empty", path.display());
            MemorySettings::new()
        };
        Ok(Self {
            path,
            values,
            dirty: false,
        })
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write the store back to disk if anything changed.
    pub fn flush(&mut self) -> anyhow::Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(&self.path, render_plist(&self.values))
            .with_context(|| format!("failed to write settings {}", self.path.display()))?;
        self.dirty = false;
        info!("foveation: settings saved to {}", self.path.display());
        Ok(())
    }
}

impl SettingsStore for SexpSettingsFile {
    fn get(&self, key: &str) -> Option<SettingValue> {
        self.values.get(key)
    }

    fn set(&mut self, key: &str, value: SettingValue) {
        if self.values.get(key) != Some(value) {
            self.values.set(key, value);
            self.dirty = true;
        }
    }
}

fn render_plist(values: &MemorySettings) -> String {
    let entries: Vec<String> = values
        .iter()
        .map(|(key, value)| {
            let value = match value {
                SettingValue::Bool(true) => "t".to_string(),
                SettingValue::Bool(false) => "nil".to_string(),
                SettingValue::Float(f) => format!("{:?}", f),
            };
            format!("\"{}\" {}", key.replace('\\', "\\\\").replace('"', "\\\""), value)
        })
        .collect();
    format!("({})\n", entries.join("\n "))
}

fn parse_plist(raw: &str) -> anyhow::Result<MemorySettings> {
    let value = lexpr::from_str(raw).context("invalid s-expression")?;
    let mut settings = MemorySettings::new();
    let mut current = &value;
    loop {
        match current {
            Value::Cons(pair) => {
                let key = match pair.car() {
                    Value::String(s) => s.to_string(),
                    Value::Symbol(s) => s.to_string(),
                    other => anyhow::bail!("expected string key, found {}", other),
                };
                let Value::Cons(next) = pair.cdr() else {
                    anyhow::bail!("key {} has no value", key);
                };
                match setting_value(next.car()) {
                    Some(v) => settings.set(&key, v),
                    None => warn!("foveation: ignoring unsupported value for {}", key),
                }
                current = next.cdr();
            }
            Value::Null | Value::Nil => break,
            other => anyhow::bail!("expected a plist, found {}", other),
        }
    }
    Ok(settings)
}

fn setting_value(value: &Value) -> Option<SettingValue> {
    match value {
        Value::Bool(b) => Some(SettingValue::Bool(*b)),
        Value::Nil | Value::Null => Some(SettingValue::Bool(false)),
        Value::Symbol(s) if s.as_ref() == "t" => Some(SettingValue::Bool(true)),
        Value::Symbol(s) if s.as_ref() == "nil" => Some(SettingValue::Bool(false)),
        Value::Number(n) => n.as_f64().map(|f| SettingValue::Float(f as f32)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_written_back() {
        let mut store = MemorySettings::new();
        let settings = FoveationSettings::load(&mut store, true);
        assert_eq!(settings, FoveationSettings::default());
        assert_eq!(store.len(), 6);
        assert_eq!(store.get(KEY_PERIPHERAL_SCALE), Some(SettingValue::Float(0.25)));
        assert_eq!(store.get(KEY_ENABLED), Some(SettingValue::Bool(false)));
    }

    #[test]
    fn test_load_without_defaults_leaves_store_untouched() {
        let mut store = MemorySettings::new();
        let settings = FoveationSettings::load(&mut store, false);
        assert_eq!(settings, FoveationSettings::default());
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let mut store = MemorySettings::new();
        let saved = FoveationSettings {
            enabled: true,
            center_resolution_scale: 1.5,
            peripheral_resolution_scale: 0.4,
            center_size_x: 0.6,
            center_size_y: 0.35,
            use_eye_tracking: true,
        };
        saved.save(&mut store);
        assert_eq!(FoveationSettings::load(&mut store, false), saved);
    }

    #[test]
    fn test_out_of_range_accepted() {
        let mut store = MemorySettings::new();
        store.set_float(KEY_CENTER_SCALE, -2.0);
        let settings = FoveationSettings::load(&mut store, true);
        assert_eq!(settings.center_resolution_scale, -2.0);
    }

    #[test]
    fn test_plist_roundtrip() {
        let mut store = MemorySettings::new();
        let saved = FoveationSettings {
            enabled: true,
            center_size_x: 0.7,
            ..Default::default()
        };
        saved.save(&mut store);
        let text = render_plist(&store);
        assert!(text.contains("\"OpenXR_Foveated_Enabled\" t"));
        let mut parsed = parse_plist(&text).unwrap();
        assert_eq!(FoveationSettings::load(&mut parsed, false), saved);
    }

    #[test]
    fn test_plist_rejects_garbage() {
        assert!(parse_plist("(\"OpenXR_Foveated_Enabled\")").is_err());
        assert!(parse_plist("(((").is_err());
    }

    #[test]
    fn test_file_store_flush_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("foveation.el");

        let mut file = SexpSettingsFile::open(&path).unwrap();
        let loaded = FoveationSettings::load(&mut file, true);
        assert!(file.is_dirty());
        file.flush().unwrap();
        assert!(!file.is_dirty());

        let mut reopened = SexpSettingsFile::open(&path).unwrap();
        assert_eq!(FoveationSettings::load(&mut reopened, false), loaded);
        assert!(!reopened.is_dirty());
    }

    #[test]
    fn test_settings_sexp() {
        let sexp = FoveationSettings::default().to_sexp();
        assert!(sexp.starts_with("(:enabled nil"));
        assert!(sexp.contains(":peripheral-scale 0.25"));
    }
}
