use crate::category::{Category, Classifier};
use crate::events::WheelEvent;
use crate::item::TagName;
use crate::search::CollectOptions;
use async_channel::Sender;
use directories::ProjectDirs;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct QuickSlotConfig {
    pub category: Category,
    pub index: usize,
}

/// Extra tag mapping on top of the built-in table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TagRule {
    pub tag: TagName,
    pub category: Category,
}

fn enabled() -> bool {
    true
}

fn default_stacking() -> Vec<Category> {
    vec![Category::Explosive]
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    /// Search one level into containers held in the inventory.
    #[serde(default = "enabled")]
    pub include_nested_containers: bool,
    /// Also search the companion's inventory, when there is one.
    #[serde(default)]
    pub include_secondary_store: bool,
    /// Walk containers inside containers too.
    #[serde(default)]
    pub deep_containers: bool,
    #[serde(default = "default_stacking")]
    pub stacking: Vec<Category>,
    #[serde(default)]
    pub disabled: Vec<Category>,
    #[serde(default)]
    pub quick_slots: Vec<QuickSlotConfig>,
    #[serde(default)]
    pub tags: Vec<TagRule>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            include_nested_containers: true,
            include_secondary_store: false,
            deep_containers: false,
            stacking: default_stacking(),
            disabled: Vec::new(),
            quick_slots: Vec::new(),
            tags: Vec::new(),
        }
    }
}

impl Settings {
    pub fn collect_options(&self) -> CollectOptions {
        CollectOptions {
            include_nested: self.include_nested_containers,
            include_secondary: self.include_secondary_store,
        }
    }

    pub fn stacks(&self, category: Category) -> bool {
        self.stacking.contains(&category)
    }

    pub fn is_enabled(&self, category: Category) -> bool {
        !self.disabled.contains(&category)
    }

    pub fn quick_slot(&self, category: Category) -> usize {
        self.quick_slots
            .iter()
            .find(|q| q.category == category)
            .map(|q| q.index)
            .unwrap_or_else(|| category.default_quick_slot())
    }

    pub fn classifier(&self) -> Classifier {
        Classifier::with_rules(self.tags.iter().map(|r| (&r.tag, r.category)))
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to determine config directory")]
    ConfigDirNotFound,
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Notify error: {0}")]
    Notify(#[from] notify::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn get_settings_path() -> Result<PathBuf, SettingsError> {
    let proj_dirs = ProjectDirs::from("org", "quickwheel", "quickwheel")
        .ok_or(SettingsError::ConfigDirNotFound)?;
    Ok(proj_dirs.config_dir().join("settings.toml"))
}

pub fn load_settings() -> Result<Settings, SettingsError> {
    load_settings_from(get_settings_path()?)
}

pub fn load_settings_from(path: PathBuf) -> Result<Settings, SettingsError> {
    let s = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(config::Environment::with_prefix("QUICKWHEEL"))
        .build()?;

    Ok(s.try_deserialize()?)
}

pub fn load_or_default() -> Settings {
    match load_settings() {
        Ok(s) => s,
        Err(e) => {
            log::warn!("Using default settings: {}", e);
            Settings::default()
        }
    }
}

pub fn write_default_settings() -> Result<PathBuf, SettingsError> {
    let path = get_settings_path()?;
    if let Some(parent) = path.parent() {
        fs_err::create_dir_all(parent)?;
    }
    if !path.exists() {
        fs_err::write(&path, DEFAULT_SETTINGS)?;
    }
    Ok(path)
}

const DEFAULT_SETTINGS: &str = include_str!("default_settings.toml");

/// Watches the settings file and posts [`WheelEvent::SettingsReload`] whenever it changes.
/// Watching stops when the returned watcher is dropped.
pub fn watch_settings(tx: Sender<WheelEvent>) -> Result<RecommendedWatcher, SettingsError> {
    watch_settings_at(get_settings_path()?, tx)
}

pub fn watch_settings_at(
    settings_path: PathBuf,
    tx: Sender<WheelEvent>,
) -> Result<RecommendedWatcher, SettingsError> {
    let settings_dir = settings_path
        .parent()
        .map(|p| p.to_path_buf())
        .ok_or(SettingsError::ConfigDirNotFound)?;
    fs_err::create_dir_all(&settings_dir)?;

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                let meaningful_event = matches!(
                    event.kind,
                    EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                );

                if meaningful_event
                    && event.paths.iter().any(|p| p == &settings_path)
                    && tx.send_blocking(WheelEvent::SettingsReload).is_err()
                {
                    log::debug!("Settings listener is gone");
                }
            }
            Err(e) => log::error!("Watch error: {}", e),
        },
        notify::Config::default(),
    )?;

    watcher.watch(&settings_dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Item;

    #[test]
    fn test_missing_fields_take_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.include_nested_containers);
        assert!(settings.stacks(Category::Explosive));
        assert!(!settings.stacks(Category::Medical));
    }

    #[test]
    fn test_overrides() {
        let json = r#"{
            "include_secondary_store": true,
            "stacking": ["explosive", "ammo"],
            "disabled": ["totem"],
            "quick_slots": [{ "category": "food", "index": 7 }],
            "tags": [{ "tag": "Snack", "category": "food" }]
        }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();

        assert!(settings.collect_options().include_secondary);
        assert!(settings.stacks(Category::Ammo));
        assert!(!settings.is_enabled(Category::Totem));
        assert_eq!(settings.quick_slot(Category::Food), 7);
        assert_eq!(settings.quick_slot(Category::Medical), Category::Medical.default_quick_slot());

        let chips = Item::new(1, "chips", "Chips").tagged("snack");
        assert!(settings.classifier().matches(&chips, Category::Food));
    }

    #[test]
    fn test_watcher_reports_settings_writes() {
        let dir = std::env::temp_dir().join(format!("quickwheel-watch-{}", std::process::id()));
        fs_err::create_dir_all(&dir).unwrap();
        let dir = fs_err::canonicalize(&dir).unwrap();
        let path = dir.join("settings.toml");
        let (tx, rx) = async_channel::unbounded();

        let _watcher = watch_settings_at(path.clone(), tx).unwrap();
        fs_err::write(dir.join("unrelated.toml"), "x = 1").unwrap();
        fs_err::write(&path, DEFAULT_SETTINGS).unwrap();

        let mut reloads = 0;
        for _ in 0..50 {
            while let Ok(event) = rx.try_recv() {
                assert!(matches!(event, WheelEvent::SettingsReload));
                reloads += 1;
            }
            if reloads > 0 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(100));
        }
        let _ = fs_err::remove_dir_all(&dir);
        assert!(reloads > 0);
    }

    #[test]
    fn test_bundled_defaults_parse() {
        let s = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_SETTINGS, config::FileFormat::Toml))
            .build()
            .unwrap();
        let settings: Settings = s.try_deserialize().unwrap();
        assert_eq!(settings, Settings::default());
    }
}
