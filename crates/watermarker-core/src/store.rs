//! Persistent storage of watermark profiles and session memory
//!
//! Everything lives in one TOML file. Each profile is a table named after
//! the profile and flagged with `is_profile = true`; the `session` table
//! remembers what the user last ran with. Reads never fail: missing or
//! malformed values fall back to defaults one key at a time.

use crate::error::{Result, WatermarkError};
use crate::models::{AnchorPosition, Color, FontDescriptor, WatermarkKind};
use crate::profile::{
    default_watermark_text, WatermarkProfile, DEFAULT_MARGIN, DEFAULT_PROFILE_NAME,
    DEFAULT_TRANSPARENCY,
};
use std::path::{Path, PathBuf};
use toml::{Table, Value};
use tracing::{debug, info, warn};

/// Table holding session memory rather than a profile
pub const SESSION_GROUP: &str = "session";

pub const DEFAULT_ZOOM: u32 = 30;

mod keys {
    pub const TYPE: &str = "type";
    pub const IS_PROFILE: &str = "is_profile";
    pub const TEXT: &str = "text";
    pub const IMAGE: &str = "image";
    pub const MARGIN_HORIZONTAL: &str = "marginHorizontal";
    pub const MARGIN_VERTICAL: &str = "marginVertical";
    pub const TRANSPARENCY: &str = "transparency";
    pub const FONT: &str = "font";
    pub const MAIN_COLOR: &str = "mainColor";
    pub const OUTLINE_COLOR: &str = "outlineColor";

    pub const SOURCE_PATH: &str = "sourcePath";
    pub const DESTINATION_PATH: &str = "destinationPath";
    pub const ANCHOR: &str = "anchor";
    pub const ZOOM: &str = "zoom";
    pub const PROFILE: &str = "profile";
    pub const RECURSIVE: &str = "recursive";
}

/// What the user last worked with
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub source_path: Option<PathBuf>,
    pub destination_path: Option<PathBuf>,
    pub anchor: AnchorPosition,
    pub zoom: u32,
    pub profile: String,
    pub recursive: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            source_path: None,
            destination_path: None,
            anchor: AnchorPosition::default(),
            zoom: DEFAULT_ZOOM,
            profile: DEFAULT_PROFILE_NAME.to_string(),
            recursive: false,
        }
    }
}

/// File-backed key/value store of profiles
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    /// Use the given file; it is created on first save
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/<organization>/<application>.toml`
    pub fn default_path(organization: &str, application: &str) -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| WatermarkError::ConfigError {
            message: "Could not determine config directory".to_string(),
        })?;

        Ok(config_dir
            .join(organization)
            .join(format!("{}.toml", application)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names of all stored profiles, always including the default one
    pub fn list(&self) -> Vec<String> {
        let table = self.read_lenient();
        let mut names: Vec<String> = table
            .iter()
            .filter(|(_, value)| {
                value
                    .as_table()
                    .and_then(|group| group.get(keys::IS_PROFILE))
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
            })
            .map(|(name, _)| name.clone())
            .collect();

        if !names.iter().any(|name| name == DEFAULT_PROFILE_NAME) {
            names.push(DEFAULT_PROFILE_NAME.to_string());
        }

        names
    }

    /// Whether a profile with this name has been saved
    pub fn contains(&self, name: &str) -> bool {
        self.read_lenient()
            .get(name)
            .and_then(Value::as_table)
            .and_then(|group| group.get(keys::IS_PROFILE))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Stored values for `name` layered over the defaults
    pub fn load(&self, name: &str) -> WatermarkProfile {
        let table = self.read_lenient();
        let empty = Table::new();
        let group = table
            .get(name)
            .and_then(Value::as_table)
            .unwrap_or(&empty);

        let mut profile = WatermarkProfile::new(name);

        profile.set_kind(
            get_str(group, keys::TYPE)
                .and_then(|kind| kind.parse().ok())
                .unwrap_or(WatermarkKind::Text),
        );
        profile.set_text(
            get_str(group, keys::TEXT)
                .map(str::to_string)
                .unwrap_or_else(default_watermark_text),
        );
        profile.set_image_path(get_str(group, keys::IMAGE).unwrap_or_default());
        profile.set_margin_horizontal(
            get_int(group, keys::MARGIN_HORIZONTAL).unwrap_or(DEFAULT_MARGIN),
        );
        profile.set_margin_vertical(get_int(group, keys::MARGIN_VERTICAL).unwrap_or(DEFAULT_MARGIN));
        profile.set_transparency(get_float(group, keys::TRANSPARENCY).unwrap_or(DEFAULT_TRANSPARENCY));
        profile.set_font(
            get_parsed::<FontDescriptor>(group, keys::FONT).unwrap_or_default(),
        );
        profile.set_main_color(get_parsed(group, keys::MAIN_COLOR).unwrap_or_else(Color::white));
        profile.set_outline_color(
            get_parsed(group, keys::OUTLINE_COLOR).unwrap_or_else(Color::black),
        );

        debug!("Loaded profile '{}' from {}", name, self.path.display());
        profile
    }

    /// Write every field of `profile` under its name
    pub fn save(&self, profile: &WatermarkProfile) -> Result<()> {
        check_profile_name(profile.name())?;

        let mut table = self.read_strict()?;

        let mut group = Table::new();
        group.insert(keys::TYPE.into(), Value::String(profile.kind().to_string()));
        group.insert(keys::IS_PROFILE.into(), Value::Boolean(true));
        group.insert(keys::TEXT.into(), Value::String(profile.text().to_string()));
        group.insert(
            keys::IMAGE.into(),
            Value::String(profile.image_path().to_string_lossy().into_owned()),
        );
        group.insert(
            keys::MARGIN_HORIZONTAL.into(),
            Value::Integer(profile.margin_horizontal().into()),
        );
        group.insert(
            keys::MARGIN_VERTICAL.into(),
            Value::Integer(profile.margin_vertical().into()),
        );
        group.insert(keys::TRANSPARENCY.into(), Value::Float(profile.transparency()));
        group.insert(keys::FONT.into(), Value::String(profile.font().to_string()));
        group.insert(
            keys::MAIN_COLOR.into(),
            Value::String(profile.main_color().to_string()),
        );
        group.insert(
            keys::OUTLINE_COLOR.into(),
            Value::String(profile.outline_color().to_string()),
        );

        table.insert(profile.name().to_string(), Value::Table(group));
        self.write(&table)?;

        info!("Saved profile '{}' to {}", profile.name(), self.path.display());
        Ok(())
    }

    /// Delete the profile; absent profiles are not an error
    pub fn remove(&self, name: &str) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }

        let mut table = self.read_strict()?;
        if table.remove(name).is_some() {
            self.write(&table)?;
            info!("Removed profile '{}'", name);
        }
        Ok(())
    }

    /// Move a profile to a new name and return it
    pub fn rename(&self, old: &str, new: &str) -> Result<WatermarkProfile> {
        check_profile_name(new)?;
        if old == new {
            return Ok(self.load(old));
        }
        if self.contains(new) {
            return Err(WatermarkError::InvalidInput {
                message: format!("a profile named '{}' already exists", new),
            });
        }

        let mut profile = self.load(old);
        profile.set_name(new);
        self.save(&profile)?;
        self.remove(old)?;
        Ok(profile)
    }

    pub fn load_session(&self) -> SessionState {
        let table = self.read_lenient();
        let Some(group) = table.get(SESSION_GROUP).and_then(Value::as_table) else {
            return SessionState::default();
        };

        let defaults = SessionState::default();
        SessionState {
            source_path: get_str(group, keys::SOURCE_PATH)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            destination_path: get_str(group, keys::DESTINATION_PATH)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            anchor: get_parsed(group, keys::ANCHOR).unwrap_or(defaults.anchor),
            zoom: get_int(group, keys::ZOOM)
                .and_then(|zoom| u32::try_from(zoom).ok())
                .unwrap_or(defaults.zoom),
            profile: get_str(group, keys::PROFILE)
                .map(str::to_string)
                .unwrap_or(defaults.profile),
            recursive: group
                .get(keys::RECURSIVE)
                .and_then(Value::as_bool)
                .unwrap_or(defaults.recursive),
        }
    }

    pub fn save_session(&self, session: &SessionState) -> Result<()> {
        let mut table = self.read_strict()?;

        let mut group = Table::new();
        if let Some(source) = &session.source_path {
            group.insert(
                keys::SOURCE_PATH.into(),
                Value::String(source.to_string_lossy().into_owned()),
            );
        }
        if let Some(destination) = &session.destination_path {
            group.insert(
                keys::DESTINATION_PATH.into(),
                Value::String(destination.to_string_lossy().into_owned()),
            );
        }
        group.insert(keys::ANCHOR.into(), Value::String(session.anchor.to_string()));
        group.insert(keys::ZOOM.into(), Value::Integer(session.zoom.into()));
        group.insert(keys::PROFILE.into(), Value::String(session.profile.clone()));
        group.insert(keys::RECURSIVE.into(), Value::Boolean(session.recursive));

        table.insert(SESSION_GROUP.to_string(), Value::Table(group));
        self.write(&table)
    }

    fn read_lenient(&self) -> Table {
        match self.read_strict() {
            Ok(table) => table,
            Err(e) => {
                warn!("Ignoring unreadable profile store {}: {}", self.path.display(), e);
                Table::new()
            }
        }
    }

    fn read_strict(&self) -> Result<Table> {
        if !self.path.exists() {
            return Ok(Table::new());
        }

        let contents = std::fs::read_to_string(&self.path)?;
        contents
            .parse::<Table>()
            .map_err(|e| WatermarkError::StoreError {
                message: format!("Failed to parse {}: {}", self.path.display(), e),
            })
    }

    fn write(&self, table: &Table) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(table).map_err(|e| WatermarkError::StoreError {
            message: format!("Failed to serialize profiles: {}", e),
        })?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

fn check_profile_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(WatermarkError::InvalidInput {
            message: "profile name must not be empty".to_string(),
        });
    }
    if name == SESSION_GROUP {
        return Err(WatermarkError::InvalidInput {
            message: format!("'{}' is reserved", SESSION_GROUP),
        });
    }
    Ok(())
}

fn get_str<'a>(group: &'a Table, key: &str) -> Option<&'a str> {
    group.get(key).and_then(Value::as_str)
}

fn get_int(group: &Table, key: &str) -> Option<i32> {
    match group.get(key)? {
        Value::Integer(i) => i32::try_from(*i).ok(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn get_float(group: &Table, key: &str) -> Option<f64> {
    match group.get(key)? {
        Value::Float(f) => Some(*f),
        Value::Integer(i) => Some(*i as f64),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn get_parsed<T: std::str::FromStr>(group: &Table, key: &str) -> Option<T> {
    let raw = get_str(group, key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            debug!("Falling back to default for {} = {:?}", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &tempfile::TempDir) -> ProfileStore {
        ProfileStore::open(dir.path().join("profiles.toml"))
    }

    #[test]
    fn test_list_always_contains_default() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.list(), vec![DEFAULT_PROFILE_NAME.to_string()]);
    }

    #[test]
    fn test_load_missing_profile_gives_defaults() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let profile = store.load("Nothing Here");
        assert_eq!(profile.name(), "Nothing Here");
        assert_eq!(profile, WatermarkProfile::new("Nothing Here"));
        assert!(!store.contains("Nothing Here"));
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        let mut profile = WatermarkProfile::new("Studio");
        profile.set_kind(WatermarkKind::Image);
        profile.set_text("© Studio");
        profile.set_image_path("/srv/logos/studio.png");
        profile.set_margin_horizontal(25);
        profile.set_margin_vertical(-3);
        profile.set_transparency(0.123456);
        let mut font = FontDescriptor::new("Liberation Sans", 30);
        font.bold = true;
        font.underline = true;
        profile.set_font(font.clone());
        profile.set_main_color(Color::rgb(0x12, 0x34, 0x56));
        profile.set_outline_color(Color::new(1, 2, 3, 4));

        store.save(&profile).unwrap();
        let loaded = store.load("Studio");

        assert_eq!(loaded.name(), "Studio");
        assert_eq!(loaded.kind(), WatermarkKind::Image);
        assert_eq!(loaded.text(), "© Studio");
        assert_eq!(loaded.image_path(), Path::new("/srv/logos/studio.png"));
        assert_eq!(loaded.margin_horizontal(), 25);
        assert_eq!(loaded.margin_vertical(), -3);
        assert!((loaded.transparency() - 0.123456).abs() < 1e-6);
        assert_eq!(loaded.font(), &font);
        assert_eq!(loaded.main_color().to_string(), "#123456");
        assert_eq!(loaded.outline_color(), Color::new(1, 2, 3, 4));
        assert_eq!(loaded, profile);

        assert!(store.contains("Studio"));
        assert!(store.list().contains(&"Studio".to_string()));
    }

    #[test]
    fn test_unflagged_groups_are_not_profiles() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            "[Other]\ntext = \"not a profile\"\n\n[session]\nzoom = 50\n",
        )
        .unwrap();

        assert_eq!(store.list(), vec![DEFAULT_PROFILE_NAME.to_string()]);
        assert_eq!(store.load_session().zoom, 50);
    }

    #[test]
    fn test_malformed_values_fall_back_individually() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            concat!(
                "[Broken]\n",
                "is_profile = true\n",
                "type = \"hologram\"\n",
                "text = \"kept\"\n",
                "marginHorizontal = \"7\"\n",
                "marginVertical = true\n",
                "transparency = 1\n",
                "font = \"n/a\"\n",
                "mainColor = \"red-ish\"\n",
                "outlineColor = \"#00ff00\"\n",
            ),
        )
        .unwrap();

        let profile = store.load("Broken");
        assert_eq!(profile.kind(), WatermarkKind::Text);
        assert_eq!(profile.text(), "kept");
        assert_eq!(profile.margin_horizontal(), 7);
        assert_eq!(profile.margin_vertical(), DEFAULT_MARGIN);
        assert_eq!(profile.transparency(), 1.0);
        assert_eq!(profile.font(), &FontDescriptor::default());
        assert_eq!(profile.main_color(), Color::white());
        assert_eq!(profile.outline_color(), Color::rgb(0, 255, 0));
    }

    #[test]
    fn test_unparseable_file_reads_as_empty_but_blocks_writes() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "this is [not toml").unwrap();

        assert_eq!(store.list(), vec![DEFAULT_PROFILE_NAME.to_string()]);
        assert_eq!(store.load("x"), WatermarkProfile::new("x"));

        let err = store.save(&WatermarkProfile::new("x")).unwrap_err();
        assert_eq!(err.error_type(), "store_error");
    }

    #[test]
    fn test_remove() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        // nothing to remove yet
        store.remove("Ghost").unwrap();

        store.save(&WatermarkProfile::new("Temp")).unwrap();
        store.save(&WatermarkProfile::new("Keep")).unwrap();
        store.remove("Temp").unwrap();

        assert!(!store.contains("Temp"));
        assert!(store.contains("Keep"));
        store.remove("Temp").unwrap();
    }

    #[test]
    fn test_rename() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        let mut profile = WatermarkProfile::new("Old");
        profile.set_text("moving");
        store.save(&profile).unwrap();
        store.save(&WatermarkProfile::new("Taken")).unwrap();

        assert!(store.rename("Old", "Taken").is_err());

        let renamed = store.rename("Old", "New").unwrap();
        assert_eq!(renamed.name(), "New");
        assert_eq!(store.load("New").text(), "moving");
        assert!(!store.contains("Old"));
    }

    #[test]
    fn test_reserved_and_empty_names_rejected() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.save(&WatermarkProfile::new(SESSION_GROUP)).is_err());
        assert!(store.save(&WatermarkProfile::new("  ")).is_err());
    }

    #[test]
    fn test_session_round_trip() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.load_session(), SessionState::default());

        let session = SessionState {
            source_path: Some(PathBuf::from("/photos/in")),
            destination_path: Some(PathBuf::from("/photos/out")),
            anchor: AnchorPosition::LowerRight,
            zoom: 75,
            profile: "Studio".to_string(),
            recursive: true,
        };
        store.save_session(&session).unwrap();
        store.save(&WatermarkProfile::new("Studio")).unwrap();

        assert_eq!(store.load_session(), session);
        assert!(!store.list().contains(&SESSION_GROUP.to_string()));
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let store = ProfileStore::open(dir.path().join("nested/org/app.toml"));
        store.save(&WatermarkProfile::default()).unwrap();
        assert!(store.path().exists());
    }
}
