use crate::backend::BackendKind;
use crate::errors::*;
use crate::misc_utils::expand_tilde;
use crate::pager::SortNoticeGate;

use json::JsonValue;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "~/.scene_query/config.json";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub backend: BackendKind,
    pub suppress_sort_notice: bool,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::CouchDb,
            suppress_sort_notice: false,
            log_level: "info".to_owned(),
        }
    }
}

impl AppConfig {
    pub fn from_json_str(config_json: &str) -> ApiResult<Self> {
        let value = json::parse(config_json)?;
        let mut config = Self::default();
        if let Some(backend) = value["backend"].as_str() {
            config.backend = backend.parse()?;
        }
        if let Some(suppress) = value["suppressSortNotice"].as_bool() {
            config.suppress_sort_notice = suppress;
        }
        if let Some(level) = value["logLevel"].as_str() {
            config.log_level = level.to_owned();
        }
        Ok(config)
    }

    pub fn to_json(&self) -> JsonValue {
        let mut value = JsonValue::new_object();
        value["backend"] = self.backend.name().into();
        value["suppressSortNotice"] = self.suppress_sort_notice.into();
        value["logLevel"] = self.log_level.as_str().into();
        value
    }

    /// Reads the config at `path`; a missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> ApiResult<Self> {
        let path = resolve(path)?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_json_str(&fs::read_to_string(&path)?)
    }

    pub fn sort_notice_gate(&self) -> SortNoticeGate {
        SortNoticeGate::new(self.suppress_sort_notice)
    }

    /// Closes `gate` for good and writes the choice to `path`.
    pub fn remember_sort_notice_choice<P: AsRef<Path>>(
        &mut self,
        gate: &mut SortNoticeGate,
        path: P,
    ) -> ApiResult<()> {
        gate.remember_choice();
        self.suppress_sort_notice = gate.is_suppressed();
        self.save(path)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> ApiResult<()> {
        let path = resolve(path)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, self.to_json().pretty(2))?;
        Ok(())
    }
}

fn resolve<P: AsRef<Path>>(path: P) -> ApiResult<PathBuf> {
    let input = path.as_ref();
    guard!(let Some(resolved) = expand_tilde(input) else {
        return invalid_data_ae!("can't resolve home directory for {:?}", input);
    });
    Ok(resolved)
}

#[test]
fn test_defaults_for_missing_keys() {
    let config = AppConfig::from_json_str("{}").unwrap();
    assert_eq!(config, AppConfig::default());

    let config = AppConfig::from_json_str(r#"{"backend":"PouchDB","logLevel":"debug"}"#).unwrap();
    assert_eq!(config.backend, BackendKind::PouchDb);
    assert_eq!(config.log_level, "debug");
    assert!(!config.suppress_sort_notice);
}

#[test]
fn test_unknown_backend() {
    assert!(AppConfig::from_json_str(r#"{"backend":"mongo"}"#).is_err());
}

#[test]
fn test_save_and_load() {
    let dir = std::env::temp_dir().join(format!("scene_query_cfg_{}", std::process::id()));
    let path = dir.join("config.json");
    assert_eq!(AppConfig::load(&path).unwrap(), AppConfig::default());

    let config = AppConfig {
        backend: BackendKind::PouchDb,
        suppress_sort_notice: true,
        log_level: "warning".to_owned(),
    };
    config.save(&path).unwrap();
    assert_eq!(AppConfig::load(&path).unwrap(), config);
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_remembered_sort_notice_survives_reload() {
    let dir = std::env::temp_dir().join(format!("scene_query_notice_{}", std::process::id()));
    let path = dir.join("nested").join("config.json");

    let mut config = AppConfig::load(&path).unwrap();
    let mut gate = config.sort_notice_gate();
    assert!(!gate.is_suppressed());

    config.remember_sort_notice_choice(&mut gate, &path).unwrap();
    assert!(gate.is_suppressed());

    let reloaded = AppConfig::load(&path).unwrap();
    assert!(reloaded.suppress_sort_notice);
    assert!(reloaded.sort_notice_gate().is_suppressed());
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_resolve_keeps_absolute_paths() {
    let path = std::env::temp_dir().join("scene_query.json");
    assert_eq!(resolve(&path).unwrap(), path);
}
