//! # TVBackdrop Configuration Module
//!
//! This module provides configuration management for TVBackdrop, including:
//! - Loading configuration from YAML files
//! - Merging with embedded default configuration
//! - Environment variable overrides
//! - Type-safe getters and setters for configuration values
//! - A small namespaced key-value area used to persist user preferences
//! - Thread-safe singleton access pattern
//!
//! ## Usage
//!
//! ```no_run
//! use tvbconfig::get_config;
//!
//! let config = get_config();
//!
//! let import_dir = config.get_import_dir()?;
//! let size = config.get_thumbnail_size()?;
//!
//! config.set_prefs("background_prefs", &[("backgroundPath", "/tmp/a.mp4")])?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Result, anyhow};
use dirs::home_dir;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_yaml::{Mapping, Number, Value};
use std::{env, fs, io::Write, path::Path, sync::Arc};
use tempfile::NamedTempFile;
use tracing::{info, warn};

// Embedded default configuration
const DEFAULT_CONFIG: &str = include_str!("tvbackdrop.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load TVBackdrop configuration"));
}

const ENV_CONFIG_DIR: &str = "TVBACKDROP_CONFIG";
const ENV_PREFIX: &str = "TVBACKDROP_CONFIG__";
const DEFAULT_CONFIG_DIR_NAME: &str = ".tvbackdrop";

// Default values for configuration
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;
const DEFAULT_IMPORT_DIR: &str = "imported_backgrounds";
const DEFAULT_IPC_DIR: &str = "ipc";
const DEFAULT_ASSETS_DIR: &str = "assets";
const DEFAULT_THUMBNAIL_SIZE: usize = 320;
const DEFAULT_THUMBNAIL_OFFSET_SECS: usize = 5;
const DEFAULT_PLAYER_COMMAND: &str = "mpv";
const DEFAULT_FFMPEG_COMMAND: &str = "ffmpeg";

/// Macro to generate getter/setter for usize values with default
macro_rules! impl_usize_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<usize> {
            match self.get_value($path) {
                Ok(Value::Number(n)) => match n.as_u64() {
                    Some(v) => Ok(v as usize),
                    None => Ok($default),
                },
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: usize) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value)))
        }
    };
}

/// Macro to generate getter/setter for bool values with default
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<bool> {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => Ok(b),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// A background shipped with the application, as listed under
/// `backgrounds.bundled.images` / `backgrounds.bundled.videos`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BundledEntry {
    pub name: String,
    pub path: String,
}

/// Configuration manager for TVBackdrop
///
/// # Examples
///
/// ```no_run
/// use tvbconfig::get_config;
///
/// let config = get_config();
/// let roots = config.get_media_roots();
/// println!("Media roots: {:?}", roots);
/// ```
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.data.lock().clone();
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        if !directory.is_empty() {
            return directory.to_string();
        }

        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var=ENV_CONFIG_DIR, path=%env_path, "Trying to load config from env");
            return env_path;
        }

        if Path::new(DEFAULT_CONFIG_DIR_NAME).exists() {
            return DEFAULT_CONFIG_DIR_NAME.to_string();
        }

        if let Some(home) = home_dir() {
            let home_config = home.join(DEFAULT_CONFIG_DIR_NAME);
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        DEFAULT_CONFIG_DIR_NAME.to_string()
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        // Write then read probe
        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;
        fs::read_dir(path)?;

        Ok(())
    }

    /// Determines and validates the configuration directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `TVBACKDROP_CONFIG` environment variable
    /// 3. `.tvbackdrop` in the current directory
    /// 4. `.tvbackdrop` in the user's home directory
    ///
    /// The directory is created if it doesn't exist, and validated for read/write permissions.
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir_path = Self::find_config_dir(directory);
        Self::validate_config_dir(Path::new(&dir_path))?;
        Ok(dir_path)
    }

    /// Loads the configuration from the specified directory
    ///
    /// This method:
    /// 1. Determines the configuration directory
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with the external config.yaml file if present
    /// 4. Applies environment variable overrides
    /// 5. Saves the merged configuration
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        info!(config_dir=%config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let mut default_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        let yaml_data = if let Ok(data) = fs::read(&path) {
            info!(config_file=%path, "Loaded config file");
            data
        } else {
            info!(config_file=%path, "Config file not found, using default embedded config");
            DEFAULT_CONFIG.as_bytes().to_vec()
        };

        let external_value: Value = serde_yaml::from_slice(&yaml_data)?;
        merge_yaml(&mut default_value, &external_value);
        let mut config_value = Self::lower_keys_value(default_value);

        Self::apply_env_overrides(&mut config_value);

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    /// Directory holding `config.yaml`; relative managed directories hang off it.
    pub fn directory(&self) -> &str {
        &self.config_dir
    }

    /// Saves the current configuration to the config.yaml file
    pub fn save(&self) -> Result<()> {
        let data = self.data.lock();
        self.write_file(&data)
    }

    /// Writes `data` next to config.yaml then renames it over the file, so
    /// a failed or interrupted write leaves the previous file intact.
    fn write_file(&self, data: &Value) -> Result<()> {
        let yaml = serde_yaml::to_string(data)?;
        let mut staged = NamedTempFile::new_in(&self.config_dir)?;
        staged.write_all(yaml.as_bytes())?;
        staged.as_file().sync_all()?;
        staged.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Applies `change` to a copy of the configuration and commits the copy
    /// only once it is on disk.
    fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Value) -> Result<()>,
    {
        let mut data = self.data.lock();
        let mut next = data.clone();
        change(&mut next)?;
        self.write_file(&next)?;
        *data = next;
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["backgrounds", "import_directory"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        self.update(|data| Self::set_value_internal(data, path, value))
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key_value = Value::String(path[0].to_lowercase());
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    ///
    /// Returns an error if the path doesn't exist.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data.lock();
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                let key = key.to_lowercase();

                if let Some(next) = map.get(&Value::String(key)) {
                    current = next;
                } else {
                    return Err(anyhow!("Path {} does not exist", path[..=i].join(".")));
                }
            } else {
                return Err(anyhow!("Path {} is not a Config", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                let _ = Self::set_value_internal(config, &key_path, yaml_value);
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
            return parsed;
        }
        Value::String(value.to_string())
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    if let Value::String(s) = k {
                        new_map.insert(Value::String(s.to_lowercase()), Self::lower_keys_value(v));
                    } else {
                        new_map.insert(k, Self::lower_keys_value(v));
                    }
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    /// Resolves a path against the config directory and creates it if needed
    fn resolve_and_create_dir(&self, dir_path: &str) -> Result<String> {
        let path = Path::new(dir_path);

        let absolute_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.config_dir).join(path)
        };

        if !absolute_path.exists() {
            fs::create_dir_all(&absolute_path)?;
            info!(directory=%absolute_path.display(), "Created managed directory");
        }

        Ok(absolute_path.to_string_lossy().to_string())
    }

    /// Gets a directory managed by the configuration
    ///
    /// The directory may be absolute or relative to the configuration
    /// directory. It is created if it does not exist yet. When the key is
    /// missing, `default` is written back and used.
    pub fn get_managed_dir(&self, path: &[&str], default: &str) -> Result<String> {
        let dir_path = match self.get_value(path) {
            Ok(Value::String(s)) if !s.is_empty() => s,
            _ => {
                self.set_managed_dir(path, default.to_string())?;
                default.to_string()
            }
        };
        self.resolve_and_create_dir(&dir_path)
    }

    /// Sets a directory managed by the configuration
    pub fn set_managed_dir(&self, path: &[&str], directory: String) -> Result<()> {
        self.set_value(path, Value::String(directory))
    }

    // ------------------------------------------------------------------
    // Preferences (namespaced string key-value pairs)
    // ------------------------------------------------------------------

    /// Reads a string preference stored under `namespace`.
    ///
    /// Returns `Ok(None)` when the key is absent. A present key that holds
    /// something other than a scalar is reported as an error.
    pub fn get_pref(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        match self.get_value(&[namespace, key]) {
            Ok(Value::String(s)) => Ok(Some(s)),
            Ok(Value::Number(n)) => Ok(Some(n.to_string())),
            Ok(Value::Bool(b)) => Ok(Some(b.to_string())),
            Ok(Value::Null) | Err(_) => Ok(None),
            Ok(other) => Err(anyhow!(
                "Preference {}.{} is not a scalar: {:?}",
                namespace,
                key,
                other
            )),
        }
    }

    /// Writes several string preferences under `namespace`, in the given
    /// order, then saves the configuration file once.
    ///
    /// Nothing is applied unless the file is written: a failed save leaves
    /// the previous values readable.
    pub fn set_prefs(&self, namespace: &str, entries: &[(&str, &str)]) -> Result<()> {
        self.update(|data| {
            for (key, value) in entries {
                Self::set_value_internal(
                    data,
                    &[namespace, *key],
                    Value::String((*value).to_string()),
                )?;
            }
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Logger
    // ------------------------------------------------------------------

    impl_bool_config!(
        get_log_enable_console,
        set_log_enable_console,
        &["host", "logger", "enable_console"],
        DEFAULT_LOG_ENABLE_CONSOLE
    );

    /// Minimum log level name (`TRACE` .. `ERROR`)
    pub fn get_log_min_level(&self) -> Result<String> {
        match self.get_value(&["host", "logger", "min_level"]) {
            Ok(Value::String(s)) => Ok(s),
            _ => Ok(DEFAULT_LOG_MIN_LEVEL.to_string()),
        }
    }

    pub fn set_log_min_level(&self, level: String) -> Result<()> {
        self.set_value(&["host", "logger", "min_level"], Value::String(level))
    }

    // ------------------------------------------------------------------
    // Backgrounds
    // ------------------------------------------------------------------

    /// App-private directory receiving imported backgrounds
    pub fn get_import_dir(&self) -> Result<String> {
        self.get_managed_dir(&["backgrounds", "import_directory"], DEFAULT_IMPORT_DIR)
    }

    /// Directory holding the files behind `asset://` locators
    pub fn get_assets_dir(&self) -> Result<String> {
        self.get_managed_dir(&["backgrounds", "assets_directory"], DEFAULT_ASSETS_DIR)
    }

    /// Directory where player IPC sockets are created
    pub fn get_ipc_dir(&self) -> Result<String> {
        self.get_managed_dir(&["backgrounds", "player", "ipc_directory"], DEFAULT_IPC_DIR)
    }

    impl_usize_config!(
        get_thumbnail_size,
        set_thumbnail_size,
        &["backgrounds", "thumbnails", "size"],
        DEFAULT_THUMBNAIL_SIZE
    );

    impl_usize_config!(
        get_thumbnail_offset_secs,
        set_thumbnail_offset_secs,
        &["backgrounds", "thumbnails", "offset_secs"],
        DEFAULT_THUMBNAIL_OFFSET_SECS
    );

    /// Executable used to extract video frames for thumbnails
    pub fn get_ffmpeg_command(&self) -> String {
        match self.get_value(&["backgrounds", "thumbnails", "ffmpeg_command"]) {
            Ok(Value::String(s)) if !s.trim().is_empty() => s,
            _ => DEFAULT_FFMPEG_COMMAND.to_string(),
        }
    }

    /// Directories scanned for importable media. Non-string entries are
    /// skipped.
    pub fn get_media_roots(&self) -> Vec<String> {
        match self.get_value(&["backgrounds", "media_roots"]) {
            Ok(Value::Sequence(seq)) => seq
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) if !s.is_empty() => Some(s),
                    _ => None,
                })
                .collect(),
            Ok(Value::String(s)) if !s.is_empty() => vec![s],
            _ => Vec::new(),
        }
    }

    pub fn set_media_roots(&self, roots: &[String]) -> Result<()> {
        let seq = roots.iter().cloned().map(Value::String).collect();
        self.set_value(&["backgrounds", "media_roots"], Value::Sequence(seq))
    }

    /// Bundled backgrounds of the given kind (`images` or `videos`).
    ///
    /// Malformed entries are skipped with a warning rather than failing
    /// the whole list.
    pub fn get_bundled_backgrounds(&self, kind: &str) -> Vec<BundledEntry> {
        let seq = match self.get_value(&["backgrounds", "bundled", kind]) {
            Ok(Value::Sequence(seq)) => seq,
            _ => return Vec::new(),
        };

        seq.into_iter()
            .filter_map(|v| match serde_yaml::from_value::<BundledEntry>(v) {
                Ok(entry) if !entry.path.is_empty() => Some(entry),
                Ok(_) => None,
                Err(e) => {
                    warn!(kind, error=%e, "Ignoring malformed bundled background entry");
                    None
                }
            })
            .collect()
    }

    /// Executable used to render video backgrounds
    pub fn get_player_command(&self) -> String {
        match self.get_value(&["backgrounds", "player", "command"]) {
            Ok(Value::String(s)) if !s.trim().is_empty() => s,
            _ => DEFAULT_PLAYER_COMMAND.to_string(),
        }
    }

    pub fn set_player_command(&self, command: String) -> Result<()> {
        self.set_value(&["backgrounds", "player", "command"], Value::String(command))
    }
}

/// Returns the global configuration instance
///
/// The configuration is lazily loaded on first access.
///
/// # Panics
///
/// Panics if the configuration directory cannot be created or the
/// configuration file cannot be parsed.
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Merges external YAML configuration into default configuration
///
/// Mappings are merged key by key; scalars and sequences from `external`
/// replace the default ones.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}
