//! Configuration loader (A3, §6).
//!
//! The config file is YAML, conceptually a `hub`-like document: every key
//! has a typed default, unknown keys are ignored, and an invalid value for
//! a single field falls back to that field's default with a warning rather
//! than aborting the whole load (§6: "invalid values must fall back to
//! defaults, never crash").

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level configuration (§6's key table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub enabled: bool,
    pub ollama_host: String,
    pub chat_model: Option<String>,
    pub embedding_model: Option<String>,
    pub context_window: u32,
    pub health_threshold: f32,
    pub semantic_threshold: f32,
    pub duplicate_threshold: f32,
    pub lsh_collection_threshold: u32,
    pub lsh_hash_bits: u32,
    pub lsh_tables: u32,
    pub reminder_count: u32,
    pub settings_version: u32,
    pub skip_hooks_after_clear: bool,
    pub injection: InjectionConfig,
    /// Unknown keys, retained only for forward-compatibility debugging;
    /// never read by the rest of the crate.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            enabled: true,
            ollama_host: "localhost".to_string(),
            chat_model: None,
            embedding_model: None,
            context_window: 16384,
            health_threshold: 0.7,
            semantic_threshold: 0.45,
            duplicate_threshold: 0.92,
            lsh_collection_threshold: 200,
            lsh_hash_bits: 10,
            lsh_tables: 6,
            reminder_count: 1,
            settings_version: 1,
            skip_hooks_after_clear: false,
            injection: InjectionConfig::default(),
            extra: BTreeMap::new(),
        }
    }
}

/// Per-type and per-tool injector policy (§4.11, §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionConfig {
    pub enabled: bool,
    pub types: BTreeMap<String, TypeInjectionConfig>,
    pub hook_multipliers: BTreeMap<String, f32>,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        let mut types = BTreeMap::new();
        types.insert(
            "gotcha".to_string(),
            TypeInjectionConfig { enabled: true, threshold: 0.45, limit: 5 },
        );
        types.insert(
            "decision".to_string(),
            TypeInjectionConfig { enabled: true, threshold: 0.45, limit: 5 },
        );
        types.insert(
            "learning".to_string(),
            TypeInjectionConfig { enabled: true, threshold: 0.45, limit: 5 },
        );

        let mut hook_multipliers = BTreeMap::new();
        hook_multipliers.insert("Read".to_string(), 1.0);
        hook_multipliers.insert("Edit".to_string(), 0.8);
        hook_multipliers.insert("Write".to_string(), 0.8);
        hook_multipliers.insert("Bash".to_string(), 1.2);

        InjectionConfig {
            enabled: true,
            types,
            hook_multipliers,
        }
    }
}

/// Per-memory-type injector policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeInjectionConfig {
    pub enabled: bool,
    pub threshold: f32,
    pub limit: u32,
}

impl Default for TypeInjectionConfig {
    fn default() -> Self {
        TypeInjectionConfig {
            enabled: true,
            threshold: 0.45,
            limit: 5,
        }
    }
}

impl Config {
    /// Load from a YAML file, falling back to defaults entirely if the file
    /// is missing or fails to parse at the top level. Per-field invalid
    /// values are handled by serde's `#[serde(default)]` on read only when
    /// the value is simply absent; a present-but-wrong-typed value fails the
    /// whole document in serde_yaml, so on any parse error we retry field by
    /// field via [`Config::lenient_parse`].
    /// Seed `global_root/config.yaml` from the bundled template before the
    /// first load, if one hasn't been written yet. `CLAUDE_PLUGIN_ROOT`
    /// (§6) points at the plugin's install directory; its `config.yaml` is
    /// the commented template a fresh install ships with. Absent the env
    /// var, an unreadable template, or an already-existing config file,
    /// this is a silent no-op and callers fall back to in-memory defaults
    /// via [`Config::load`] as usual.
    pub fn seed_from_plugin_root(global_root: &Path) {
        let config_path = global_root.join("config.yaml");
        if config_path.exists() {
            return;
        }
        let Ok(plugin_root) = std::env::var("CLAUDE_PLUGIN_ROOT") else { return };
        let template_path = Path::new(&plugin_root).join("config.yaml");
        let Ok(template) = std::fs::read(&template_path) else { return };

        if std::fs::create_dir_all(global_root).is_err() {
            return;
        }
        if let Err(e) = crate::fsutil::atomic_write(&config_path, &template) {
            tracing::warn!(path = %config_path.display(), error = %e, "failed to seed config from plugin template");
        }
    }

    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "config file unreadable, using defaults");
                return Config::default();
            }
        };
        Self::parse(&raw)
    }

    /// Parse a YAML document into a `Config`, falling back to defaults for
    /// any field whose value doesn't match its expected type.
    pub fn parse(raw: &str) -> Self {
        match serde_yaml::from_str::<Config>(raw) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "config file invalid, attempting lenient per-field recovery");
                Self::lenient_parse(raw)
            }
        }
    }

    /// Parse as a loose YAML mapping and apply valid fields on top of the
    /// defaults, skipping any field that fails to convert.
    fn lenient_parse(raw: &str) -> Self {
        let mut config = Config::default();
        let Ok(serde_yaml::Value::Mapping(map)) = serde_yaml::from_str::<serde_yaml::Value>(raw) else {
            return config;
        };

        macro_rules! apply {
            ($key:literal, $field:ident) => {
                if let Some(v) = map.get(&serde_yaml::Value::String($key.to_string())) {
                    match serde_yaml::from_value(v.clone()) {
                        Ok(parsed) => config.$field = parsed,
                        Err(_) => tracing::warn!(key = $key, "invalid config value, using default"),
                    }
                }
            };
        }

        apply!("enabled", enabled);
        apply!("ollama_host", ollama_host);
        apply!("chat_model", chat_model);
        apply!("embedding_model", embedding_model);
        apply!("context_window", context_window);
        apply!("health_threshold", health_threshold);
        apply!("semantic_threshold", semantic_threshold);
        apply!("duplicate_threshold", duplicate_threshold);
        apply!("lsh_collection_threshold", lsh_collection_threshold);
        apply!("lsh_hash_bits", lsh_hash_bits);
        apply!("lsh_tables", lsh_tables);
        apply!("reminder_count", reminder_count);
        apply!("settings_version", settings_version);
        apply!("skip_hooks_after_clear", skip_hooks_after_clear);
        apply!("injection", injection);

        config
    }
}
