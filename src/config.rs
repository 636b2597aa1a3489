use std::{fs, path::Path};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// timeout for one runtime introspection round-trip, in milliseconds
    pub introspection_timeout_ms: u64,
    /// capacity of the synchronization event queue
    pub sync_queue_size: usize,
    /// number of async worker threads, range [1, 32768), defaults to 16
    pub async_worker_thread_number: u16,
    /// number of rows shown by the generated preview statement
    pub preview_rows: usize,
    /// root directory that relative file-path parameters are resolved against
    pub path_root: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            introspection_timeout_ms: 3000,
            sync_queue_size: 1024,
            async_worker_thread_number: 16,
            preview_rows: 5,
            path_root: None,
        }
    }
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Self {
        let data = fs::read_to_string(path.as_ref()).expect(&format!("failed to load config file {:?}", path.as_ref()));

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Self {
        let config = toml::from_str::<Config>(toml_str).expect("failed to parse the toml str");
        config
    }
}

#[cfg(test)]
mod test {
    use crate::Config;

    #[test]
    fn test_config_deserialize() {
        let toml_str = r#"
        introspection_timeout_ms = 1500
        sync_queue_size = 256
        async_worker_thread_number = 10
        preview_rows = 10
        path_root = "/data/projects"
        "#;
        let config = Config::load_from_str(toml_str);
        assert_eq!(config.introspection_timeout_ms, 1500);
        assert_eq!(config.sync_queue_size, 256);
        assert_eq!(config.async_worker_thread_number, 10);
        assert_eq!(config.preview_rows, 10);
        assert_eq!(config.path_root.unwrap(), "/data/projects");
    }
}
