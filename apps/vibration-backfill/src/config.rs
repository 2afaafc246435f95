use crate::roster::{default_roster, load_roster, DeviceSensorMapping};
use anyhow::{anyhow, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

const DEFAULT_LIZARD_BASE_URL: &str = "https://nens.lizard.net";
const DEFAULT_LIZARD_USERNAME: &str = "__key__";
const DEFAULT_LOG_DIR: &str = "logs";

#[derive(Clone, Debug)]
pub struct Config {
    pub connxt_base_url: String,
    pub connxt_client_id: String,
    pub lizard_base_url: String,
    pub lizard_username: String,
    pub lizard_api_key: String,
    pub log_dir: PathBuf,
    pub roster: Vec<DeviceSensorMapping>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let optional = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required =
            |key: &str| optional(key).ok_or_else(|| anyhow!("missing env var {key}"));

        let connxt_base_url = normalize_base_url(&required("CONNXT_BASE_URL")?);
        let connxt_client_id = required("CONNXT_CLIENT_ID")?;
        let lizard_api_key = required("LIZARD_API_KEY")?;
        let lizard_base_url = normalize_base_url(
            &optional("LIZARD_BASE_URL").unwrap_or_else(|| DEFAULT_LIZARD_BASE_URL.to_string()),
        );
        let lizard_username = optional("LIZARD_USERNAME")
            .unwrap_or_else(|| DEFAULT_LIZARD_USERNAME.to_string());
        let log_dir = PathBuf::from(
            optional("BACKFILL_LOG_DIR").unwrap_or_else(|| DEFAULT_LOG_DIR.to_string()),
        );

        let roster = match optional("BACKFILL_ROSTER_PATH") {
            Some(path) => load_roster(&PathBuf::from(path))?,
            None => default_roster(),
        };

        Ok(Self {
            connxt_base_url,
            connxt_client_id,
            lizard_base_url,
            lizard_username,
            lizard_api_key,
            log_dir,
            roster,
        })
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("CONNXT_BASE_URL", "https://connxt.example.com/"),
        ("CONNXT_CLIENT_ID", " hhnk "),
        ("LIZARD_API_KEY", "secret"),
    ];

    #[test]
    fn defaults_fill_optional_settings() {
        let config = Config::from_lookup(lookup(&REQUIRED)).expect("config");
        assert_eq!(config.connxt_base_url, "https://connxt.example.com");
        assert_eq!(config.connxt_client_id, "hhnk");
        assert_eq!(config.lizard_base_url, "https://nens.lizard.net");
        assert_eq!(config.lizard_username, "__key__");
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert_eq!(config.roster, default_roster());
    }

    #[test]
    fn missing_required_var_is_named() {
        let err = Config::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();
        assert!(err.to_string().contains("LIZARD_API_KEY"));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let mut vars = REQUIRED.to_vec();
        vars[1] = ("CONNXT_CLIENT_ID", "   ");
        assert!(Config::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn roster_path_replaces_built_in_roster() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"device_id": 7, "streams": [{{"signal": "VRms", "stream_id": "2395a532-d23b-4d5b-b7a6-e0b07e07703c"}}]}}]"#
        )
        .unwrap();
        let path = file.path().to_string_lossy().to_string();
        let mut vars = REQUIRED.to_vec();
        vars.push(("BACKFILL_ROSTER_PATH", path.as_str()));

        let config = Config::from_lookup(lookup(&vars)).expect("config");
        assert_eq!(config.roster.len(), 1);
        assert_eq!(config.roster[0].device_id, 7);
    }

    #[test]
    fn unreadable_roster_is_an_error() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("BACKFILL_ROSTER_PATH", "/nonexistent/roster.json"));
        assert!(Config::from_lookup(lookup(&vars)).is_err());
    }
}
