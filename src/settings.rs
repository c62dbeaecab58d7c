use crate::db;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub const DISPLAY_KEY: &str = "prefs.display";
const INSTITUTION_NAME_MAX: usize = 120;

/// Workspace display preferences. The thresholds are shown to users only;
/// status always uses the fixed pass threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayPrefs {
    pub institution_name: String,
    pub pass_threshold: f64,
    pub recovery_threshold: f64,
}

impl Default for DisplayPrefs {
    fn default() -> Self {
        Self {
            institution_name: "Escola EduConnect".to_string(),
            pass_threshold: 6.0,
            recovery_threshold: 4.0,
        }
    }
}

fn parse_threshold(v: &Value, key: &str) -> Result<f64, String> {
    let n = v
        .as_f64()
        .ok_or_else(|| format!("{} must be a number", key))?;
    if !(0.0..=10.0).contains(&n) {
        return Err(format!("{} must be in 0..=10", key));
    }
    Ok(n)
}

fn parse_name(v: &Value, key: &str) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.is_empty() {
        return Err(format!("{} must not be empty", key));
    }
    if s.chars().count() > INSTITUTION_NAME_MAX {
        return Err(format!("{} length must be <= {}", key, INSTITUTION_NAME_MAX));
    }
    Ok(s.to_string())
}

impl DisplayPrefs {
    /// Applies every field of `patch` or none of them.
    pub fn merge_patch(&mut self, patch: &Map<String, Value>) -> Result<(), String> {
        let mut next = self.clone();
        for (k, v) in patch {
            match k.as_str() {
                "institutionName" => next.institution_name = parse_name(v, k)?,
                "passThreshold" => next.pass_threshold = parse_threshold(v, k)?,
                "recoveryThreshold" => next.recovery_threshold = parse_threshold(v, k)?,
                _ => return Err(format!("unknown display field: {}", k)),
            }
        }
        *self = next;
        Ok(())
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Defaults with stored values merged in. Stored fields that no longer
/// validate fall back to their default one by one.
pub fn load_display(conn: &Connection) -> anyhow::Result<DisplayPrefs> {
    let mut prefs = DisplayPrefs::default();
    if let Some(Value::Object(saved)) = db::settings_get_json(conn, DISPLAY_KEY)? {
        for (k, v) in saved {
            let mut one = Map::new();
            one.insert(k, v);
            let _ = prefs.merge_patch(&one);
        }
    }
    Ok(prefs)
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub fn update_display(
    conn: &Connection,
    patch: &Map<String, Value>,
) -> Result<DisplayPrefs, SettingsError> {
    let mut prefs = load_display(conn)?;
    prefs.merge_patch(patch).map_err(SettingsError::Invalid)?;
    db::settings_set_json(conn, DISPLAY_KEY, &prefs.to_value())?;
    Ok(prefs)
}
