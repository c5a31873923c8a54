use rusqlite::Connection;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::db;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranscriptSettings {
    pub institution: String,
}

impl Default for TranscriptSettings {
    fn default() -> Self {
        Self {
            institution: "Student Information System".to_string(),
        }
    }
}

/// Cut-offs for the academic standing report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StandingSettings {
    pub warning_below: f64,
    pub deans_list_at_or_above: f64,
}

impl Default for StandingSettings {
    fn default() -> Self {
        Self {
            warning_below: 2.0,
            deans_list_at_or_above: 3.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Transcript,
    Standing,
}

impl Section {
    pub const ALL: [Section; 2] = [Section::Transcript, Section::Standing];

    pub fn key(self) -> &'static str {
        match self {
            Section::Transcript => "transcript",
            Section::Standing => "standing",
        }
    }

    pub fn parse(raw: &str) -> Option<Section> {
        Section::ALL.into_iter().find(|s| s.key() == raw)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub transcript: TranscriptSettings,
    pub standing: StandingSettings,
}

fn merge_into(base: &mut Value, patch: &serde_json::Map<String, Value>) {
    if let Some(obj) = base.as_object_mut() {
        for (k, v) in patch {
            obj.insert(k.clone(), v.clone());
        }
    }
}

/// Defaults overlaid with whatever is stored. A stored value that no longer
/// parses is logged and replaced by the defaults.
fn load_section<T>(conn: &Connection, section: Section) -> anyhow::Result<T>
where
    T: Default + Serialize + DeserializeOwned,
{
    let mut current = serde_json::to_value(T::default())?;
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            merge_into(&mut current, saved_obj);
        }
    }
    match serde_json::from_value(current) {
        Ok(parsed) => Ok(parsed),
        Err(e) => {
            warn!(section = section.key(), error = %e, "stored settings ignored, using defaults");
            Ok(T::default())
        }
    }
}

pub fn load(conn: &Connection) -> anyhow::Result<Settings> {
    Ok(Settings {
        transcript: load_section(conn, Section::Transcript)?,
        standing: load_section(conn, Section::Standing)?,
    })
}

fn validate<T: DeserializeOwned>(merged: &Value) -> Result<(), String> {
    serde_json::from_value::<T>(merged.clone())
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Applies a partial update to one section. Unknown or mistyped fields are
/// rejected before anything is written.
pub fn update_section(conn: &Connection, section: Section, patch: &Value) -> anyhow::Result<Result<Value, String>> {
    let Some(patch_obj) = patch.as_object() else {
        return Ok(Err("patch must be an object".to_string()));
    };
    let mut current = match section {
        Section::Transcript => serde_json::to_value(load_section::<TranscriptSettings>(conn, section)?)?,
        Section::Standing => serde_json::to_value(load_section::<StandingSettings>(conn, section)?)?,
    };
    let known: Vec<String> = current
        .as_object()
        .map(|o| o.keys().cloned().collect())
        .unwrap_or_default();
    if let Some(unknown) = patch_obj.keys().find(|k| !known.contains(k)) {
        return Ok(Err(format!("unknown {} field: {}", section.key(), unknown)));
    }
    merge_into(&mut current, patch_obj);
    let checked = match section {
        Section::Transcript => validate::<TranscriptSettings>(&current),
        Section::Standing => validate::<StandingSettings>(&current),
    };
    if let Err(message) = checked {
        return Ok(Err(message));
    }
    db::settings_set_json(conn, section.key(), &current)?;
    Ok(Ok(current))
}
