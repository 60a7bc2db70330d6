//! Shareable links.
//!
//! A link carries a single `query` parameter holding a percent-encoded JSON
//! object. Two token shapes exist and are never mixed: a selection token,
//! which reopens a plot window, and a settings token, which carries a chosen
//! subset of the view settings. Keys are emitted in sorted order so equal
//! states always produce byte-identical links.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::error::CoreError;
use crate::patch::StatePatch;
use crate::selection::{SelectionKind, SelectionValue};
use crate::state::AppState;

/// Characters escaped by a URI-component encoder.
pub(crate) const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const QUERY_PARAM: &str = "query=";

// ---------------------------------------------------------------------------
// Keys and flags
// ---------------------------------------------------------------------------

/// A view setting that may be included in a settings link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PermalinkKey {
    Dataset,
    Variable,
    QuiverVariable,
    Depth,
    Time,
    Starttime,
    Scale,
    Scale1,
    VariableScale,
    Dataset1,
    DatasetCompare,
    SyncRanges,
    Options,
    Projection,
    Basemap,
    Quantum,
}

impl PermalinkKey {
    pub const ALL: [PermalinkKey; 16] = [
        Self::Dataset,
        Self::Variable,
        Self::QuiverVariable,
        Self::Depth,
        Self::Time,
        Self::Starttime,
        Self::Scale,
        Self::Scale1,
        Self::VariableScale,
        Self::Dataset1,
        Self::DatasetCompare,
        Self::SyncRanges,
        Self::Options,
        Self::Projection,
        Self::Basemap,
        Self::Quantum,
    ];

    /// Wire key of the setting.
    pub fn key(self) -> &'static str {
        match self {
            Self::Dataset => "dataset",
            Self::Variable => "variable",
            Self::QuiverVariable => "quiverVariable",
            Self::Depth => "depth",
            Self::Time => "time",
            Self::Starttime => "starttime",
            Self::Scale => "scale",
            Self::Scale1 => "scale_1",
            Self::VariableScale => "variable_scale",
            Self::Dataset1 => "dataset_1",
            Self::DatasetCompare => "dataset_compare",
            Self::SyncRanges => "syncRanges",
            Self::Options => "options",
            Self::Projection => "projection",
            Self::Basemap => "basemap",
            Self::Quantum => "quantum",
        }
    }
}

impl fmt::Display for PermalinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for PermalinkKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.key() == s)
            .ok_or_else(|| CoreError::UnknownStateKey(s.to_string()))
    }
}

/// Which settings a settings link carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermalinkFlags(BTreeMap<PermalinkKey, bool>);

impl PermalinkFlags {
    /// Every setting enabled.
    pub fn all() -> Self {
        Self(PermalinkKey::ALL.into_iter().map(|k| (k, true)).collect())
    }

    /// No setting enabled.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_keys(keys: impl IntoIterator<Item = PermalinkKey>) -> Self {
        Self(keys.into_iter().map(|k| (k, true)).collect())
    }

    pub fn set(&mut self, key: PermalinkKey, enabled: bool) -> &mut Self {
        self.0.insert(key, enabled);
        self
    }

    pub fn is_enabled(&self, key: PermalinkKey) -> bool {
        self.0.get(&key).copied().unwrap_or(false)
    }

    pub fn enabled(&self) -> impl Iterator<Item = PermalinkKey> + '_ {
        self.0.iter().filter(|(_, on)| **on).map(|(k, _)| *k)
    }
}

impl FromStr for PermalinkFlags {
    type Err = CoreError;

    /// `all`, `none`, or a comma-separated list of wire keys.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all" => Ok(Self::all()),
            "none" | "" => Ok(Self::none()),
            list => list
                .split(',')
                .map(|k| k.trim().parse::<PermalinkKey>())
                .collect::<Result<Vec<_>, _>>()
                .map(Self::from_keys),
        }
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Reopens a plot window for a selection.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionToken {
    pub subquery: Value,
    pub kind: SelectionKind,
    pub value: SelectionValue,
    pub names: Vec<String>,
}

/// A subset of the view settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsToken {
    pub entries: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PermalinkToken {
    Selection(SelectionToken),
    Settings(SettingsToken),
}

impl PermalinkToken {
    /// JSON payload of the token with every object's keys sorted.
    pub fn to_json(&self) -> Value {
        let value = match self {
            Self::Selection(token) => {
                let mut map = Map::new();
                map.insert("subquery".to_string(), token.subquery.clone());
                map.insert("showModal".to_string(), Value::Bool(true));
                map.insert("modal".to_string(), Value::String(token.kind.key().to_string()));
                map.insert(
                    "names".to_string(),
                    Value::Array(token.names.iter().cloned().map(Value::String).collect()),
                );
                map.insert(
                    token.kind.key().to_string(),
                    serde_json::to_value(&token.value).unwrap_or(Value::Null),
                );
                Value::Object(map)
            }
            Self::Settings(token) => Value::Object(
                token
                    .entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
        };
        canonicalize(value)
    }

    /// The percent-encoded `query` parameter value.
    pub fn to_query(&self) -> String {
        utf8_percent_encode(&self.to_json().to_string(), URI_COMPONENT).to_string()
    }

    /// A full link rooted at `base`.
    pub fn to_url(&self, base: &str) -> String {
        format!("{base}?{QUERY_PARAM}{}", self.to_query())
    }
}

/// Rebuild every object with its keys in sorted order, whatever the map
/// implementation behind `serde_json::Map`.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

/// Build the link token for `state`.
///
/// With both a pending plot subquery and a selection the selection token is
/// produced and `flags` is ignored; otherwise the settings enabled in
/// `flags` are taken from the state's wire form.
pub fn encode(state: &AppState, flags: &PermalinkFlags) -> PermalinkToken {
    if let (Some(subquery), Some(selection)) = (&state.subquery, &state.selection) {
        debug!(kind = %selection.kind, "Encoding selection link");
        return PermalinkToken::Selection(SelectionToken {
            subquery: subquery.clone(),
            kind: selection.kind,
            value: selection.link_value(),
            names: selection.names.clone(),
        });
    }

    let wire = state.to_json();
    let entries = flags
        .enabled()
        .filter_map(|key| {
            wire.get(key.key())
                .map(|value| (key.key().to_string(), value.clone()))
        })
        .collect();
    PermalinkToken::Settings(SettingsToken { entries })
}

/// Decode a link into a patch, logging and returning an empty patch when
/// the link is malformed.
pub fn decode(link: &str) -> StatePatch {
    match try_decode(link) {
        Ok(patch) => patch,
        Err(e) => {
            error!("Ignoring permalink: {e}");
            StatePatch::default()
        }
    }
}

/// Decode a link into a patch.
///
/// Accepts a full URL, a `?query=…` or `query=…` string, the bare encoded
/// token, or raw JSON.
pub fn try_decode(link: &str) -> crate::Result<StatePatch> {
    let token = extract_query(link.trim());
    let decoded = percent_decode_str(token)
        .decode_utf8()
        .map_err(|e| CoreError::MalformedPermalink {
            reason: e.to_string(),
        })?;
    let value: Value =
        serde_json::from_str(&decoded).map_err(|e| CoreError::MalformedPermalink {
            reason: e.to_string(),
        })?;
    if !value.is_object() {
        return Err(CoreError::MalformedPermalink {
            reason: "payload is not a JSON object".to_string(),
        });
    }
    StatePatch::from_json(value)
}

fn extract_query(link: &str) -> &str {
    let link = link.split('#').next().unwrap_or(link);
    let token = match link.find(QUERY_PARAM) {
        Some(pos) if pos == 0 || matches!(link.as_bytes()[pos - 1], b'?' | b'&') => {
            &link[pos + QUERY_PARAM.len()..]
        }
        _ => link,
    };
    token.trim_start_matches('?')
}
