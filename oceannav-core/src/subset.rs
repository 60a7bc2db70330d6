//! Subset/export requests and the URLs that trigger them.

use std::fmt;
use std::str::FromStr;

use percent_encoding::utf8_percent_encode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::view::{DatasetId, TimeIndex, VariableId, ViewState};

// ---------------------------------------------------------------------------
// Formats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    #[default]
    #[serde(rename = "NETCDF4")]
    Netcdf4,
    #[serde(rename = "NETCDF3_CLASSIC")]
    Netcdf3Classic,
    #[serde(rename = "NETCDF3_64BIT")]
    Netcdf3Bit64,
    /// Only offered for GIOPS and RIOPS datasets.
    #[serde(rename = "NETCDF3_NC")]
    Netcdf3Nc,
    #[serde(rename = "NETCDF4_CLASSIC")]
    Netcdf4Classic,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Netcdf4 => "NETCDF4",
            Self::Netcdf3Classic => "NETCDF3_CLASSIC",
            Self::Netcdf3Bit64 => "NETCDF3_64BIT",
            Self::Netcdf3Nc => "NETCDF3_NC",
            Self::Netcdf4Classic => "NETCDF4_CLASSIC",
        }
    }

    pub fn available_for(self, dataset: &DatasetId) -> bool {
        match self {
            Self::Netcdf3Nc => {
                let id = dataset.as_str();
                id.contains("giops") || id.contains("riops")
            }
            _ => true,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Language of a generated API script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptLanguage {
    Python,
    R,
}

impl ScriptLanguage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::R => "r",
        }
    }
}

impl FromStr for ScriptLanguage {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" => Ok(Self::Python),
            "r" => Ok(Self::R),
            other => Err(CoreError::InvalidActionArgument {
                action: "subset".to_string(),
                reason: format!("unknown script language {other:?}"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Area
// ---------------------------------------------------------------------------

/// Region to export: a predefined area by name or a drawn `[lat, lon]`
/// polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubsetArea {
    Named(String),
    Polygon(Vec<[f64; 2]>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    /// `"lat_min,lon_min"`.
    pub fn min_range(&self) -> String {
        format!("{},{}", self.lat_min, self.lon_min)
    }

    /// `"lat_max,lon_max"`.
    pub fn max_range(&self) -> String {
        format!("{},{}", self.lat_max, self.lon_max)
    }
}

/// Axis-aligned extent of a polygon.
pub fn bounding_box(polygon: &[[f64; 2]]) -> crate::Result<BoundingBox> {
    let (first, rest) = polygon.split_first().ok_or(CoreError::EmptyArea)?;
    let init = BoundingBox {
        lat_min: first[0],
        lat_max: first[0],
        lon_min: first[1],
        lon_max: first[1],
    };
    Ok(rest.iter().fold(init, |bb, [lat, lon]| BoundingBox {
        lat_min: bb.lat_min.min(*lat),
        lat_max: bb.lat_max.max(*lat),
        lon_min: bb.lon_min.min(*lon),
        lon_max: bb.lon_max.max(*lon),
    }))
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsetRequest {
    pub dataset: DatasetId,
    pub variables: Vec<VariableId>,
    pub starttime: TimeIndex,
    pub endtime: TimeIndex,
    /// Export the whole window; otherwise only `endtime`.
    #[serde(default)]
    pub time_range: bool,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default)]
    pub zip: bool,
    pub area: SubsetArea,
}

impl SubsetRequest {
    /// A request covering the panel's current time window, with no
    /// variables chosen yet.
    pub fn from_view(view: &ViewState, area: SubsetArea) -> Self {
        Self {
            dataset: view.dataset.clone(),
            variables: Vec::new(),
            starttime: view.starttime,
            endtime: view.time,
            time_range: false,
            output_format: OutputFormat::default(),
            zip: false,
            area,
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.variables.is_empty() {
            return Err(CoreError::NoSubsetVariables);
        }
        if !self.output_format.available_for(&self.dataset) {
            return Err(CoreError::UnavailableFormat {
                format: self.output_format.to_string(),
                dataset: self.dataset.to_string(),
            });
        }
        if let SubsetArea::Polygon(polygon) = &self.area {
            bounding_box(polygon)?;
        }
        Ok(())
    }

    /// `(start, end)` of the exported window.
    pub fn time_window(&self) -> (TimeIndex, TimeIndex) {
        if !self.time_range {
            (self.endtime, self.endtime)
        } else if self.starttime > self.endtime {
            (self.endtime, self.starttime)
        } else {
            (self.starttime, self.endtime)
        }
    }

    fn variable_list(&self) -> String {
        self.variables
            .iter()
            .map(VariableId::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    fn area_params(&self) -> crate::Result<Vec<(&'static str, String)>> {
        match &self.area {
            SubsetArea::Named(name) => Ok(vec![("area", name.clone())]),
            SubsetArea::Polygon(polygon) => {
                let bb = bounding_box(polygon)?;
                Ok(vec![("min_range", bb.min_range()), ("max_range", bb.max_range())])
            }
        }
    }

    /// Download URL of the subset, relative to the server root.
    pub fn subset_url(&self) -> crate::Result<String> {
        self.validate()?;
        let (start, end) = self.time_window();
        let mut url = format!(
            "/api/v2.0/subset/{}/{}?&output_format={}",
            self.dataset,
            self.variable_list(),
            self.output_format
        );
        for (key, value) in self.area_params()? {
            url.push_str(&format!("&{key}={value}"));
        }
        url.push_str(&format!(
            "&time={start},{end}&should_zip={}",
            u8::from(self.zip)
        ));
        Ok(url)
    }

    /// URL of a generated script reproducing this request.
    pub fn script_url(&self, origin: &str, lang: ScriptLanguage) -> crate::Result<String> {
        self.validate()?;
        let mut query = Map::new();
        query.insert("outputFormat".into(), Value::from(self.output_format.as_str()));
        query.insert("dataset_name".into(), Value::from(self.dataset.as_str()));
        query.insert("variables".into(), Value::from(self.variable_list()));
        query.insert(
            "time".into(),
            Value::from(format!("{},{}", self.starttime, self.endtime)),
        );
        query.insert("should_zip".into(), Value::from(u8::from(self.zip)));
        for (key, value) in self.area_params()? {
            query.insert(key.into(), Value::from(value));
        }
        let mut entries: Vec<(String, Value)> = query.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let json = Value::Object(entries.into_iter().collect()).to_string();
        Ok(format!(
            "{}/api/v2.0/generate_script/?query={}&lang={}&scriptType=subset",
            origin.trim_end_matches('/'),
            utf8_percent_encode(&json, crate::permalink::URI_COMPONENT),
            lang.as_str()
        ))
    }
}
