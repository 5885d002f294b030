//! Station directory: ids, names and grades.

use std::collections::HashMap;

use crate::domain::{ParseError, StationId, parse_field};
use crate::tdx::{StationDto, StationMapResponse};

use super::Language;

const PAYLOAD: &str = "station map";

/// One station of the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationInfo {
    pub id: StationId,
    pub name_zh: String,
    pub name_en: Option<String>,
    /// Station grade as given by the feed.
    pub class: Option<String>,
}

impl StationInfo {
    fn from_dto(dto: &StationDto) -> Result<Self, ParseError> {
        Ok(Self {
            id: parse_field(PAYLOAD, "StationID", &dto.station_id, StationId::parse)?,
            name_zh: dto.station_name.zh_tw.clone(),
            name_en: dto.station_name.en.clone().filter(|n| !n.is_empty()),
            class: dto.station_class.clone(),
        })
    }

    /// Display name, falling back to Chinese when no English name exists.
    pub fn name(&self, lang: Language) -> &str {
        match lang {
            Language::Zh => &self.name_zh,
            Language::En => self.name_en.as_deref().unwrap_or(&self.name_zh),
        }
    }
}

/// Lookup from station id or name to station.
#[derive(Debug, Clone, Default)]
pub struct StationDirectory {
    stations: HashMap<StationId, StationInfo>,
    by_name: HashMap<String, StationId>,
}

impl StationDirectory {
    /// Parse a `/Station` body.
    pub fn parse(body: &[u8]) -> Result<Self, ParseError> {
        let response: StationMapResponse =
            serde_json::from_slice(body).map_err(|e| ParseError::json(PAYLOAD, e))?;
        Self::from_response(&response)
    }

    pub fn from_response(response: &StationMapResponse) -> Result<Self, ParseError> {
        let stations = response
            .stations
            .iter()
            .map(StationInfo::from_dto)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_stations(stations))
    }

    fn from_stations(stations: Vec<StationInfo>) -> Self {
        let mut by_name = HashMap::new();
        for info in &stations {
            by_name.insert(normalize_name(&info.name_zh), info.id.clone());
            if let Some(en) = &info.name_en {
                by_name.insert(normalize_name(en), info.id.clone());
            }
        }

        Self {
            stations: stations.into_iter().map(|s| (s.id.clone(), s)).collect(),
            by_name,
        }
    }

    pub fn get(&self, id: &str) -> Option<&StationInfo> {
        self.stations.get(id)
    }

    /// Find a station by id, Chinese name or English name.
    ///
    /// Names are matched loosely: a trailing 車站 or 站 is ignored, 台 and
    /// 臺 are interchangeable, and English is case-insensitive.
    pub fn resolve(&self, query: &str) -> Option<&StationInfo> {
        let query = query.trim();
        self.get(query).or_else(|| {
            self.by_name
                .get(&normalize_name(query))
                .and_then(|id| self.stations.get(id))
        })
    }

    /// Display name for an id, if known.
    pub fn name(&self, id: &str, lang: Language) -> Option<&str> {
        self.get(id).map(|s| s.name(lang))
    }

    pub fn iter(&self) -> impl Iterator<Item = &StationInfo> {
        self.stations.values()
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

/// Canonical lookup key for a station name.
fn normalize_name(name: &str) -> String {
    let name = name.trim().replace('台', "臺").to_lowercase();
    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
    for suffix in ["車站", "站", " station"] {
        if let Some(stem) = name.strip_suffix(suffix)
            && !stem.is_empty()
        {
            return stem.to_string();
        }
    }
    name
}
