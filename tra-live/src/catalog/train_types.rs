//! Train types and their short display names.
//!
//! TDX only publishes full type names ("自強(推拉式自強號且無自行車車廂)"),
//! which are too long for a departure board. Short aliases are keyed by the
//! coarse type code, except for chartered tourist services which share one
//! alias regardless of code.

use std::collections::HashMap;

use crate::domain::{ParseError, TrainTypeId, parse_field};
use crate::tdx::{TrainTypeDto, TrainTypeResponse};

use super::Language;

const PAYLOAD: &str = "train types";

/// A short display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alias {
    pub zh: &'static str,
    pub en: &'static str,
}

impl Alias {
    pub fn get(&self, lang: Language) -> &'static str {
        match lang {
            Language::Zh => self.zh,
            Language::En => self.en,
        }
    }
}

/// Type ids of chartered tourist ("character") trains.
const CHARACTER_TRAIN_TYPES: [&str; 8] =
    ["1104", "1106", "1112", "1121", "1130", "1134", "1150", "1154"];

const CHARACTER_TRAIN: Alias = Alias {
    zh: "專車",
    en: "Character Train",
};

/// Alias for a type code.
fn code_alias(code: &str) -> Option<Alias> {
    let (zh, en) = match code {
        "1" => ("太魯閣", "Taroko"),
        "2" => ("普悠瑪", "Puyuma"),
        "3" => ("自強", "Tze-Chiang"),
        "4" => ("莒光", "Chu-Kuang"),
        "5" => ("復興", "Fu-Hsing"),
        "6" => ("區間", "Local"),
        "7" => ("普快", "Ordinary"),
        "10" => ("區間快", "Local Express"),
        "11" => ("新自強", "New Tze-Chiang"),
        _ => return None,
    };
    Some(Alias { zh, en })
}

/// One train type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainType {
    pub id: TrainTypeId,
    pub code: String,
    pub name_zh: String,
    pub name_en: Option<String>,
    pub alias: Option<Alias>,
}

impl TrainType {
    fn from_dto(dto: &TrainTypeDto) -> Result<Self, ParseError> {
        let id = parse_field(PAYLOAD, "TrainTypeID", &dto.train_type_id, TrainTypeId::parse)?;
        let alias = if CHARACTER_TRAIN_TYPES.contains(&id.as_str()) {
            Some(CHARACTER_TRAIN)
        } else {
            code_alias(&dto.train_type_code)
        };

        Ok(Self {
            id,
            code: dto.train_type_code.clone(),
            name_zh: dto.train_type_name.zh_tw.clone(),
            name_en: dto.train_type_name.en.clone(),
            alias,
        })
    }

    /// Full name, falling back to Chinese.
    pub fn full_name(&self, lang: Language) -> &str {
        match lang {
            Language::Zh => &self.name_zh,
            Language::En => self.name_en.as_deref().unwrap_or(&self.name_zh),
        }
    }

    /// Short name if one is known, otherwise the full name.
    pub fn display_name(&self, lang: Language) -> &str {
        match self.alias {
            Some(alias) => alias.get(lang),
            None => self.full_name(lang),
        }
    }
}

/// All train types, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct TrainTypeCatalog {
    types: HashMap<TrainTypeId, TrainType>,
}

impl TrainTypeCatalog {
    /// Parse a `/TrainType` body.
    pub fn parse(body: &[u8]) -> Result<Self, ParseError> {
        let response: TrainTypeResponse =
            serde_json::from_slice(body).map_err(|e| ParseError::json(PAYLOAD, e))?;
        Self::from_response(&response)
    }

    pub fn from_response(response: &TrainTypeResponse) -> Result<Self, ParseError> {
        let types = response
            .train_types
            .iter()
            .map(|dto| TrainType::from_dto(dto).map(|t| (t.id.clone(), t)))
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(Self { types })
    }

    pub fn get(&self, id: &str) -> Option<&TrainType> {
        self.types.get(id)
    }

    /// Board name for a type id, if known.
    pub fn display_name(&self, id: &str, lang: Language) -> Option<&str> {
        self.get(id).map(|t| t.display_name(lang))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
