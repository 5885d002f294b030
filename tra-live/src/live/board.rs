//! Live train positions.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};

use crate::domain::{ParseError, StationId, TrainNo, TrainTypeId, parse_field};
use crate::tdx::{LiveBoardDto, LiveBoardResponse};

const PAYLOAD: &str = "live board";

/// Last reported position of one running train.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivePosition {
    pub train_no: TrainNo,
    pub train_type: Option<TrainTypeId>,
    /// Station the train was last seen at.
    pub station: StationId,
    /// Minutes late. `None` until the railway reports a delay.
    pub delay: Option<i64>,
    pub reported_at: Option<DateTime<FixedOffset>>,
}

impl LivePosition {
    fn from_dto(dto: &LiveBoardDto) -> Result<Self, ParseError> {
        Ok(Self {
            train_no: parse_field(PAYLOAD, "TrainNo", &dto.train_no, TrainNo::parse)?,
            train_type: dto
                .train_type_id
                .as_deref()
                .map(|s| parse_field(PAYLOAD, "TrainTypeID", s, TrainTypeId::parse))
                .transpose()?,
            station: parse_field(PAYLOAD, "StationID", &dto.station_id, StationId::parse)?,
            delay: dto.delay_time,
            reported_at: dto
                .update_time
                .as_deref()
                .map(|s| parse_timestamp("UpdateTime", s))
                .transpose()?,
        })
    }
}

/// Snapshot of the live board, keyed by train number.
///
/// Replaced wholesale on every fetch.
#[derive(Debug, Clone)]
pub struct LiveBoard {
    updated_at: DateTime<FixedOffset>,
    source_updated_at: Option<DateTime<FixedOffset>>,
    positions: HashMap<TrainNo, LivePosition>,
}

impl LiveBoard {
    /// Parse a `TrainLiveBoard` body.
    pub fn parse(body: &[u8]) -> Result<Self, ParseError> {
        let response: LiveBoardResponse =
            serde_json::from_slice(body).map_err(|e| ParseError::json(PAYLOAD, e))?;
        Self::from_response(&response)
    }

    pub fn from_response(response: &LiveBoardResponse) -> Result<Self, ParseError> {
        let positions = response
            .train_live_boards
            .iter()
            .map(|dto| LivePosition::from_dto(dto).map(|p| (p.train_no.clone(), p)))
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(Self {
            updated_at: parse_timestamp("UpdateTime", &response.update_time)?,
            source_updated_at: response
                .src_update_time
                .as_deref()
                .map(|s| parse_timestamp("SrcUpdateTime", s))
                .transpose()?,
            positions,
        })
    }

    pub fn position(&self, train_no: &str) -> Option<&LivePosition> {
        self.positions.get(train_no)
    }

    /// Reported delay for a train; `None` if it is not on the board or has
    /// no delay reported.
    pub fn delay(&self, train_no: &str) -> Option<i64> {
        self.position(train_no).and_then(|p| p.delay)
    }

    pub fn positions(&self) -> impl Iterator<Item = &LivePosition> {
        self.positions.values()
    }

    /// When TDX produced this board.
    pub fn updated_at(&self) -> DateTime<FixedOffset> {
        self.updated_at
    }

    /// When the railway's own system last updated.
    pub fn source_updated_at(&self) -> Option<DateTime<FixedOffset>> {
        self.source_updated_at
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    parse_field(PAYLOAD, field, value, DateTime::parse_from_rfc3339)
}
