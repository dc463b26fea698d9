//! Named fetch operations
//!
//! Each [`Operation`] maps to one upstream endpoint. Its name scopes the
//! circuit breaker, the cache TTL and the telemetry records of every
//! request made on its behalf.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use statline_common::lifecycle::ComponentDescriptor;

use super::request::{Params, RequestDescriptor};
use crate::constants::{
    GAMES_TTL_SECS, LINES_TTL_SECS, MEDIA_TTL_SECS, RATINGS_TTL_SECS, RECRUITING_TTL_SECS,
    TALENT_TTL_SECS, WEATHER_TTL_SECS,
};
use crate::impl_domain_enum_conversions;

/// Upstream endpoint families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Games,
    Ratings,
    Lines,
    Recruiting,
    #[serde(rename = "talent")]
    TeamTalent,
    Weather,
    Media,
    PredictedPoints,
    SpRatings,
}

impl_domain_enum_conversions!(Operation {
    Games => "games",
    Ratings => "ratings",
    Lines => "lines",
    Recruiting => "recruiting",
    TeamTalent => "talent",
    Weather => "weather",
    Media => "media",
    PredictedPoints => "predicted_points",
    SpRatings => "sp_ratings",
});

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::Games,
        Operation::Ratings,
        Operation::Lines,
        Operation::Recruiting,
        Operation::TeamTalent,
        Operation::Weather,
        Operation::Media,
        Operation::PredictedPoints,
        Operation::SpRatings,
    ];

    /// Label used for breakers, cache TTLs and telemetry
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Games => "games",
            Operation::Ratings => "ratings",
            Operation::Lines => "lines",
            Operation::Recruiting => "recruiting",
            Operation::TeamTalent => "talent",
            Operation::Weather => "weather",
            Operation::Media => "media",
            Operation::PredictedPoints => "predicted_points",
            Operation::SpRatings => "sp_ratings",
        }
    }

    /// Endpoint path relative to the API host
    pub fn path(&self) -> &'static str {
        match self {
            Operation::Games => "/games",
            Operation::Ratings => "/ratings/elo",
            Operation::Lines => "/lines",
            Operation::Recruiting => "/recruiting/teams",
            Operation::TeamTalent => "/talent",
            Operation::Weather => "/games/weather",
            Operation::Media => "/games/media",
            Operation::PredictedPoints => "/ppa/games",
            Operation::SpRatings => "/ratings/sp",
        }
    }

    /// Built-in cache TTL, `None` meaning "use the configured default"
    pub fn default_ttl(&self) -> Option<Duration> {
        let secs = match self {
            Operation::Games => GAMES_TTL_SECS,
            Operation::Ratings => RATINGS_TTL_SECS,
            Operation::Lines => LINES_TTL_SECS,
            Operation::Recruiting => RECRUITING_TTL_SECS,
            Operation::TeamTalent => TALENT_TTL_SECS,
            Operation::Weather => WEATHER_TTL_SECS,
            Operation::Media => MEDIA_TTL_SECS,
            Operation::PredictedPoints | Operation::SpRatings => return None,
        };
        Some(Duration::from_secs(secs))
    }

    /// `GET` request for this operation
    pub fn request(&self, params: Params) -> RequestDescriptor {
        RequestDescriptor::get(self.path(), params)
    }

    /// Lifecycle metadata
    pub fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::stable(self.name(), env!("CARGO_PKG_VERSION"))
    }
}

/// Portion of the season a query covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonType {
    #[default]
    Regular,
    Postseason,
    Both,
}

impl_domain_enum_conversions!(SeasonType {
    Regular => "regular",
    Postseason => "postseason",
    Both => "both",
});

/// Parameters of a games lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamesQuery {
    pub year: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week: Option<u8>,
    #[serde(default)]
    pub season_type: SeasonType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
}

impl GamesQuery {
    /// Regular-season games of `year`
    pub fn new(year: u16) -> Self {
        Self { year, week: None, season_type: SeasonType::Regular, team: None }
    }

    pub fn week(mut self, week: u8) -> Self {
        self.week = Some(week);
        self
    }

    pub fn season_type(mut self, season_type: SeasonType) -> Self {
        self.season_type = season_type;
        self
    }

    pub fn team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    /// Query-string form
    pub fn to_params(&self) -> Params {
        Params::new()
            .with("year", self.year)
            .with_opt("week", self.week)
            .with("seasonType", self.season_type)
            .with_opt("team", self.team.as_deref())
    }
}
