//! Typed fetch operations
//!
//! Thin wrappers over [`ResilientClient::fetch`] that build the query for
//! each endpoint and expect a JSON array of records back.

use serde_json::Value;
use statline_common::resilience::Clock;
use statline_domain::{ClientError, GamesQuery, Operation, Params, Result};

use super::client::ResilientClient;

impl<C: Clock> ResilientClient<C> {
    /// Games for a season, optionally narrowed by week, season type and team
    pub fn games(&self, query: &GamesQuery) -> Result<Vec<Value>> {
        self.fetch_records(Operation::Games, query.to_params())
    }

    /// Team ratings for `year`
    pub fn ratings(&self, year: u16, week: Option<u8>) -> Result<Vec<Value>> {
        self.fetch_records(Operation::Ratings, season(year, week))
    }

    /// Betting lines for one week
    pub fn lines(&self, year: u16, week: u8) -> Result<Vec<Value>> {
        self.fetch_records(Operation::Lines, season(year, Some(week)))
    }

    pub fn recruiting(&self, year: u16) -> Result<Vec<Value>> {
        self.fetch_records(Operation::Recruiting, season(year, None))
    }

    pub fn team_talent(&self, year: u16) -> Result<Vec<Value>> {
        self.fetch_records(Operation::TeamTalent, season(year, None))
    }

    pub fn weather(&self, year: u16, week: Option<u8>) -> Result<Vec<Value>> {
        self.fetch_records(Operation::Weather, season(year, week))
    }

    /// Broadcast and streaming listings
    pub fn media(&self, year: u16, week: Option<u8>) -> Result<Vec<Value>> {
        self.fetch_records(Operation::Media, season(year, week))
    }

    /// Predicted points added by game
    pub fn predicted_points(&self, year: u16, week: Option<u8>) -> Result<Vec<Value>> {
        self.fetch_records(Operation::PredictedPoints, season(year, week))
    }

    /// SP+ ratings, for one team or all of them
    pub fn sp_ratings(&self, year: u16, team: Option<&str>) -> Result<Vec<Value>> {
        let params = Params::new().with("year", year).with_opt("team", team);
        self.fetch_records(Operation::SpRatings, params)
    }

    fn fetch_records(&self, operation: Operation, params: Params) -> Result<Vec<Value>> {
        // A non-array can still come from an entry cached by plain `fetch`.
        match self.fetch_checked(operation, params, &expect_array)? {
            Value::Array(records) => Ok(records),
            other => {
                let err = ClientError::Decode {
                    operation,
                    endpoint: operation.path().to_string(),
                    message: format!("expected a JSON array, got {}", json_kind(&other)),
                };
                self.report_failure(&err, false, false);
                Err(err)
            }
        }
    }
}

fn season(year: u16, week: Option<u8>) -> Params {
    Params::new().with("year", year).with_opt("week", week)
}

fn expect_array(value: &Value) -> std::result::Result<(), String> {
    match value {
        Value::Array(_) => Ok(()),
        other => Err(format!("expected a JSON array, got {}", json_kind(other))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
