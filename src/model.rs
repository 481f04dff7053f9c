use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum GroundType {
    Hard,
    Clay,
    Grass,
    Carpet,
    #[default]
    Unknown,
}

impl GroundType {
    /// Maps upstream labels such as "Hardcourt outdoor" or "Red clay".
    pub fn parse(raw: &str) -> Self {
        let s = raw.trim().to_ascii_lowercase();
        if s.contains("hard") {
            GroundType::Hard
        } else if s.contains("clay") {
            GroundType::Clay
        } else if s.contains("grass") {
            GroundType::Grass
        } else if s.contains("carpet") {
            GroundType::Carpet
        } else {
            GroundType::Unknown
        }
    }

    fn from_opt(raw: Option<&str>) -> Self {
        raw.map(Self::parse).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EventStatus {
    #[default]
    Scheduled,
    Live,
    Finished,
    Cancelled,
}

impl EventStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "inprogress" | "live" => EventStatus::Live,
            "finished" => EventStatus::Finished,
            "canceled" | "cancelled" | "postponed" | "interrupted" | "abandoned" | "suspended" => {
                EventStatus::Cancelled
            }
            _ => EventStatus::Scheduled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlayerRef {
    pub id: u64,
    pub name: String,
    pub ranking: Option<u32>,
}

/// Tiebreak points per set; index 0 is the first set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Score {
    pub tiebreaks: [Option<u32>; 5],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEvent {
    pub id: u64,
    pub start_timestamp: i64,
    pub ground_type: GroundType,
    pub status: EventStatus,
    pub home: PlayerRef,
    pub away: PlayerRef,
    pub winner_code: Option<u8>,
    pub home_score: Score,
    pub away_score: Score,
}

impl MatchEvent {
    /// Side the player was on in this match, if they played in it.
    pub fn side_of(&self, player_id: u64) -> Option<Side> {
        if self.home.id == player_id {
            Some(Side::Home)
        } else if self.away.id == player_id {
            Some(Side::Away)
        } else {
            None
        }
    }

    pub fn winner(&self) -> Option<Side> {
        match self.winner_code {
            Some(1) => Some(Side::Home),
            Some(2) => Some(Side::Away),
            _ => None,
        }
    }

    pub fn opponent_of(&self, side: Side) -> &PlayerRef {
        match side {
            Side::Home => &self.away,
            Side::Away => &self.home,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Home,
    Away,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub ranking_class: String,
    pub ranking: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct YearlyStatRecord {
    pub year: i32,
    pub ground_type: GroundType,
    pub totals: HashMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlayerSnapshot {
    pub player_id: u64,
    pub rankings: Vec<RankingEntry>,
    /// Newest first, one entry per event id.
    pub matches: Vec<MatchEvent>,
    pub yearly_stats: Vec<YearlyStatRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Votes {
    pub vote1: f64,
    pub vote2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsChoice {
    pub name: String,
    pub fractional_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsMarket {
    pub market_name: String,
    pub is_live: bool,
    pub choices: Vec<OddsChoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OddsBoard {
    pub markets: Vec<OddsMarket>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct H2hRecord {
    pub home_wins: u32,
    pub away_wins: u32,
    pub draws: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MatchContext {
    pub votes: Option<Votes>,
    pub odds: Option<OddsBoard>,
    pub h2h: Option<H2hRecord>,
}

/// Player identifiers resolved for an event id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInfo {
    pub event_id: u64,
    pub home_id: u64,
    pub away_id: u64,
    pub home_name: String,
    pub away_name: String,
    pub ground_type: GroundType,
    pub start_timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreMatchBundle {
    pub event: EventInfo,
    pub home: PlayerSnapshot,
    pub away: PlayerSnapshot,
    pub context: MatchContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Odds,
    Ranking,
    GeneralForm,
    #[serde(rename = "last10_form")]
    Last10Form,
    SurfaceForm,
    H2h,
    Sentiment,
    OpponentQuality,
    TiebreakPsychology,
    ServeDominance,
    ClutchPoints,
    AttackRating,
}

impl Metric {
    pub const ALL: [Metric; 12] = [
        Metric::Odds,
        Metric::Ranking,
        Metric::GeneralForm,
        Metric::Last10Form,
        Metric::SurfaceForm,
        Metric::H2h,
        Metric::Sentiment,
        Metric::OpponentQuality,
        Metric::TiebreakPsychology,
        Metric::ServeDominance,
        Metric::ClutchPoints,
        Metric::AttackRating,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Metric::Odds => "odds",
            Metric::Ranking => "ranking",
            Metric::GeneralForm => "general_form",
            Metric::Last10Form => "last10_form",
            Metric::SurfaceForm => "surface_form",
            Metric::H2h => "h2h",
            Metric::Sentiment => "sentiment",
            Metric::OpponentQuality => "opponent_quality",
            Metric::TiebreakPsychology => "tiebreak_psychology",
            Metric::ServeDominance => "serve_dominance",
            Metric::ClutchPoints => "clutch_points",
            Metric::AttackRating => "attack_rating",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    pub home: f64,
    pub away: f64,
}

impl MetricScore {
    pub const NEUTRAL: MetricScore = MetricScore {
        home: 0.5,
        away: 0.5,
    };
}

pub type MetricScoreSet = BTreeMap<Metric, MetricScore>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub event_id: u64,
    pub home_player_name: String,
    pub away_player_name: String,
    pub home_win_prob: f64,
    pub away_win_prob: f64,
    pub scores: MetricScoreSet,
    pub weights: BTreeMap<Metric, f64>,
}

// Upstream wire shapes. Everything is optional: the provider omits fields freely.

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawTeam {
    id: Option<u64>,
    name: Option<String>,
    ranking: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawStatus {
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawScore {
    #[serde(rename = "period1TieBreak")]
    period1: Option<u32>,
    #[serde(rename = "period2TieBreak")]
    period2: Option<u32>,
    #[serde(rename = "period3TieBreak")]
    period3: Option<u32>,
    #[serde(rename = "period4TieBreak")]
    period4: Option<u32>,
    #[serde(rename = "period5TieBreak")]
    period5: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: u64,
    #[serde(rename = "startTimestamp", default)]
    start_timestamp: Option<i64>,
    #[serde(rename = "groundType", default)]
    ground_type: Option<String>,
    #[serde(default)]
    status: RawStatus,
    #[serde(rename = "homeTeam", default)]
    home_team: RawTeam,
    #[serde(rename = "awayTeam", default)]
    away_team: RawTeam,
    #[serde(rename = "winnerCode", default)]
    winner_code: Option<u8>,
    #[serde(rename = "homeScore", default)]
    home_score: RawScore,
    #[serde(rename = "awayScore", default)]
    away_score: RawScore,
}

impl From<RawTeam> for PlayerRef {
    fn from(raw: RawTeam) -> Self {
        PlayerRef {
            id: raw.id.unwrap_or_default(),
            name: raw.name.unwrap_or_default(),
            ranking: raw.ranking,
        }
    }
}

impl From<RawScore> for Score {
    fn from(raw: RawScore) -> Self {
        Score {
            tiebreaks: [raw.period1, raw.period2, raw.period3, raw.period4, raw.period5],
        }
    }
}

impl From<RawEvent> for MatchEvent {
    fn from(raw: RawEvent) -> Self {
        MatchEvent {
            id: raw.id,
            start_timestamp: raw.start_timestamp.unwrap_or_default(),
            ground_type: GroundType::from_opt(raw.ground_type.as_deref()),
            status: raw
                .status
                .kind
                .as_deref()
                .map(EventStatus::parse)
                .unwrap_or_default(),
            home: raw.home_team.into(),
            away: raw.away_team.into(),
            winner_code: raw.winner_code,
            home_score: raw.home_score.into(),
            away_score: raw.away_score.into(),
        }
    }
}

/// Reads `root.events`, skipping entries that are not event-shaped.
pub fn parse_events(root: &Value) -> Vec<MatchEvent> {
    let Some(items) = root.get("events").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| RawEvent::deserialize(item).ok())
        .map(MatchEvent::from)
        .collect()
}

pub fn parse_rankings(root: &Value) -> Option<Vec<RankingEntry>> {
    if root.get("error").is_some() {
        return None;
    }
    let items = root.get("rankings")?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|item| {
                let ranking_class = item.get("rankingClass")?.as_str()?.to_string();
                let ranking = item
                    .get("ranking")
                    .and_then(Value::as_u64)
                    .and_then(|r| u32::try_from(r).ok());
                Some(RankingEntry {
                    ranking_class,
                    ranking,
                })
            })
            .collect(),
    )
}

/// Numeric fields of each `statistics` row become the record's totals.
pub fn parse_year_statistics(root: &Value, year: i32) -> Option<Vec<YearlyStatRecord>> {
    let items = root.get("statistics")?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(Value::as_object)
            .map(|row| {
                let ground_type =
                    GroundType::from_opt(row.get("groundType").and_then(Value::as_str));
                let totals = row
                    .iter()
                    .filter_map(|(key, value)| value.as_f64().map(|v| (key.clone(), v)))
                    .collect();
                YearlyStatRecord {
                    year,
                    ground_type,
                    totals,
                }
            })
            .collect(),
    )
}

pub fn parse_votes(root: &Value) -> Option<Votes> {
    let vote = root.get("vote")?;
    Some(Votes {
        vote1: vote.get("vote1").and_then(Value::as_f64).unwrap_or(0.0),
        vote2: vote.get("vote2").and_then(Value::as_f64).unwrap_or(0.0),
    })
}

pub fn parse_odds_board(root: &Value) -> Option<OddsBoard> {
    let markets = root.get("markets")?.as_array()?;
    let markets = markets
        .iter()
        .filter_map(|market| {
            let market_name = market.get("marketName")?.as_str()?.to_string();
            let is_live = market
                .get("isLive")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let choices = market
                .get("choices")
                .and_then(Value::as_array)
                .map(|choices| {
                    choices
                        .iter()
                        .filter_map(|choice| {
                            Some(OddsChoice {
                                name: choice.get("name")?.as_str()?.to_string(),
                                fractional_value: choice
                                    .get("fractionalValue")
                                    .and_then(Value::as_str)
                                    .map(str::to_string),
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();
            Some(OddsMarket {
                market_name,
                is_live,
                choices,
            })
        })
        .collect();
    Some(OddsBoard { markets })
}

pub fn parse_h2h(root: &Value) -> Option<H2hRecord> {
    let duel = root.get("teamDuel")?;
    let count = |key: &str| {
        duel.get(key)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0)
    };
    Some(H2hRecord {
        home_wins: count("homeWins"),
        away_wins: count("awayWins"),
        draws: count("draws"),
    })
}
