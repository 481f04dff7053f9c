use std::collections::{BTreeMap, HashMap};

use crate::model::{
    GroundType, MatchContext, MatchEvent, Metric, MetricScore, MetricScoreSet, PreMatchBundle,
    PredictionResult, RankingEntry, Side, YearlyStatRecord,
};

const LAST_N_MATCHES: usize = 10;
const MAX_SETS: usize = 5;
const DEFAULT_DECIMAL_ODDS: f64 = 2.0;
const OPPONENT_QUALITY_SCALE: f64 = 1000.0;
const FULL_TIME_MARKET: &str = "Full time";

const DEFAULT_WEIGHTS: &[(Metric, f64)] = &[
    (Metric::Odds, 0.25),
    (Metric::Ranking, 0.10),
    (Metric::GeneralForm, 0.05),
    (Metric::Last10Form, 0.05),
    (Metric::H2h, 0.075),
    (Metric::Sentiment, 0.05),
    (Metric::SurfaceForm, 0.075),
    (Metric::OpponentQuality, 0.10),
    (Metric::TiebreakPsychology, 0.05),
    (Metric::ServeDominance, 0.10),
    (Metric::ClutchPoints, 0.075),
    (Metric::AttackRating, 0.075),
];

/// Twelve metric weights, always normalized to sum to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Weights {
    values: BTreeMap<Metric, f64>,
}

impl Weights {
    pub fn default_raw() -> BTreeMap<Metric, f64> {
        DEFAULT_WEIGHTS.iter().copied().collect()
    }

    /// Missing, negative and non-finite weights count as zero. An all-zero
    /// vector falls back to equal weights.
    pub fn from_raw(raw: &BTreeMap<Metric, f64>) -> Self {
        let cleaned: BTreeMap<Metric, f64> = Metric::ALL
            .iter()
            .map(|m| {
                let w = raw.get(m).copied().unwrap_or(0.0);
                (*m, if w.is_finite() && w > 0.0 { w } else { 0.0 })
            })
            .collect();
        let total: f64 = cleaned.values().sum();
        if total <= 0.0 {
            return Self::equal();
        }
        Self {
            values: cleaned.into_iter().map(|(m, w)| (m, w / total)).collect(),
        }
    }

    pub fn equal() -> Self {
        let w = 1.0 / Metric::ALL.len() as f64;
        Self {
            values: Metric::ALL.iter().map(|m| (*m, w)).collect(),
        }
    }

    pub fn get(&self, metric: Metric) -> f64 {
        self.values.get(&metric).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.values.values().sum()
    }

    pub fn as_map(&self) -> &BTreeMap<Metric, f64> {
        &self.values
    }
}

impl Default for Weights {
    fn default() -> Self {
        Self::from_raw(&Self::default_raw())
    }
}

/// Splits two raw values into shares of their sum. Negative or non-finite
/// inputs count as zero; a zero sum is a coin flip.
pub fn normalize(home: f64, away: f64) -> MetricScore {
    let h = if home.is_finite() { home.max(0.0) } else { 0.0 };
    let a = if away.is_finite() { away.max(0.0) } else { 0.0 };
    let total = h + a;
    if total <= 0.0 || !total.is_finite() {
        return MetricScore::NEUTRAL;
    }
    let home = h / total;
    MetricScore {
        home,
        away: 1.0 - home,
    }
}

/// "3/2" -> 2.5. Plain decimals pass through; malformed fractions price at evens.
pub fn fractional_to_decimal(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return Some(DEFAULT_DECIMAL_ODDS);
    }
    let Some((num, den)) = s.split_once('/') else {
        return s.parse::<f64>().ok().filter(|v| v.is_finite() && *v > 0.0);
    };
    let (Ok(num), Ok(den)) = (num.trim().parse::<i64>(), den.trim().parse::<i64>()) else {
        return Some(DEFAULT_DECIMAL_ODDS);
    };
    if den == 0 {
        return Some(DEFAULT_DECIMAL_ODDS);
    }
    Some(1.0 + num as f64 / den as f64)
}

pub fn metric_scores(bundle: &PreMatchBundle) -> MetricScoreSet {
    let home_id = bundle.event.home_id;
    let away_id = bundle.event.away_id;
    let surface = bundle.event.ground_type;

    let home_matches = &bundle.home.matches;
    let away_matches = &bundle.away.matches;
    let home_all = FormStats::collect(home_matches, home_id, surface, None);
    let away_all = FormStats::collect(away_matches, away_id, surface, None);
    let home_last = FormStats::collect(home_matches, home_id, surface, Some(LAST_N_MATCHES));
    let away_last = FormStats::collect(away_matches, away_id, surface, Some(LAST_N_MATCHES));

    let home_yearly = aggregate_for_surface(&bundle.home.yearly_stats, surface);
    let away_yearly = aggregate_for_surface(&bundle.away.yearly_stats, surface);

    let mut scores = MetricScoreSet::new();
    scores.insert(Metric::Odds, odds_score(&bundle.context));
    scores.insert(
        Metric::Ranking,
        normalize(
            ranking_value(&bundle.home.rankings),
            ranking_value(&bundle.away.rankings),
        ),
    );
    scores.insert(
        Metric::GeneralForm,
        normalize(home_all.win_rate(), away_all.win_rate()),
    );
    scores.insert(
        Metric::Last10Form,
        normalize(home_last.win_rate(), away_last.win_rate()),
    );
    scores.insert(
        Metric::SurfaceForm,
        normalize(home_all.surface_rate(), away_all.surface_rate()),
    );
    scores.insert(
        Metric::H2h,
        h2h_score(home_matches, home_id, away_id, surface),
    );
    scores.insert(Metric::Sentiment, sentiment_score(&bundle.context));
    scores.insert(
        Metric::OpponentQuality,
        normalize(home_all.opponent_quality(), away_all.opponent_quality()),
    );
    scores.insert(
        Metric::TiebreakPsychology,
        normalize(home_all.tiebreak_rate(), away_all.tiebreak_rate()),
    );
    scores.insert(
        Metric::ServeDominance,
        normalize(serve_power(&home_yearly), serve_power(&away_yearly)),
    );
    scores.insert(
        Metric::ClutchPoints,
        normalize(clutch_value(&home_yearly), clutch_value(&away_yearly)),
    );
    scores.insert(
        Metric::AttackRating,
        normalize(attack_value(&home_yearly), attack_value(&away_yearly)),
    );
    scores
}

/// Weighted sum of both sides' metric shares, turned into a win probability.
pub fn win_probability(scores: &MetricScoreSet, weights: &Weights) -> (f64, f64) {
    let mut home_tgs = 0.0;
    let mut away_tgs = 0.0;
    for metric in Metric::ALL {
        let score = scores.get(&metric).copied().unwrap_or(MetricScore::NEUTRAL);
        let w = weights.get(metric);
        home_tgs += w * score.home;
        away_tgs += w * score.away;
    }
    let total = home_tgs + away_tgs;
    if total <= 0.0 || !total.is_finite() {
        return (0.5, 0.5);
    }
    let home = home_tgs / total;
    (home, 1.0 - home)
}

pub fn predict(bundle: &PreMatchBundle, weights: &Weights) -> PredictionResult {
    let scores = metric_scores(bundle);
    let (home_win_prob, away_win_prob) = win_probability(&scores, weights);
    PredictionResult {
        event_id: bundle.event.event_id,
        home_player_name: bundle.event.home_name.clone(),
        away_player_name: bundle.event.away_name.clone(),
        home_win_prob,
        away_win_prob,
        scores,
        weights: weights.as_map().clone(),
    }
}

fn odds_score(context: &MatchContext) -> MetricScore {
    let Some(board) = context.odds.as_ref() else {
        return MetricScore::NEUTRAL;
    };
    let Some(market) = board
        .markets
        .iter()
        .find(|m| !m.is_live && m.market_name == FULL_TIME_MARKET)
    else {
        return MetricScore::NEUTRAL;
    };
    let price = |name: &str| {
        let choice = market.choices.iter().find(|c| c.name == name)?;
        let decimal = match choice.fractional_value.as_deref() {
            Some(raw) => fractional_to_decimal(raw)?,
            None => DEFAULT_DECIMAL_ODDS,
        };
        (decimal > 0.0).then(|| 1.0 / decimal)
    };
    match (price("1"), price("2")) {
        (Some(home), Some(away)) => normalize(home, away),
        _ => MetricScore::NEUTRAL,
    }
}

/// Mean reciprocal of the official and UTR ranks that are present.
fn ranking_value(rankings: &[RankingEntry]) -> f64 {
    let rank_of = |class: &str| {
        rankings
            .iter()
            .find(|r| r.ranking_class == class)
            .and_then(|r| r.ranking)
    };
    let reciprocals: Vec<f64> = [rank_of("team"), rank_of("utr")]
        .into_iter()
        .flatten()
        .filter(|r| *r > 0)
        .map(|r| 1.0 / f64::from(r))
        .collect();
    if reciprocals.is_empty() {
        0.0
    } else {
        reciprocals.iter().sum::<f64>() / reciprocals.len() as f64
    }
}

fn sentiment_score(context: &MatchContext) -> MetricScore {
    match context.votes {
        Some(votes) => normalize(votes.vote1, votes.vote2),
        None => MetricScore::NEUTRAL,
    }
}

/// Meetings on this surface, read from the home player's own history.
fn h2h_score(
    home_matches: &[MatchEvent],
    home_id: u64,
    away_id: u64,
    surface: GroundType,
) -> MetricScore {
    let mut home_wins = 0u32;
    let mut away_wins = 0u32;
    for event in home_matches {
        let Some(side) = event.side_of(home_id) else {
            continue;
        };
        if event.opponent_of(side).id != away_id || event.ground_type != surface {
            continue;
        }
        match event.winner() {
            Some(winner) if winner == side => home_wins += 1,
            Some(_) => away_wins += 1,
            None => {}
        }
    }
    normalize(f64::from(home_wins), f64::from(away_wins))
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct FormStats {
    total: u32,
    wins: u32,
    surface_total: u32,
    surface_wins: u32,
    quality_score: f64,
    quality_wins: u32,
    tb_played: u32,
    tb_wins: u32,
}

impl FormStats {
    fn collect(
        matches: &[MatchEvent],
        player_id: u64,
        surface: GroundType,
        limit: Option<usize>,
    ) -> Self {
        let take = limit.unwrap_or(matches.len());
        let mut stats = FormStats::default();
        for event in matches.iter().take(take) {
            stats.total += 1;
            let side = event.side_of(player_id);
            let won = side.is_some() && event.winner() == side;
            if won {
                stats.wins += 1;
                if let Some(side) = side {
                    if let Some(rank) = event.opponent_of(side).ranking.filter(|r| *r > 0) {
                        stats.quality_score += OPPONENT_QUALITY_SCALE / f64::from(rank);
                        stats.quality_wins += 1;
                    }
                }
            }
            if event.ground_type == surface {
                stats.surface_total += 1;
                if won {
                    stats.surface_wins += 1;
                }
            }
            for set in 0..MAX_SETS {
                let (Some(home_tb), Some(away_tb)) = (
                    event.home_score.tiebreaks[set],
                    event.away_score.tiebreaks[set],
                ) else {
                    continue;
                };
                stats.tb_played += 1;
                let tb_won = match side {
                    Some(Side::Home) => home_tb > away_tb,
                    Some(Side::Away) => away_tb > home_tb,
                    None => false,
                };
                if tb_won {
                    stats.tb_wins += 1;
                }
            }
        }
        stats
    }

    fn win_rate(&self) -> f64 {
        rate(self.wins, self.total)
    }

    fn surface_rate(&self) -> f64 {
        rate(self.surface_wins, self.surface_total)
    }

    fn tiebreak_rate(&self) -> f64 {
        rate(self.tb_wins, self.tb_played)
    }

    fn opponent_quality(&self) -> f64 {
        if self.quality_wins == 0 {
            1.0
        } else {
            self.quality_score / f64::from(self.quality_wins)
        }
    }
}

fn rate(num: u32, den: u32) -> f64 {
    if den == 0 {
        0.5
    } else {
        f64::from(num) / f64::from(den)
    }
}

/// Sums yearly totals on `surface`; falls back to every record when none match.
pub fn aggregate_for_surface(
    records: &[YearlyStatRecord],
    surface: GroundType,
) -> HashMap<String, f64> {
    let on_surface: Vec<&YearlyStatRecord> =
        records.iter().filter(|r| r.ground_type == surface).collect();
    let selected: Vec<&YearlyStatRecord> = if on_surface.is_empty() {
        records.iter().collect()
    } else {
        on_surface
    };

    let mut aggregated: HashMap<String, f64> = HashMap::new();
    for record in selected {
        for (key, value) in &record.totals {
            *aggregated.entry(key.clone()).or_insert(0.0) += value;
        }
    }
    aggregated
}

fn stat(totals: &HashMap<String, f64>, key: &str) -> f64 {
    totals.get(key).copied().filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Falls back to 1 when the denominator is missing or zero.
fn stat_or_one(totals: &HashMap<String, f64>, key: &str) -> f64 {
    let v = stat(totals, key);
    if v == 0.0 { 1.0 } else { v }
}

fn serve_power(totals: &HashMap<String, f64>) -> f64 {
    stat(totals, "aces") * 1.5 + stat(totals, "firstServePointsScored")
        - stat(totals, "doubleFaults") * 2.0
}

fn clutch_value(totals: &HashMap<String, f64>) -> f64 {
    let won = stat(totals, "tiebreaksWon");
    let played = won + stat(totals, "tiebreakLosses");
    let tiebreak_ratio = if played > 0.0 { won / played } else { 0.5 };
    let bp_ratio = stat(totals, "breakPointsScored") / stat_or_one(totals, "breakPointsTotal");
    (tiebreak_ratio + bp_ratio) / 2.0
}

fn attack_value(totals: &HashMap<String, f64>) -> f64 {
    stat(totals, "winnersTotal") / stat(totals, "unforcedErrorsTotal").max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        EventInfo, EventStatus, OddsBoard, OddsChoice, OddsMarket, PlayerRef, PlayerSnapshot,
        Score, Votes,
    };

    const HOME: u64 = 100;
    const AWAY: u64 = 200;

    fn empty_bundle(surface: GroundType) -> PreMatchBundle {
        PreMatchBundle {
            event: EventInfo {
                event_id: 1,
                home_id: HOME,
                away_id: AWAY,
                home_name: "Home Player".to_string(),
                away_name: "Away Player".to_string(),
                ground_type: surface,
                start_timestamp: 0,
            },
            home: PlayerSnapshot {
                player_id: HOME,
                ..Default::default()
            },
            away: PlayerSnapshot {
                player_id: AWAY,
                ..Default::default()
            },
            context: MatchContext::default(),
        }
    }

    fn played(id: u64, home: u64, away: u64, winner: u8, surface: GroundType) -> MatchEvent {
        MatchEvent {
            id,
            start_timestamp: 1_000 - id as i64,
            ground_type: surface,
            status: EventStatus::Finished,
            home: PlayerRef {
                id: home,
                name: format!("P{home}"),
                ranking: Some(50),
            },
            away: PlayerRef {
                id: away,
                name: format!("P{away}"),
                ranking: Some(10),
            },
            winner_code: Some(winner),
            home_score: Score::default(),
            away_score: Score::default(),
        }
    }

    fn assert_pair_sums_to_one(scores: &MetricScoreSet) {
        assert_eq!(scores.len(), 12);
        for (metric, score) in scores {
            assert!(
                (score.home + score.away - 1.0).abs() < 1e-12,
                "{metric} does not sum to 1: {score:?}"
            );
            assert!((0.0..=1.0).contains(&score.home), "{metric} out of range");
        }
    }

    #[test]
    fn normalize_handles_zero_and_negative() {
        assert_eq!(normalize(0.0, 0.0), MetricScore::NEUTRAL);
        assert_eq!(normalize(-3.0, -1.0), MetricScore::NEUTRAL);
        assert_eq!(normalize(f64::NAN, 2.0).home, 0.0);
        let s = normalize(-5.0, 4.0);
        assert_eq!(s.home, 0.0);
        assert_eq!(s.away, 1.0);
        let s = normalize(1.0, 3.0);
        assert!((s.home - 0.25).abs() < 1e-12);
    }

    #[test]
    fn fractional_odds_convert_to_decimal() {
        assert_eq!(fractional_to_decimal("3/2"), Some(2.5));
        assert_eq!(fractional_to_decimal("4/5"), Some(1.8));
        assert_eq!(fractional_to_decimal("1/0"), Some(2.0));
        assert_eq!(fractional_to_decimal("a/b"), Some(2.0));
        assert_eq!(fractional_to_decimal(""), Some(2.0));
        assert_eq!(fractional_to_decimal("1.91"), Some(1.91));
        assert_eq!(fractional_to_decimal("evens"), None);
    }

    #[test]
    fn empty_bundle_is_neutral_everywhere() {
        let bundle = empty_bundle(GroundType::Hard);
        let scores = metric_scores(&bundle);
        assert_pair_sums_to_one(&scores);
        for score in scores.values() {
            assert_eq!(*score, MetricScore::NEUTRAL);
        }
        let (h, a) = win_probability(&scores, &Weights::default());
        assert!((h - 0.5).abs() < 1e-12);
        assert!((a - 0.5).abs() < 1e-12);
    }

    #[test]
    fn live_market_is_ignored_for_odds() {
        let mut bundle = empty_bundle(GroundType::Clay);
        bundle.context.odds = Some(OddsBoard {
            markets: vec![OddsMarket {
                market_name: "Full time".to_string(),
                is_live: true,
                choices: vec![
                    OddsChoice {
                        name: "1".to_string(),
                        fractional_value: Some("1/4".to_string()),
                    },
                    OddsChoice {
                        name: "2".to_string(),
                        fractional_value: Some("3/1".to_string()),
                    },
                ],
            }],
        });
        assert_eq!(metric_scores(&bundle)[&Metric::Odds], MetricScore::NEUTRAL);
    }

    #[test]
    fn ranking_uses_mean_reciprocal_of_known_ranks() {
        let mut bundle = empty_bundle(GroundType::Hard);
        bundle.home.rankings = vec![
            RankingEntry {
                ranking_class: "team".to_string(),
                ranking: Some(2),
            },
            RankingEntry {
                ranking_class: "utr".to_string(),
                ranking: None,
            },
        ];
        bundle.away.rankings = vec![RankingEntry {
            ranking_class: "team".to_string(),
            ranking: Some(8),
        }];
        let score = metric_scores(&bundle)[&Metric::Ranking];
        // 1/2 vs 1/8
        assert!((score.home - 0.8).abs() < 1e-12);
    }

    #[test]
    fn forms_and_h2h_follow_history() {
        let mut bundle = empty_bundle(GroundType::Grass);
        bundle.home.matches = vec![
            played(1, HOME, AWAY, 1, GroundType::Grass),
            played(2, AWAY, HOME, 2, GroundType::Grass),
            played(3, HOME, AWAY, 2, GroundType::Clay),
            played(4, HOME, 999, 2, GroundType::Grass),
        ];
        bundle.away.matches = vec![
            played(5, AWAY, 999, 1, GroundType::Grass),
            played(6, AWAY, 998, 2, GroundType::Hard),
        ];
        let scores = metric_scores(&bundle);
        assert_pair_sums_to_one(&scores);

        // Two grass meetings, both won by home; the clay meeting is excluded.
        assert_eq!(scores[&Metric::H2h].home, 1.0);
        // 2/4 vs 1/2
        assert!((scores[&Metric::GeneralForm].home - 0.5).abs() < 1e-12);
        // grass: home 2/3, away 1/1
        let surface = scores[&Metric::SurfaceForm];
        assert!((surface.home - (2.0 / 3.0) / (2.0 / 3.0 + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn opponent_quality_defaults_to_one_without_ranked_wins() {
        let mut bundle = empty_bundle(GroundType::Hard);
        let mut win = played(1, HOME, 300, 1, GroundType::Hard);
        win.away.ranking = Some(500);
        bundle.home.matches = vec![win];
        // 1000/500 = 2 against the default of 1
        let score = metric_scores(&bundle)[&Metric::OpponentQuality];
        assert!((score.home - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn tiebreaks_scan_all_sets() {
        let mut bundle = empty_bundle(GroundType::Hard);
        let mut event = played(1, HOME, 300, 1, GroundType::Hard);
        event.home_score.tiebreaks = [Some(7), None, Some(4), None, None];
        event.away_score.tiebreaks = [Some(5), Some(7), Some(7), None, None];
        bundle.home.matches = vec![event];
        // Away side: lost sets 1 and 2, won set 5; set 3 lacks the home field.
        let mut away_event = played(2, 400, AWAY, 1, GroundType::Hard);
        away_event.home_score.tiebreaks = [Some(7), Some(7), None, None, Some(3)];
        away_event.away_score.tiebreaks = [Some(6), Some(5), Some(1), None, Some(7)];
        bundle.away.matches = vec![away_event];

        // Home won 1 of 2 (set 2 lacks the home field), away 1 of 3.
        let score = metric_scores(&bundle)[&Metric::TiebreakPsychology];
        let expected = 0.5 / (0.5 + 1.0 / 3.0);
        assert!((score.home - expected).abs() < 1e-12, "{score:?}");
    }

    #[test]
    fn yearly_stats_prefer_surface_records() {
        let record = |surface, aces: f64| YearlyStatRecord {
            year: 2024,
            ground_type: surface,
            totals: [("aces".to_string(), aces)].into_iter().collect(),
        };
        let records = vec![record(GroundType::Clay, 10.0), record(GroundType::Hard, 99.0)];
        let clay = aggregate_for_surface(&records, GroundType::Clay);
        assert_eq!(clay["aces"], 10.0);
        let grass = aggregate_for_surface(&records, GroundType::Grass);
        assert_eq!(grass["aces"], 109.0);
        assert!(aggregate_for_surface(&[], GroundType::Grass).is_empty());
    }

    #[test]
    fn derived_stat_formulas() {
        let totals: HashMap<String, f64> = [
            ("aces", 10.0),
            ("firstServePointsScored", 100.0),
            ("doubleFaults", 5.0),
            ("tiebreaksWon", 3.0),
            ("tiebreakLosses", 1.0),
            ("breakPointsScored", 4.0),
            ("breakPointsTotal", 0.0),
            ("winnersTotal", 30.0),
            ("unforcedErrorsTotal", 0.0),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        assert_eq!(serve_power(&totals), 105.0);
        // (0.75 + 4/1) / 2
        assert_eq!(clutch_value(&totals), 2.375);
        assert_eq!(attack_value(&totals), 30.0);
        assert_eq!(clutch_value(&HashMap::new()), 0.25);
    }

    #[test]
    fn negative_serve_power_stays_in_range() {
        let mut bundle = empty_bundle(GroundType::Hard);
        bundle.home.yearly_stats = vec![YearlyStatRecord {
            year: 2024,
            ground_type: GroundType::Hard,
            totals: [("doubleFaults".to_string(), 20.0)].into_iter().collect(),
        }];
        bundle.away.yearly_stats = vec![YearlyStatRecord {
            year: 2024,
            ground_type: GroundType::Hard,
            totals: [("aces".to_string(), 4.0)].into_iter().collect(),
        }];
        let scores = metric_scores(&bundle);
        assert_pair_sums_to_one(&scores);
        assert_eq!(scores[&Metric::ServeDominance].away, 1.0);
    }

    #[test]
    fn sentiment_uses_vote_share() {
        let mut bundle = empty_bundle(GroundType::Hard);
        bundle.context.votes = Some(Votes {
            vote1: 300.0,
            vote2: 100.0,
        });
        assert_eq!(metric_scores(&bundle)[&Metric::Sentiment].home, 0.75);
    }

    #[test]
    fn weights_normalize_and_fall_back() {
        let w = Weights::default();
        assert!((w.total() - 1.0).abs() < 1e-9);
        // The raw defaults sum to 1.05.
        assert!((w.get(Metric::Odds) - 0.25 / 1.05).abs() < 1e-12);

        let zero: BTreeMap<Metric, f64> = Metric::ALL.iter().map(|m| (*m, 0.0)).collect();
        assert_eq!(Weights::from_raw(&zero), Weights::equal());

        let mut skewed = BTreeMap::new();
        skewed.insert(Metric::Odds, 3.0);
        skewed.insert(Metric::Ranking, 1.0);
        skewed.insert(Metric::H2h, -4.0);
        let w = Weights::from_raw(&skewed);
        assert_eq!(w.get(Metric::Odds), 0.75);
        assert_eq!(w.get(Metric::H2h), 0.0);
        assert!((w.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_weights_give_coin_flip() {
        let scores = metric_scores(&empty_bundle(GroundType::Hard));
        let weights = Weights {
            values: BTreeMap::new(),
        };
        assert_eq!(win_probability(&scores, &weights), (0.5, 0.5));
    }
}
