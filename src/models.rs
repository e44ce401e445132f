use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A tracked Buckler profile, row in `target_users`.
#[derive(Serialize, Deserialize, sqlx::FromRow, Debug, Clone)]
pub struct Subject {
    pub user_code: String,
    pub player_name: String,
    pub note: String,
    pub is_active: bool,
}

impl Subject {
    /// Placeholder subject for manual runs against a code that is not in the
    /// registry yet.
    pub fn unregistered(user_code: &str) -> Self {
        Self {
            user_code: user_code.to_string(),
            player_name: String::new(),
            note: String::new(),
            is_active: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlType {
    Classic,
    Modern,
}

impl ControlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlType::Classic => "Classic",
            ControlType::Modern => "Modern",
        }
    }
}

/// One side of a match as rendered in the battle log.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PlayerSide {
    pub name: String,
    pub character: String,
    pub rank_points: i32,
    pub control: ControlType,
    pub result: String,
}

/// One completed match, row in `battle_results`.
///
/// `battle_id` is derived from the timestamp plus both display names; the
/// site exposes no stable match identifier. Collisions are possible when two
/// matches share a timestamp and both names, and are accepted (first write
/// wins downstream).
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MatchRecord {
    pub battle_id: String,
    pub played_at: NaiveDateTime,
    pub mode: String,
    pub p1: PlayerSide,
    pub p2: PlayerSide,
}

/// Aggregate play-style statistics parsed from the achievements tab.
/// Percentages for drive gauge / super art usage, counters for the rest.
/// Missing labels stay at zero.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct PerformanceStats {
    pub d_parry_pct: f64,
    pub d_impact_pct: f64,
    pub d_od_pct: f64,
    pub d_rush_p_pct: f64,
    pub d_rush_c_pct: f64,
    pub d_reversal_pct: f64,
    pub sa1_pct: f64,
    pub sa2_pct: f64,
    pub sa3_pct: f64,
    pub ca_pct: f64,
    pub impact_win: f64,
    pub impact_pc_win: f64,
    pub impact_counter_win: f64,
    pub impact_lose: f64,
    pub impact_pc_lose: f64,
    pub impact_counter_lose: f64,
    pub just_parry_count: f64,
    pub throw_win: f64,
    pub throw_lose: f64,
    pub throw_escape: f64,
    pub stun_win: f64,
    pub stun_lose: f64,
    pub wall_push_sec: f64,
    pub wall_pushed_sec: f64,
}

/// One subject's statistics for one calendar day, row in `player_stats`.
/// Unique per (user_code, recorded_at); a later scrape on the same day
/// overwrites the earlier one.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PerformanceSnapshot {
    pub user_code: String,
    pub player_name: String,
    pub recorded_at: NaiveDate,
    pub stats: PerformanceStats,
}
