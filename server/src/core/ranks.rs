// island_realm/server/src/core/ranks.rs
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Permission level a player holds on one island. Higher is stronger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rank(pub i32);

pub const BANNED_RANK: Rank = Rank(-1);
pub const VISITOR_RANK: Rank = Rank(0);
pub const COOP_RANK: Rank = Rank(200);
pub const TRUSTED_RANK: Rank = Rank(400);
pub const MEMBER_RANK: Rank = Rank(500);
pub const SUB_OWNER_RANK: Rank = Rank(900);
pub const OWNER_RANK: Rank = Rank(1000);

/// Rank given to anyone without a record on the island.
pub const DEFAULT_RANK: Rank = VISITOR_RANK;

const NAMED_RANKS: [(Rank, &str); 7] = [
    (BANNED_RANK, "banned"),
    (VISITOR_RANK, "visitor"),
    (COOP_RANK, "coop"),
    (TRUSTED_RANK, "trusted"),
    (MEMBER_RANK, "member"),
    (SUB_OWNER_RANK, "sub-owner"),
    (OWNER_RANK, "owner"),
];

pub fn compare(a: Rank, b: Rank) -> Ordering {
    a.cmp(&b)
}

/// Name of the highest threshold at or below `rank`.
pub fn rank_name(rank: Rank) -> &'static str {
    NAMED_RANKS
        .iter()
        .rev()
        .find(|(threshold, _)| rank >= *threshold)
        .map(|(_, name)| *name)
        .unwrap_or("banned")
}

pub fn parse_rank_name(name: &str) -> Option<Rank> {
    NAMED_RANKS.iter().find(|(_, n)| *n == name).map(|(r, _)| *r)
}

impl Rank {
    pub fn is_team_member(self) -> bool {
        self >= MEMBER_RANK
    }

    /// Next named rank above this one, capped below owner.
    pub fn promoted(self) -> Option<Rank> {
        NAMED_RANKS
            .iter()
            .map(|(r, _)| *r)
            .find(|r| *r > self && *r < OWNER_RANK && *r > VISITOR_RANK)
    }

    /// Next named rank below this one, never below coop.
    pub fn demoted(self) -> Option<Rank> {
        NAMED_RANKS
            .iter()
            .rev()
            .map(|(r, _)| *r)
            .find(|r| *r < self && *r >= COOP_RANK)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", rank_name(*self), self.0)
    }
}
