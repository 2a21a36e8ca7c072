// island_realm/server/src/systems/team.rs
use crate::core::config::ServerConfig;
use crate::core::error::RegistryError;
use crate::core::ranks::{
    rank_name, Rank, BANNED_RANK, COOP_RANK, MEMBER_RANK, OWNER_RANK, SUB_OWNER_RANK, TRUSTED_RANK,
    VISITOR_RANK,
};
use crate::core::types::PlayerID;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Membership/rank commands that target another player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TeamOperation {
    Kick,
    Coop,
    Uncoop,
    Trust,
    Untrust,
    Ban,
    Unban,
    Promote,
    Demote,
    SetOwner,
}

impl TeamOperation {
    pub const ALL: [TeamOperation; 10] = [
        TeamOperation::Kick,
        TeamOperation::Coop,
        TeamOperation::Uncoop,
        TeamOperation::Trust,
        TeamOperation::Untrust,
        TeamOperation::Ban,
        TeamOperation::Unban,
        TeamOperation::Promote,
        TeamOperation::Demote,
        TeamOperation::SetOwner,
    ];

    pub fn default_min_rank(self) -> Rank {
        match self {
            TeamOperation::Kick | TeamOperation::SetOwner => OWNER_RANK,
            _ => SUB_OWNER_RANK,
        }
    }

    /// Operations that take rank away from the target.
    pub fn is_removal(self) -> bool {
        matches!(
            self,
            TeamOperation::Kick
                | TeamOperation::Uncoop
                | TeamOperation::Untrust
                | TeamOperation::Ban
                | TeamOperation::Demote
        )
    }
}

impl fmt::Display for TeamOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TeamOperation::Kick => "kick",
            TeamOperation::Coop => "coop",
            TeamOperation::Uncoop => "uncoop",
            TeamOperation::Trust => "trust",
            TeamOperation::Untrust => "untrust",
            TeamOperation::Ban => "ban",
            TeamOperation::Unban => "unban",
            TeamOperation::Promote => "promote",
            TeamOperation::Demote => "demote",
            TeamOperation::SetOwner => "set-owner",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorMode {
    /// Issued by a player on their own island.
    Member,
    /// Admin command: skips the rank threshold only.
    Admin,
    /// Admin command flagged as an override: skips owner and self-target protection too.
    AdminOverride,
}

impl ActorMode {
    pub fn is_admin(self) -> bool {
        !matches!(self, ActorMode::Member)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TeamAction {
    pub actor: PlayerID,
    pub actor_rank: Rank,
    pub target: PlayerID,
    pub target_rank: Rank,
    pub operation: TeamOperation,
    pub mode: ActorMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    NoIsland,
    NotInTeam,
    SelfTarget,
    InsufficientRank { required: Rank, actual: Rank },
    TargetIsOwner,
    TargetOutranksActor,
    TargetRankMismatch { expected: Rank },
    AlreadyHasRank,
    AtRankLimit,
    Vetoed,
    Cooldown { remaining: Duration },
    Rejected(RegistryError),
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::NoIsland => f.write_str("no-island"),
            DenialReason::NotInTeam => f.write_str("not-in-team"),
            DenialReason::SelfTarget => f.write_str("cannot-target-yourself"),
            DenialReason::InsufficientRank { required, actual } => {
                write!(f, "no-permission (requires {}, has {})", rank_name(*required), rank_name(*actual))
            }
            DenialReason::TargetIsOwner => f.write_str("cannot-target-owner"),
            DenialReason::TargetOutranksActor => f.write_str("target-rank-too-high"),
            DenialReason::TargetRankMismatch { expected } => {
                write!(f, "target-is-not-{}", rank_name(*expected))
            }
            DenialReason::AlreadyHasRank => f.write_str("already-has-rank"),
            DenialReason::AtRankLimit => f.write_str("rank-limit-reached"),
            DenialReason::Vetoed => f.write_str("cancelled"),
            DenialReason::Cooldown { remaining } => write!(f, "cooldown ({}s)", remaining.as_secs()),
            DenialReason::Rejected(e) => write!(f, "rejected: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Allowed,
    Denied(DenialReason),
}

impl Authorization {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Authorization::Allowed)
    }
}

/// Rank-based authorization for team commands. Holds the per-operation thresholds.
#[derive(Debug, Clone)]
pub struct TeamValidator {
    min_ranks: HashMap<TeamOperation, Rank>,
}

impl Default for TeamValidator {
    fn default() -> Self {
        TeamValidator {
            min_ranks: TeamOperation::ALL.iter().map(|op| (*op, op.default_min_rank())).collect(),
        }
    }
}

impl TeamValidator {
    pub fn from_config(config: &ServerConfig) -> Self {
        TeamValidator {
            min_ranks: TeamOperation::ALL.iter().map(|op| (*op, config.rank_command(*op))).collect(),
        }
    }

    pub fn min_rank(&self, operation: TeamOperation) -> Rank {
        self.min_ranks
            .get(&operation)
            .copied()
            .unwrap_or_else(|| operation.default_min_rank())
    }

    pub fn can_perform(&self, action: &TeamAction) -> Authorization {
        match self.check(action) {
            Ok(()) => Authorization::Allowed,
            Err(reason) => Authorization::Denied(reason),
        }
    }

    fn check(&self, action: &TeamAction) -> Result<(), DenialReason> {
        let override_protection = action.mode == ActorMode::AdminOverride;

        if action.actor == action.target && !override_protection {
            return Err(DenialReason::SelfTarget);
        }

        if action.mode == ActorMode::Member {
            let required = self.min_rank(action.operation);
            if action.actor_rank < required {
                return Err(DenialReason::InsufficientRank { required, actual: action.actor_rank });
            }
        }

        if action.target_rank >= OWNER_RANK && !override_protection {
            return Err(DenialReason::TargetIsOwner);
        }

        if action.mode == ActorMode::Member
            && action.operation.is_removal()
            && action.target_rank >= action.actor_rank
        {
            return Err(DenialReason::TargetOutranksActor);
        }

        check_target_rank(action)
    }
}

fn check_target_rank(action: &TeamAction) -> Result<(), DenialReason> {
    let target = action.target_rank;
    match action.operation {
        TeamOperation::Kick | TeamOperation::SetOwner => {
            if !target.is_team_member() {
                return Err(DenialReason::NotInTeam);
            }
        }
        TeamOperation::Coop => grant_below(target, COOP_RANK)?,
        TeamOperation::Trust => grant_below(target, TRUSTED_RANK)?,
        TeamOperation::Uncoop => exactly(target, COOP_RANK)?,
        TeamOperation::Untrust => exactly(target, TRUSTED_RANK)?,
        TeamOperation::Unban => exactly(target, BANNED_RANK)?,
        TeamOperation::Ban => {
            if target == BANNED_RANK {
                return Err(DenialReason::AlreadyHasRank);
            }
        }
        TeamOperation::Promote => {
            if !target.is_team_member() {
                return Err(DenialReason::NotInTeam);
            }
            match target.promoted() {
                None => return Err(DenialReason::AtRankLimit),
                Some(next) if action.mode == ActorMode::Member && next > action.actor_rank => {
                    return Err(DenialReason::TargetOutranksActor)
                }
                Some(_) => {}
            }
        }
        TeamOperation::Demote => {
            if !target.is_team_member() {
                return Err(DenialReason::NotInTeam);
            }
            match target.demoted() {
                Some(prev) if prev.is_team_member() => {}
                _ => return Err(DenialReason::AtRankLimit),
            }
        }
    }
    Ok(())
}

fn grant_below(target: Rank, granted: Rank) -> Result<(), DenialReason> {
    if target == BANNED_RANK {
        return Err(DenialReason::TargetRankMismatch { expected: VISITOR_RANK });
    }
    if target >= granted || target >= MEMBER_RANK {
        return Err(DenialReason::AlreadyHasRank);
    }
    Ok(())
}

fn exactly(target: Rank, expected: Rank) -> Result<(), DenialReason> {
    if target != expected {
        return Err(DenialReason::TargetRankMismatch { expected });
    }
    Ok(())
}
