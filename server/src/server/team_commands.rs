// island_realm/server/src/server/team_commands.rs
use crate::core::config::ServerConfig;
use crate::core::error::RegistryError;
use crate::core::ranks::{Rank, BANNED_RANK, COOP_RANK, MEMBER_RANK, OWNER_RANK, TRUSTED_RANK, VISITOR_RANK};
use crate::core::types::{IslandId, PlayerID};
use crate::server::events::{Actor, TeamReason};
use crate::server::islands::IslandsManager;
use crate::systems::team::{
    ActorMode, Authorization, DenialReason, TeamAction, TeamOperation, TeamValidator,
};
use ahash::AHashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeamCommandOutcome {
    Done {
        island: IslandId,
        target: PlayerID,
        old_rank: Rank,
        new_rank: Rank,
    },
    Denied(DenialReason),
    /// The target owns the island; the requester is shown its members instead.
    OwnerProtected { members: Vec<(PlayerID, Rank)> },
}

impl TeamCommandOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, TeamCommandOutcome::Done { .. })
    }
}

/// Team commands: validation, invite cooldowns, then the registry mutation.
#[derive(Debug)]
pub struct TeamCommands {
    validator: TeamValidator,
    invite_cooldown: Duration,
    cooldowns: AHashMap<(IslandId, PlayerID), Instant>,
}

impl TeamCommands {
    pub fn new(validator: TeamValidator, invite_cooldown: Duration) -> Self {
        TeamCommands {
            validator,
            invite_cooldown,
            cooldowns: AHashMap::new(),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(TeamValidator::from_config(config), config.invite_cooldown())
    }

    pub fn validator(&self) -> &TeamValidator {
        &self.validator
    }

    /// A player acting on their own team island.
    pub fn execute(
        &mut self,
        registry: &mut IslandsManager,
        pair: &str,
        actor: PlayerID,
        target: PlayerID,
        operation: TeamOperation,
    ) -> TeamCommandOutcome {
        let Some(island) = registry.get_island(pair, &actor).map(|i| i.id) else {
            return TeamCommandOutcome::Denied(DenialReason::NoIsland);
        };
        self.run(registry, island, actor, target, operation, ActorMode::Member)
    }

    /// Admin kick: acts on the target's own team island.
    pub fn admin_kick(
        &mut self,
        registry: &mut IslandsManager,
        pair: &str,
        admin: PlayerID,
        target: PlayerID,
    ) -> TeamCommandOutcome {
        // A solo owner has no team to be kicked from.
        if !registry.in_team(pair, &target) {
            return TeamCommandOutcome::Denied(DenialReason::NotInTeam);
        }
        let Some(island) = registry.get_island(pair, &target).map(|i| i.id) else {
            return TeamCommandOutcome::Denied(DenialReason::NotInTeam);
        };
        self.run(registry, island, admin, target, TeamOperation::Kick, ActorMode::Admin)
    }

    /// Admin command against an explicit island.
    pub fn admin_execute(
        &mut self,
        registry: &mut IslandsManager,
        island: IslandId,
        admin: PlayerID,
        target: PlayerID,
        operation: TeamOperation,
        override_protection: bool,
    ) -> TeamCommandOutcome {
        let mode = if override_protection { ActorMode::AdminOverride } else { ActorMode::Admin };
        self.run(registry, island, admin, target, operation, mode)
    }

    /// Players a command could sensibly target, for tab completion.
    pub fn candidates(
        &self,
        registry: &IslandsManager,
        pair: &str,
        actor: &PlayerID,
        operation: TeamOperation,
    ) -> Vec<PlayerID> {
        let Some(island) = registry.get_island(pair, actor) else {
            return Vec::new();
        };
        match operation {
            TeamOperation::Uncoop => island.members_with_rank(COOP_RANK),
            TeamOperation::Untrust => island.members_with_rank(TRUSTED_RANK),
            TeamOperation::Unban => island.banned().iter().copied().collect(),
            TeamOperation::Kick | TeamOperation::Promote | TeamOperation::Demote | TeamOperation::SetOwner => island
                .member_set(MEMBER_RANK)
                .into_iter()
                .filter(|p| p != actor)
                .collect(),
            TeamOperation::Coop | TeamOperation::Trust | TeamOperation::Ban => Vec::new(),
        }
    }

    fn cooldown_remaining(&self, island: IslandId, target: PlayerID, now: Instant) -> Option<Duration> {
        let started = self.cooldowns.get(&(island, target))?;
        let elapsed = now.saturating_duration_since(*started);
        (elapsed < self.invite_cooldown).then(|| self.invite_cooldown - elapsed)
    }

    /// Forgets cooldowns that have run out.
    pub fn prune_cooldowns(&mut self, now: Instant) {
        let cooldown = self.invite_cooldown;
        self.cooldowns.retain(|_, started| now.saturating_duration_since(*started) < cooldown);
    }

    fn run(
        &mut self,
        registry: &mut IslandsManager,
        island_id: IslandId,
        actor: PlayerID,
        target: PlayerID,
        operation: TeamOperation,
        mode: ActorMode,
    ) -> TeamCommandOutcome {
        let Some(island) = registry.get_island_by_id(&island_id) else {
            return TeamCommandOutcome::Denied(DenialReason::NoIsland);
        };
        let pair = island.pair.clone();
        let action = TeamAction {
            actor,
            actor_rank: island.rank_of(&actor),
            target,
            target_rank: island.rank_of(&target),
            operation,
            mode,
        };

        match self.validator.can_perform(&action) {
            Authorization::Allowed => {}
            Authorization::Denied(DenialReason::TargetIsOwner) => {
                let mut members: Vec<(PlayerID, Rank)> = island.members().map(|(p, r)| (*p, *r)).collect();
                members.sort_by(|a, b| b.1.cmp(&a.1));
                debug!("[Island {}] {} by {} refused: target owns the island", island_id, operation, actor);
                return TeamCommandOutcome::OwnerProtected { members };
            }
            Authorization::Denied(reason) => {
                debug!("[Island {}] {} by {} on {} denied: {}", island_id, operation, actor, target, reason);
                return TeamCommandOutcome::Denied(reason);
            }
        }

        let now = Instant::now();
        if matches!(operation, TeamOperation::Coop | TeamOperation::Trust) {
            if let Some(remaining) = self.cooldown_remaining(island_id, target, now) {
                return TeamCommandOutcome::Denied(DenialReason::Cooldown { remaining });
            }
        }

        let who = if mode.is_admin() { Actor::admin(actor) } else { Actor::player(actor) };
        let old_rank = action.target_rank;
        let applied = match operation {
            TeamOperation::Kick => registry.remove_player(&pair, &target, who).map(|_| VISITOR_RANK),
            TeamOperation::Coop => registry
                .set_rank(&island_id, target, COOP_RANK, who, TeamReason::Coop)
                .map(|_| COOP_RANK),
            TeamOperation::Trust => registry
                .set_rank(&island_id, target, TRUSTED_RANK, who, TeamReason::Trust)
                .map(|_| TRUSTED_RANK),
            TeamOperation::Uncoop => registry
                .set_rank(&island_id, target, VISITOR_RANK, who, TeamReason::Uncoop)
                .map(|_| VISITOR_RANK),
            TeamOperation::Untrust => registry
                .set_rank(&island_id, target, VISITOR_RANK, who, TeamReason::Untrust)
                .map(|_| VISITOR_RANK),
            TeamOperation::Ban => registry
                .ban(&island_id, target, who)
                .map(|_| BANNED_RANK),
            TeamOperation::Unban => registry.unban(&island_id, target, who).map(|_| VISITOR_RANK),
            TeamOperation::Promote => match old_rank.promoted() {
                Some(next) => registry.set_rank(&island_id, target, next, who, TeamReason::Promote).map(|_| next),
                None => return TeamCommandOutcome::Denied(DenialReason::AtRankLimit),
            },
            TeamOperation::Demote => match old_rank.demoted() {
                Some(prev) => registry.set_rank(&island_id, target, prev, who, TeamReason::Demote).map(|_| prev),
                None => return TeamCommandOutcome::Denied(DenialReason::AtRankLimit),
            },
            TeamOperation::SetOwner => registry
                .set_owner(&island_id, target, who)
                .map(|_| OWNER_RANK),
        };

        match applied {
            Ok(new_rank) => {
                if matches!(operation, TeamOperation::Kick | TeamOperation::Uncoop) {
                    self.cooldowns.insert((island_id, target), now);
                }
                info!("[Island {}] {} {} {} ({} -> {})", island_id, actor, operation, target, old_rank, new_rank);
                TeamCommandOutcome::Done { island: island_id, target, old_rank, new_rank }
            }
            Err(RegistryError::Vetoed { listener }) => {
                debug!("[Island {}] {} on {} cancelled by '{}'", island_id, operation, target, listener);
                TeamCommandOutcome::Denied(DenialReason::Vetoed)
            }
            Err(e) => TeamCommandOutcome::Denied(DenialReason::Rejected(e)),
        }
    }
}
