// island_realm/server/src/server/islands.rs
use crate::concurrent::island_grid::IslandGrid;
use crate::core::error::RegistryError;
use crate::core::ranks::{Rank, BANNED_RANK, COOP_RANK, OWNER_RANK, VISITOR_RANK};
use crate::core::types::{BlockPos, Environment, IslandId, Location, PairName, PlayerID};
use crate::entities::island::Island;
use crate::persistence::store::CorruptRecord;
use crate::server::events::{Actor, EventBus, IslandEvent, IslandEventKind, TeamReason};
use crate::systems::safe_spot::{SafeSpotOptions, SafeSpotTeleport};
use crate::world::dimensions::IslandWorldManager;
use ahash::{AHashMap, AHashSet};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: usize,
    pub skipped: usize,
}

/// Owns every island of every dimension pair. Lives on the simulation thread.
pub struct IslandsManager {
    worlds: Arc<IslandWorldManager>,
    teleport: SafeSpotTeleport,
    islands: AHashMap<IslandId, Island>,
    grids: AHashMap<PairName, IslandGrid>,
    /// Team island (MEMBER or above) of each player, per pair.
    team_index: AHashMap<PairName, AHashMap<PlayerID, IslandId>>,
    events: EventBus,
    dirty: AHashSet<IslandId>,
    deleted: Vec<(PairName, IslandId)>,
}

impl IslandsManager {
    pub fn new(worlds: Arc<IslandWorldManager>, teleport: SafeSpotTeleport) -> Self {
        let mut grids = AHashMap::new();
        for name in worlds.pair_names() {
            if let Some(pair) = worlds.pair(name) {
                grids.insert(name.clone(), IslandGrid::new(pair.island_distance));
            }
        }
        IslandsManager {
            worlds,
            teleport,
            islands: AHashMap::new(),
            grids,
            team_index: AHashMap::new(),
            events: EventBus::new(),
            dirty: AHashSet::new(),
            deleted: Vec::new(),
        }
    }

    pub fn worlds(&self) -> &Arc<IslandWorldManager> {
        &self.worlds
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn island_count(&self) -> usize {
        self.islands.len()
    }

    pub fn all_islands(&self) -> impl Iterator<Item = &Island> {
        self.islands.values()
    }

    // --- Queries ---

    /// Island whose protection square contains `location`, in any world of its pair.
    pub fn get_island_at(&self, location: &Location) -> Option<&Island> {
        let (pair, _) = self.worlds.classify(&location.world)?;
        let block = location.block();
        self.get_island_at_xz(&pair.name, block.x, block.z)
    }

    pub fn get_island_at_xz(&self, pair: &str, x: i32, z: i32) -> Option<&Island> {
        let grid = self.grids.get(pair)?;
        grid.candidates_at(x, z)
            .iter()
            .filter_map(|id| self.islands.get(id))
            .find(|island| island.contains_xz(x, z))
    }

    pub fn get_island_by_id(&self, id: &IslandId) -> Option<&Island> {
        self.islands.get(id)
    }

    /// The island `player` is a team member (MEMBER or above) of.
    pub fn get_island(&self, pair: &str, player: &PlayerID) -> Option<&Island> {
        self.team_island_id(pair, player).and_then(|id| self.islands.get(&id))
    }

    fn team_island_id(&self, pair: &str, player: &PlayerID) -> Option<IslandId> {
        self.team_index.get(pair).and_then(|players| players.get(player)).copied()
    }

    pub fn has_island(&self, pair: &str, player: &PlayerID) -> bool {
        self.get_island(pair, player).is_some()
    }

    /// True when the player's island has more than one team member.
    pub fn in_team(&self, pair: &str, player: &PlayerID) -> bool {
        self.get_island(pair, player).map(|i| i.team_size() > 1).unwrap_or(false)
    }

    pub fn is_owner(&self, pair: &str, player: &PlayerID) -> bool {
        self.get_island(pair, player).and_then(|i| i.owner()) == Some(*player)
    }

    /// Owner of the island the player belongs to.
    pub fn get_owner(&self, pair: &str, player: &PlayerID) -> Option<PlayerID> {
        self.get_island(pair, player).and_then(|i| i.owner())
    }

    pub fn get_members(&self, island: &IslandId, threshold: Rank) -> Vec<PlayerID> {
        self.islands
            .get(island)
            .map(|i| i.member_set(threshold))
            .unwrap_or_default()
    }

    /// Sends the player to their island's home spawn, or its center when none is recorded.
    pub fn home_teleport(&self, pair: &str, player: &PlayerID) -> Option<Location> {
        let island = self.get_island(pair, player)?;
        let overworld = &self.worlds.pair(pair)?.overworld;
        let home = island
            .spawn_point(Environment::Normal)
            .cloned()
            .unwrap_or_else(|| island.center_in(overworld));
        Some(self.teleport.teleport(*player, &home, SafeSpotOptions::exact()))
    }

    // --- Mutations ---

    fn publish(
        events: &mut EventBus,
        island: &Island,
        actor: Actor,
        kind: IslandEventKind,
    ) -> Result<(), RegistryError> {
        let event = IslandEvent { island, actor, kind };
        events.dispatch(&event)
    }

    fn index_rank(&mut self, pair: &PairName, player: PlayerID, rank: Rank, id: IslandId) {
        let players = self.team_index.entry(pair.clone()).or_default();
        if rank.is_team_member() {
            players.insert(player, id);
        } else if players.get(&player) == Some(&id) {
            players.remove(&player);
        }
    }

    fn team_conflict(&self, pair: &str, player: &PlayerID, island: IslandId) -> Option<RegistryError> {
        match self.team_island_id(pair, player) {
            Some(existing) if existing != island => Some(RegistryError::AlreadyInTeam(*player)),
            _ => None,
        }
    }

    fn commit(&mut self, id: IslandId) {
        self.dirty.insert(id);
        if let Some(island) = self.islands.get(&id) {
            debug_assert!(island.check_invariants().is_ok(), "{:?}", island.check_invariants());
            trace!("[Island {}] committed", id);
        }
    }

    pub fn create_island(
        &mut self,
        pair: &str,
        center: BlockPos,
        owner: Option<PlayerID>,
        actor: Actor,
    ) -> Result<IslandId, RegistryError> {
        let dims = self
            .worlds
            .pair(pair)
            .ok_or_else(|| RegistryError::UnknownPair(pair.to_string()))?;
        let island = Island::new(dims.name.clone(), center, dims.protection_range, owner);
        self.insert_checked(island, actor)
    }

    /// Validity, team and overlap checks shared by creation and loading.
    fn check_placement(&self, island: &Island) -> Result<(), RegistryError> {
        island.check_invariants().map_err(RegistryError::InvalidIsland)?;
        let pair = &island.pair;
        for (player, rank) in island.members() {
            if rank.is_team_member() {
                if let Some(err) = self.team_conflict(pair, player, island.id) {
                    return Err(err);
                }
            }
        }
        let grid = self
            .grids
            .get(pair)
            .ok_or_else(|| RegistryError::UnknownPair(pair.to_string()))?;
        let overlap = grid
            .candidates_in(island.min_x(), island.min_z(), island.max_x(), island.max_z())
            .into_iter()
            .find(|other| self.islands.get(other).map(|o| o.overlaps(island)).unwrap_or(false));
        match overlap {
            Some(other) => Err(RegistryError::Overlap(other)),
            None => Ok(()),
        }
    }

    fn insert_checked(&mut self, island: Island, actor: Actor) -> Result<IslandId, RegistryError> {
        self.check_placement(&island)?;
        Self::publish(&mut self.events, &island, actor, IslandEventKind::Created)?;

        let id = island.id;
        info!("[Island {}] Created in '{}' at {:?} (owner {:?})", id, island.pair, island.center, island.owner());
        self.index_island(island);
        self.commit(id);
        Ok(id)
    }

    fn index_island(&mut self, island: Island) {
        let id = island.id;
        if let Some(grid) = self.grids.get_mut(&island.pair) {
            grid.insert(id, island.min_x(), island.min_z(), island.max_x(), island.max_z());
        }
        let members: Vec<(PlayerID, Rank)> = island.members().map(|(p, r)| (*p, *r)).collect();
        let pair = island.pair.clone();
        self.islands.insert(id, island);
        for (player, rank) in members {
            self.index_rank(&pair, player, rank, id);
        }
    }

    pub fn delete_island(&mut self, id: &IslandId, actor: Actor) -> Result<Island, RegistryError> {
        let island = self.islands.get(id).ok_or(RegistryError::UnknownIsland(*id))?;
        Self::publish(&mut self.events, island, actor, IslandEventKind::Deleted)?;

        let island = self.islands.remove(id).ok_or(RegistryError::UnknownIsland(*id))?;
        if let Some(grid) = self.grids.get_mut(&island.pair) {
            grid.remove(id);
        }
        if let Some(players) = self.team_index.get_mut(&island.pair) {
            players.retain(|_, island_id| island_id != id);
        }
        self.dirty.remove(id);
        self.deleted.push((island.pair.clone(), *id));
        info!("[Island {}] Deleted from '{}'", id, island.pair);
        Ok(island)
    }

    /// Removes the player's team membership. Returns the island they left, if any.
    pub fn remove_player(
        &mut self,
        pair: &str,
        player: &PlayerID,
        actor: Actor,
    ) -> Result<Option<IslandId>, RegistryError> {
        let Some(id) = self.team_island_id(pair, player) else {
            return Ok(None);
        };
        let island = self.islands.get(&id).ok_or(RegistryError::UnknownIsland(id))?;
        let reason = if actor.player == Some(*player) { TeamReason::Leave } else { TeamReason::Kick };
        let kind = IslandEventKind::MembershipChanged {
            player: *player,
            old_rank: island.rank_of(player),
            new_rank: VISITOR_RANK,
            reason,
        };
        Self::publish(&mut self.events, island, actor, kind)?;

        let Some(island) = self.islands.get_mut(&id) else {
            return Ok(None);
        };
        island.remove_member(player);
        if let Some(players) = self.team_index.get_mut(pair) {
            players.remove(player);
        }
        info!("[Island {}] Removed {} ({:?})", id, player, reason);
        self.commit(id);
        Ok(Some(id))
    }

    /// Sets a non-owner rank. Ranks below coop clear the record.
    pub fn set_rank(
        &mut self,
        id: &IslandId,
        player: PlayerID,
        rank: Rank,
        actor: Actor,
        reason: TeamReason,
    ) -> Result<Rank, RegistryError> {
        if rank >= OWNER_RANK || rank == BANNED_RANK {
            return Err(RegistryError::ReservedRank);
        }
        let island = self.islands.get(id).ok_or(RegistryError::UnknownIsland(*id))?;
        if island.owner() == Some(player) {
            return Err(RegistryError::ReservedRank);
        }
        if rank.is_team_member() {
            if let Some(err) = self.team_conflict(&island.pair, &player, *id) {
                return Err(err);
            }
        }
        let old_rank = island.rank_of(&player);
        let new_rank = if rank < COOP_RANK { VISITOR_RANK } else { rank };
        let kind = IslandEventKind::MembershipChanged { player, old_rank, new_rank, reason };
        Self::publish(&mut self.events, island, actor, kind)?;

        let island = self.islands.get_mut(id).ok_or(RegistryError::UnknownIsland(*id))?;
        if new_rank == VISITOR_RANK {
            island.remove_member(&player);
        } else {
            island.set_rank(player, new_rank);
        }
        let pair = island.pair.clone();
        self.index_rank(&pair, player, new_rank, *id);
        debug!("[Island {}] {} rank {} -> {} ({:?})", id, player, old_rank, new_rank, reason);
        self.commit(*id);
        Ok(old_rank)
    }

    /// Transfers ownership. Returns the previous owner.
    pub fn set_owner(
        &mut self,
        id: &IslandId,
        new_owner: PlayerID,
        actor: Actor,
    ) -> Result<Option<PlayerID>, RegistryError> {
        let island = self.islands.get(id).ok_or(RegistryError::UnknownIsland(*id))?;
        if let Some(err) = self.team_conflict(&island.pair, &new_owner, *id) {
            return Err(err);
        }
        let kind = IslandEventKind::MembershipChanged {
            player: new_owner,
            old_rank: island.rank_of(&new_owner),
            new_rank: OWNER_RANK,
            reason: TeamReason::SetOwner,
        };
        Self::publish(&mut self.events, island, actor, kind)?;

        let island = self.islands.get_mut(id).ok_or(RegistryError::UnknownIsland(*id))?;
        let previous = island.set_owner(new_owner);
        let pair = island.pair.clone();
        self.index_rank(&pair, new_owner, OWNER_RANK, *id);
        info!("[Island {}] Ownership {:?} -> {}", id, previous, new_owner);
        self.commit(*id);
        Ok(previous)
    }

    pub fn ban(&mut self, id: &IslandId, player: PlayerID, actor: Actor) -> Result<(), RegistryError> {
        let island = self.islands.get(id).ok_or(RegistryError::UnknownIsland(*id))?;
        if island.owner() == Some(player) {
            return Err(RegistryError::ReservedRank);
        }
        let kind = IslandEventKind::MembershipChanged {
            player,
            old_rank: island.rank_of(&player),
            new_rank: BANNED_RANK,
            reason: TeamReason::Ban,
        };
        Self::publish(&mut self.events, island, actor, kind)?;

        let island = self.islands.get_mut(id).ok_or(RegistryError::UnknownIsland(*id))?;
        island.ban(player);
        let pair = island.pair.clone();
        self.index_rank(&pair, player, BANNED_RANK, *id);
        info!("[Island {}] Banned {}", id, player);
        self.commit(*id);
        Ok(())
    }

    pub fn unban(&mut self, id: &IslandId, player: PlayerID, actor: Actor) -> Result<bool, RegistryError> {
        let island = self.islands.get(id).ok_or(RegistryError::UnknownIsland(*id))?;
        if !island.is_banned(&player) {
            return Ok(false);
        }
        let kind = IslandEventKind::MembershipChanged {
            player,
            old_rank: BANNED_RANK,
            new_rank: VISITOR_RANK,
            reason: TeamReason::Unban,
        };
        Self::publish(&mut self.events, island, actor, kind)?;

        let island = self.islands.get_mut(id).ok_or(RegistryError::UnknownIsland(*id))?;
        island.unban(&player);
        info!("[Island {}] Unbanned {}", id, player);
        self.commit(*id);
        Ok(true)
    }

    pub fn set_spawn_point(
        &mut self,
        id: &IslandId,
        env: Environment,
        location: Location,
    ) -> Result<Option<Location>, RegistryError> {
        let island = self.islands.get_mut(id).ok_or(RegistryError::UnknownIsland(*id))?;
        debug!("[Island {}] {} spawn set to {}", id, env, location);
        let previous = island.set_spawn_point(env, location);
        self.commit(*id);
        Ok(previous)
    }

    pub fn mark_generated(&mut self, id: &IslandId, env: Environment) -> Result<(), RegistryError> {
        let island = self.islands.get_mut(id).ok_or(RegistryError::UnknownIsland(*id))?;
        island.set_generated(env, true);
        debug!("[Island {}] {} counterpart marked generated", id, env);
        self.commit(*id);
        Ok(())
    }

    pub fn add_visitor(&mut self, id: &IslandId, player: PlayerID) -> Result<bool, RegistryError> {
        let island = self.islands.get_mut(id).ok_or(RegistryError::UnknownIsland(*id))?;
        let added = island.add_visitor(player);
        if added {
            self.commit(*id);
        }
        Ok(added)
    }

    pub fn remove_visitor(&mut self, id: &IslandId, player: &PlayerID) -> Result<bool, RegistryError> {
        let island = self.islands.get_mut(id).ok_or(RegistryError::UnknownIsland(*id))?;
        let removed = island.remove_visitor(player);
        if removed {
            self.commit(*id);
        }
        Ok(removed)
    }

    // --- Persistence support ---

    /// Indexes persisted islands. Corrupt, invalid or overlapping records are skipped one by one.
    pub fn load(&mut self, pair: &str, records: Vec<Result<Island, CorruptRecord>>) -> LoadSummary {
        let mut summary = LoadSummary::default();
        for record in records {
            let island = match record {
                Ok(island) => island,
                Err(corrupt) => {
                    warn!("Skipping corrupt island record in '{}': {}", pair, corrupt);
                    summary.skipped += 1;
                    continue;
                }
            };
            if &*island.pair != pair {
                warn!("[Island {}] Stored under '{}' but belongs to '{}'; skipped", island.id, pair, island.pair);
                summary.skipped += 1;
                continue;
            }
            let max_range = self.worlds.pair(pair).map(|dims| dims.max_protection_range()).unwrap_or(0);
            if island.protection_range() > max_range {
                warn!(
                    "[Island {}] Protection range {} exceeds the limit {} for '{}'; skipped",
                    island.id,
                    island.protection_range(),
                    max_range,
                    pair
                );
                summary.skipped += 1;
                continue;
            }
            // Stored islands already exist, so no Created event is published.
            match self.check_placement(&island) {
                Ok(()) => {
                    trace!("[Island {}] Loaded", island.id);
                    self.index_island(island);
                    summary.loaded += 1;
                }
                Err(e) => {
                    warn!("[Island {}] Not loaded: {}", island.id, e);
                    summary.skipped += 1;
                }
            }
        }
        // Freshly loaded records match the store.
        self.dirty.clear();
        info!("Loaded {} island(s) for '{}', skipped {}", summary.loaded, pair, summary.skipped);
        summary
    }

    pub fn has_dirty(&self) -> bool {
        !self.dirty.is_empty() || !self.deleted.is_empty()
    }

    /// Copies of every island changed since the last call, grouped by pair.
    pub fn dirty_snapshots(&mut self) -> Vec<Island> {
        let snapshots: Vec<Island> = self
            .dirty
            .drain()
            .filter_map(|id| self.islands.get(&id).cloned())
            .collect();
        trace!("Took {} dirty island snapshot(s)", snapshots.len());
        snapshots
    }

    pub fn snapshot_all(&mut self) -> Vec<Island> {
        self.dirty.clear();
        self.islands.values().cloned().collect()
    }

    pub fn take_deleted(&mut self) -> Vec<(PairName, IslandId)> {
        std::mem::take(&mut self.deleted)
    }

    /// Re-queues islands whose save failed.
    pub fn mark_dirty(&mut self, ids: impl IntoIterator<Item = IslandId>) {
        for id in ids {
            if self.islands.contains_key(&id) {
                self.dirty.insert(id);
            }
        }
    }
}

impl std::fmt::Debug for IslandsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IslandsManager")
            .field("islands", &self.islands.len())
            .field("dirty", &self.dirty.len())
            .field("events", &self.events)
            .finish()
    }
}
