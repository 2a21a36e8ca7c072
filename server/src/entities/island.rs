// island_realm/server/src/entities/island.rs
use crate::core::ranks::{Rank, BANNED_RANK, DEFAULT_RANK, MEMBER_RANK, OWNER_RANK};
use crate::core::types::{BlockPos, Environment, IslandId, Location, PairName, PlayerID, WorldName};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// A player-owned claim spanning the same coordinates in every world of its pair.
///
/// Only the registry mutates islands, so the mutators are crate-visible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Island {
    pub id: IslandId,
    pub pair: PairName,
    pub center: BlockPos,
    protection_range: i32,
    owner: Option<PlayerID>,
    members: BTreeMap<PlayerID, Rank>,
    spawn_points: BTreeMap<Environment, Location>,
    nether_generated: bool,
    end_generated: bool,
    pub created_millis: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    visitors: BTreeSet<PlayerID>,
    #[serde(default)]
    banned: BTreeSet<PlayerID>,
}

impl Island {
    pub fn new(pair: PairName, center: BlockPos, protection_range: i32, owner: Option<PlayerID>) -> Self {
        let mut members = BTreeMap::new();
        if let Some(owner_id) = owner {
            members.insert(owner_id, OWNER_RANK);
        }
        let created_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Island {
            id: Uuid::new_v4(),
            pair,
            center,
            protection_range: protection_range.max(1),
            owner,
            members,
            spawn_points: BTreeMap::new(),
            nether_generated: false,
            end_generated: false,
            created_millis,
            name: None,
            visitors: BTreeSet::new(),
            banned: BTreeSet::new(),
        }
    }

    pub fn protection_range(&self) -> i32 { self.protection_range }
    pub fn owner(&self) -> Option<PlayerID> { self.owner }
    pub fn is_owned(&self) -> bool { self.owner.is_some() }

    // --- Geometry ---

    pub fn min_x(&self) -> i32 { self.center.x - self.protection_range }
    pub fn max_x(&self) -> i32 { self.center.x + self.protection_range }
    pub fn min_z(&self) -> i32 { self.center.z - self.protection_range }
    pub fn max_z(&self) -> i32 { self.center.z + self.protection_range }

    /// Half-open protection square: `[center - range, center + range)` on x and z.
    pub fn contains_xz(&self, x: i32, z: i32) -> bool {
        x >= self.min_x() && x < self.max_x() && z >= self.min_z() && z < self.max_z()
    }

    pub fn overlaps(&self, other: &Island) -> bool {
        self.min_x() < other.max_x() && other.min_x() < self.max_x()
            && self.min_z() < other.max_z() && other.min_z() < self.max_z()
    }

    pub fn center_in(&self, world: &WorldName) -> Location {
        Location::at_block(world.clone(), self.center)
    }

    // --- Ranks ---

    pub fn rank_of(&self, player: &PlayerID) -> Rank {
        if self.banned.contains(player) {
            return BANNED_RANK;
        }
        self.members.get(player).copied().unwrap_or(DEFAULT_RANK)
    }

    pub fn members(&self) -> impl Iterator<Item = (&PlayerID, &Rank)> {
        self.members.iter()
    }

    /// Players whose rank is at least `threshold`.
    pub fn member_set(&self, threshold: Rank) -> Vec<PlayerID> {
        self.members
            .iter()
            .filter(|(_, rank)| **rank >= threshold)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Players holding exactly `rank`.
    pub fn members_with_rank(&self, rank: Rank) -> Vec<PlayerID> {
        self.members
            .iter()
            .filter(|(_, r)| **r == rank)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn team_size(&self) -> usize {
        self.members.values().filter(|r| r.is_team_member()).count()
    }

    pub fn max_rank(&self) -> Option<Rank> {
        self.members.values().copied().max()
    }

    pub(crate) fn set_rank(&mut self, player: PlayerID, rank: Rank) -> Option<Rank> {
        self.banned.remove(&player);
        self.members.insert(player, rank)
    }

    pub(crate) fn remove_member(&mut self, player: &PlayerID) -> Option<Rank> {
        let removed = self.members.remove(player);
        if self.owner.as_ref() == Some(player) {
            self.owner = None;
        }
        removed
    }

    /// Hands ownership to `new_owner`; the previous owner drops to member.
    pub(crate) fn set_owner(&mut self, new_owner: PlayerID) -> Option<PlayerID> {
        let previous = self.owner.replace(new_owner);
        if let Some(prev) = previous {
            if prev != new_owner {
                self.members.insert(prev, MEMBER_RANK);
            }
        }
        self.banned.remove(&new_owner);
        self.members.insert(new_owner, OWNER_RANK);
        previous
    }

    // --- Visitors and bans ---

    pub fn visitors(&self) -> &BTreeSet<PlayerID> { &self.visitors }
    pub fn banned(&self) -> &BTreeSet<PlayerID> { &self.banned }
    pub fn is_banned(&self, player: &PlayerID) -> bool { self.banned.contains(player) }

    pub(crate) fn add_visitor(&mut self, player: PlayerID) -> bool { self.visitors.insert(player) }
    pub(crate) fn remove_visitor(&mut self, player: &PlayerID) -> bool { self.visitors.remove(player) }

    pub(crate) fn ban(&mut self, player: PlayerID) -> Option<Rank> {
        let previous = self.members.remove(&player);
        self.visitors.remove(&player);
        self.banned.insert(player);
        previous
    }

    pub(crate) fn unban(&mut self, player: &PlayerID) -> bool { self.banned.remove(player) }

    // --- Dimension counterparts ---

    pub fn spawn_point(&self, env: Environment) -> Option<&Location> {
        self.spawn_points.get(&env)
    }

    pub(crate) fn set_spawn_point(&mut self, env: Environment, location: Location) -> Option<Location> {
        self.spawn_points.insert(env, location)
    }

    pub fn has_nether_island(&self) -> bool { self.nether_generated }
    pub fn has_end_island(&self) -> bool { self.end_generated }

    /// The overworld always exists; nether and end depend on provisioning.
    pub fn has_counterpart(&self, env: Environment) -> bool {
        match env {
            Environment::Normal => true,
            Environment::Nether => self.nether_generated,
            Environment::End => self.end_generated,
        }
    }

    pub(crate) fn set_generated(&mut self, env: Environment, generated: bool) {
        match env {
            Environment::Normal => {}
            Environment::Nether => self.nether_generated = generated,
            Environment::End => self.end_generated = generated,
        }
    }

    /// Checks the record-level invariants; used when loading persisted islands.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.protection_range <= 0 {
            return Err(format!("protection range {} is not positive", self.protection_range));
        }
        let range = self.protection_range;
        for axis in [self.center.x, self.center.z] {
            if axis.checked_sub(range).is_none() || axis.checked_add(range).is_none() {
                return Err(format!("protection square around {:?} leaves the coordinate space", self.center));
            }
        }
        if let Some(owner) = self.owner {
            let owner_rank = self.members.get(&owner).copied();
            if owner_rank != Some(OWNER_RANK) {
                return Err(format!("owner {} holds {:?} instead of the owner rank", owner, owner_rank));
            }
            if self.members.iter().any(|(id, rank)| *id != owner && *rank >= OWNER_RANK) {
                return Err("a non-owner member holds the owner rank".to_string());
            }
        }
        if self.members.keys().any(|id| self.banned.contains(id)) {
            return Err("a banned player still holds a membership record".to_string());
        }
        Ok(())
    }
}
