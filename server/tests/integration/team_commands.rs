// island_realm/server/tests/integration/team_commands.rs
mod common;

use common::*;
use island_realm_core::core::error::RegistryError;
use island_realm_core::core::ranks::{
    Rank, COOP_RANK, MEMBER_RANK, OWNER_RANK, SUB_OWNER_RANK, TRUSTED_RANK, VISITOR_RANK,
};
use island_realm_core::core::types::PlayerID;
use island_realm_core::server::events::{Actor, EventVerdict, IslandEventKind, TeamReason};
use island_realm_core::server::team_commands::TeamCommandOutcome;
use island_realm_core::systems::team::{DenialReason, TeamOperation};
use proptest::prelude::*;
use uuid::Uuid;

fn with_member(h: &Harness, owner: PlayerID) -> (island_realm_core::core::types::IslandId, PlayerID) {
    let island = h.create_island(0, 0, owner);
    let member = Uuid::new_v4();
    h.server
        .with_state(|s| s.islands.set_rank(&island, member, MEMBER_RANK, Actor::player(owner), TeamReason::Join))
        .unwrap();
    (island, member)
}

fn run(h: &Harness, actor: PlayerID, target: PlayerID, op: TeamOperation) -> TeamCommandOutcome {
    h.server.with_state(|s| s.team.execute(&mut s.islands, PAIR, actor, target, op))
}

#[test]
fn test_admin_kick_of_owner_is_refused_with_member_list() {
    let h = harness();
    let owner = Uuid::new_v4();
    let admin = Uuid::new_v4();
    let (island, member) = with_member(&h, owner);

    let outcome = h.server.with_state(|s| s.team.admin_kick(&mut s.islands, PAIR, admin, owner));
    match outcome {
        TeamCommandOutcome::OwnerProtected { members } => {
            assert_eq!(members.first(), Some(&(owner, OWNER_RANK)));
            assert!(members.contains(&(member, MEMBER_RANK)));
        }
        other => panic!("expected owner protection, got {:?}", other),
    }
    let stored = h.island(island).unwrap();
    assert_eq!(stored.owner(), Some(owner));
    assert_eq!(stored.team_size(), 2);
}

#[test]
fn test_admin_kick_removes_member() {
    let h = harness();
    let owner = Uuid::new_v4();
    let (island, member) = with_member(&h, owner);

    let outcome = h.server.with_state(|s| s.team.admin_kick(&mut s.islands, PAIR, Uuid::new_v4(), member));
    assert_eq!(
        outcome,
        TeamCommandOutcome::Done { island, target: member, old_rank: MEMBER_RANK, new_rank: VISITOR_RANK }
    );
    assert!(h.server.with_state(|s| s.islands.get_island(PAIR, &member).is_none()));
}

#[test]
fn test_admin_kick_requires_target_in_team() {
    let h = harness();
    let outcome = h
        .server
        .with_state(|s| s.team.admin_kick(&mut s.islands, PAIR, Uuid::new_v4(), Uuid::new_v4()));
    assert_eq!(outcome, TeamCommandOutcome::Denied(DenialReason::NotInTeam));
}

#[test]
fn test_admin_kick_of_solo_owner_is_not_in_team() {
    let h = harness();
    let owner = Uuid::new_v4();
    let island = h.create_island(0, 0, owner);

    let outcome = h.server.with_state(|s| s.team.admin_kick(&mut s.islands, PAIR, Uuid::new_v4(), owner));
    assert_eq!(outcome, TeamCommandOutcome::Denied(DenialReason::NotInTeam));
    assert_eq!(h.island(island).unwrap().owner(), Some(owner));
}

#[test]
fn test_uncoop_without_island() {
    let h = harness();
    assert_eq!(
        run(&h, Uuid::new_v4(), Uuid::new_v4(), TeamOperation::Uncoop),
        TeamCommandOutcome::Denied(DenialReason::NoIsland)
    );
}

#[test]
fn test_uncoop_low_rank() {
    let h = harness();
    let owner = Uuid::new_v4();
    let (_, member) = with_member(&h, owner);
    assert_eq!(
        run(&h, member, Uuid::new_v4(), TeamOperation::Uncoop),
        TeamCommandOutcome::Denied(DenialReason::InsufficientRank { required: SUB_OWNER_RANK, actual: MEMBER_RANK })
    );
}

#[test]
fn test_uncoop_yourself() {
    let h = harness();
    let owner = Uuid::new_v4();
    h.create_island(0, 0, owner);
    assert_eq!(run(&h, owner, owner, TeamOperation::Uncoop), TeamCommandOutcome::Denied(DenialReason::SelfTarget));
}

#[test]
fn test_uncoop_team_member_is_refused() {
    let h = harness();
    let owner = Uuid::new_v4();
    let (_, member) = with_member(&h, owner);
    assert_eq!(
        run(&h, owner, member, TeamOperation::Uncoop),
        TeamCommandOutcome::Denied(DenialReason::TargetRankMismatch { expected: COOP_RANK })
    );
}

#[test]
fn test_coop_uncoop_then_cooldown() {
    let h = harness();
    let owner = Uuid::new_v4();
    let guest = Uuid::new_v4();
    let island = h.create_island(0, 0, owner);

    assert!(run(&h, owner, guest, TeamOperation::Coop).is_done());
    assert_eq!(h.island(island).unwrap().rank_of(&guest), COOP_RANK);

    assert_eq!(
        run(&h, owner, guest, TeamOperation::Uncoop),
        TeamCommandOutcome::Done { island, target: guest, old_rank: COOP_RANK, new_rank: VISITOR_RANK }
    );
    assert_eq!(h.island(island).unwrap().rank_of(&guest), VISITOR_RANK);

    match run(&h, owner, guest, TeamOperation::Coop) {
        TeamCommandOutcome::Denied(DenialReason::Cooldown { remaining }) => assert!(remaining.as_secs() > 0),
        other => panic!("expected cooldown, got {:?}", other),
    }
}

#[test]
fn test_uncoop_candidates_are_coop_players_only() {
    let h = harness();
    let owner = Uuid::new_v4();
    let (_, _member) = with_member(&h, owner);
    let coop = Uuid::new_v4();
    let trusted = Uuid::new_v4();
    run(&h, owner, coop, TeamOperation::Coop);
    run(&h, owner, trusted, TeamOperation::Trust);

    let candidates = h
        .server
        .with_state(|s| s.team.candidates(&s.islands, PAIR, &owner, TeamOperation::Uncoop));
    assert_eq!(candidates, vec![coop]);
}

#[test]
fn test_veto_is_reported_as_denial() {
    let h = harness();
    let owner = Uuid::new_v4();
    let (island, member) = with_member(&h, owner);
    h.server.with_state(|s| {
        s.islands.events_mut().register_fn("kick-guard", |event| match event.kind {
            IslandEventKind::MembershipChanged { reason: TeamReason::Kick, .. } => EventVerdict::Veto,
            _ => EventVerdict::Allow,
        })
    });

    assert_eq!(run(&h, owner, member, TeamOperation::Kick), TeamCommandOutcome::Denied(DenialReason::Vetoed));
    assert_eq!(h.island(island).unwrap().rank_of(&member), MEMBER_RANK);
}

#[test]
fn test_promote_demote_and_transfer() {
    let h = harness();
    let owner = Uuid::new_v4();
    let (island, member) = with_member(&h, owner);

    assert!(run(&h, owner, member, TeamOperation::Promote).is_done());
    assert_eq!(h.island(island).unwrap().rank_of(&member), SUB_OWNER_RANK);
    assert_eq!(
        run(&h, owner, member, TeamOperation::Promote),
        TeamCommandOutcome::Denied(DenialReason::AtRankLimit)
    );
    assert!(run(&h, owner, member, TeamOperation::Demote).is_done());
    assert_eq!(h.island(island).unwrap().rank_of(&member), MEMBER_RANK);

    assert!(run(&h, owner, member, TeamOperation::SetOwner).is_done());
    let stored = h.island(island).unwrap();
    assert_eq!(stored.owner(), Some(member));
    assert_eq!(stored.rank_of(&owner), MEMBER_RANK);
    assert!(stored.check_invariants().is_ok());
}

#[test]
fn test_joining_second_team_is_rejected() {
    let h = harness();
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    h.create_island(0, 0, a);
    let other = h.create_island(800, 0, b);

    let outcome = h.server.with_state(|s| {
        s.team
            .admin_execute(&mut s.islands, other, Uuid::new_v4(), a, TeamOperation::SetOwner, true)
    });
    assert_eq!(outcome, TeamCommandOutcome::Denied(DenialReason::NotInTeam));

    let err = h
        .server
        .with_state(|s| s.islands.set_rank(&other, a, MEMBER_RANK, Actor::SYSTEM, TeamReason::Join))
        .unwrap_err();
    assert_eq!(err, RegistryError::AlreadyInTeam(a));
}

fn any_operation() -> impl Strategy<Value = TeamOperation> {
    (0..TeamOperation::ALL.len()).prop_map(|i| TeamOperation::ALL[i])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_owner_always_holds_the_top_rank(
        steps in prop::collection::vec((0usize..4, 0usize..4, any_operation(), any::<bool>()), 1..40)
    ) {
        let h = harness();
        let players: Vec<PlayerID> = (0..4).map(|_| Uuid::new_v4()).collect();
        let island = h.create_island(0, 0, players[0]);
        h.server
            .with_state(|s| s.islands.set_rank(&island, players[1], MEMBER_RANK, Actor::SYSTEM, TeamReason::Join))
            .unwrap();
        h.server
            .with_state(|s| s.islands.set_rank(&island, players[2], TRUSTED_RANK, Actor::SYSTEM, TeamReason::Trust))
            .unwrap();

        for (actor, target, op, admin) in steps {
            let (actor, target) = (players[actor], players[target]);
            h.server.with_state(|s| {
                if admin {
                    s.team.admin_execute(&mut s.islands, island, actor, target, op, false)
                } else {
                    s.team.execute(&mut s.islands, PAIR, actor, target, op)
                }
            });

            let stored = h.island(island).unwrap();
            prop_assert!(stored.check_invariants().is_ok());
            if let Some(owner) = stored.owner() {
                let top: Option<Rank> = stored.max_rank();
                prop_assert_eq!(Some(stored.rank_of(&owner)), top);
            }
        }
    }
}
