// island_realm/server/src/server/events.rs
use crate::core::error::RegistryError;
use crate::core::ranks::Rank;
use crate::core::types::PlayerID;
use crate::entities::island::Island;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamReason {
    Join,
    Leave,
    Kick,
    Coop,
    Uncoop,
    Trust,
    Untrust,
    Promote,
    Demote,
    SetOwner,
    Ban,
    Unban,
    SetRank,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IslandEventKind {
    Created,
    Deleted,
    MembershipChanged {
        player: PlayerID,
        old_rank: Rank,
        new_rank: Rank,
        reason: TeamReason,
    },
}

/// Who asked for a mutation. `player` is `None` for console and internal callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub player: Option<PlayerID>,
    pub admin: bool,
}

impl Actor {
    pub const SYSTEM: Actor = Actor { player: None, admin: true };

    pub fn player(id: PlayerID) -> Self {
        Actor { player: Some(id), admin: false }
    }

    pub fn admin(id: PlayerID) -> Self {
        Actor { player: Some(id), admin: true }
    }
}

/// Published before a mutation commits. `island` is the state before the change.
#[derive(Debug)]
pub struct IslandEvent<'a> {
    pub island: &'a Island,
    pub actor: Actor,
    pub kind: IslandEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventVerdict {
    Allow,
    Veto,
}

pub trait IslandEventListener: Send {
    fn name(&self) -> &str;
    fn on_island_event(&mut self, event: &IslandEvent<'_>) -> EventVerdict;
}

struct FnListener<F> {
    name: String,
    handler: F,
}

impl<F> IslandEventListener for FnListener<F>
where
    F: FnMut(&IslandEvent<'_>) -> EventVerdict + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_island_event(&mut self, event: &IslandEvent<'_>) -> EventVerdict {
        (self.handler)(event)
    }
}

/// Listeners run in registration order; the first veto stops dispatch.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Box<dyn IslandEventListener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Box<dyn IslandEventListener>) {
        info!("Registered island event listener '{}'", listener.name());
        self.listeners.push(listener);
    }

    pub fn register_fn<F>(&mut self, name: &str, handler: F)
    where
        F: FnMut(&IslandEvent<'_>) -> EventVerdict + Send + 'static,
    {
        self.register(Box::new(FnListener { name: name.to_string(), handler }));
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn dispatch(&mut self, event: &IslandEvent<'_>) -> Result<(), RegistryError> {
        for listener in self.listeners.iter_mut() {
            if listener.on_island_event(event) == EventVerdict::Veto {
                debug!(
                    "[Island {}] {:?} vetoed by '{}'",
                    event.island.id, event.kind, listener.name()
                );
                return Err(RegistryError::Vetoed { listener: listener.name().to_string() });
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.listeners.iter().map(|l| l.name()).collect();
        f.debug_struct("EventBus").field("listeners", &names).finish()
    }
}
