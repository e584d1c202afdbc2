//! Fighter records and the closed set of states they can be in

use std::fmt;

use serde::{Deserialize, Serialize};

use super::clock::TransitionHandle;

/// Which side of the duel an actor is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorId {
    /// Human-controlled fighter
    Player,
    /// Policy-controlled fighter
    Boss,
}

impl ActorId {
    pub const ALL: [ActorId; 2] = [ActorId::Player, ActorId::Boss];

    pub fn index(self) -> usize {
        match self {
            ActorId::Player => 0,
            ActorId::Boss => 1,
        }
    }

    pub fn opponent(self) -> ActorId {
        match self {
            ActorId::Player => ActorId::Boss,
            ActorId::Boss => ActorId::Player,
        }
    }
}

/// Horizontal orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    Left,
    Right,
}

impl Facing {
    /// -1.0 for left, 1.0 for right
    pub fn sign(self) -> f32 {
        match self {
            Facing::Left => -1.0,
            Facing::Right => 1.0,
        }
    }

    pub fn opposite(self) -> Facing {
        match self {
            Facing::Left => Facing::Right,
            Facing::Right => Facing::Left,
        }
    }
}

/// Every state a fighter can occupy.
///
/// `Idle` is the fallback: anything that finishes without a more specific
/// follow-up lands here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateTag {
    #[default]
    Idle,
    Walk,
    Dash,
    Crouch,
    Jump,
    Block,
    LightAttack,
    HeavyAttack,
    Special,
    CrouchLightAttack,
    CrouchHeavyAttack,
    JumpLightAttack,
    JumpHeavyAttack,
    JumpSpecial,
    HitStun,
    Victory,
    Death,
}

impl StateTag {
    pub const ALL: [StateTag; 17] = [
        StateTag::Idle,
        StateTag::Walk,
        StateTag::Dash,
        StateTag::Crouch,
        StateTag::Jump,
        StateTag::Block,
        StateTag::LightAttack,
        StateTag::HeavyAttack,
        StateTag::Special,
        StateTag::CrouchLightAttack,
        StateTag::CrouchHeavyAttack,
        StateTag::JumpLightAttack,
        StateTag::JumpHeavyAttack,
        StateTag::JumpSpecial,
        StateTag::HitStun,
        StateTag::Victory,
        StateTag::Death,
    ];

    /// Position in [`StateTag::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StateTag::Idle => "idle",
            StateTag::Walk => "walk",
            StateTag::Dash => "dash",
            StateTag::Crouch => "crouch",
            StateTag::Jump => "jump",
            StateTag::Block => "block",
            StateTag::LightAttack => "light_attack",
            StateTag::HeavyAttack => "heavy_attack",
            StateTag::Special => "special",
            StateTag::CrouchLightAttack => "crouch_light_attack",
            StateTag::CrouchHeavyAttack => "crouch_heavy_attack",
            StateTag::JumpLightAttack => "jump_light_attack",
            StateTag::JumpHeavyAttack => "jump_heavy_attack",
            StateTag::JumpSpecial => "jump_special",
            StateTag::HitStun => "hit_stun",
            StateTag::Victory => "victory",
            StateTag::Death => "death",
        }
    }

    /// Any state with startup/active/recovery phases and a hit-box
    pub fn is_attack(self) -> bool {
        matches!(
            self,
            StateTag::LightAttack
                | StateTag::HeavyAttack
                | StateTag::Special
                | StateTag::CrouchLightAttack
                | StateTag::CrouchHeavyAttack
                | StateTag::JumpLightAttack
                | StateTag::JumpHeavyAttack
                | StateTag::JumpSpecial
        )
    }

    /// Attacks layered on top of a jump arc
    pub fn is_airborne_attack(self) -> bool {
        matches!(
            self,
            StateTag::JumpLightAttack | StateTag::JumpHeavyAttack | StateTag::JumpSpecial
        )
    }

    /// Attacks that consume the whole energy bar
    pub fn is_special(self) -> bool {
        matches!(self, StateTag::Special | StateTag::JumpSpecial)
    }

    /// No outgoing transitions until an explicit reset
    pub fn is_terminal(self) -> bool {
        matches!(self, StateTag::Victory | StateTag::Death)
    }

    /// States any new intent may replace
    pub fn is_free(self) -> bool {
        matches!(
            self,
            StateTag::Idle | StateTag::Walk | StateTag::Crouch | StateTag::Block
        )
    }

    /// States held for as long as the intent persists
    pub fn loops(self) -> bool {
        matches!(
            self,
            StateTag::Idle | StateTag::Walk | StateTag::Crouch | StateTag::Block
        )
    }
}

impl fmt::Display for StateTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-phase of a timed action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    None,
    Startup,
    Active,
    Recovery,
}

/// An in-flight jump arc
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JumpArc {
    /// Tick the jump launched on
    pub started_at: u64,
    /// Total arc length in ticks
    pub total_ticks: u64,
    /// Horizontal displacement applied each tick of the arc
    pub dx_per_tick: f32,
}

impl JumpArc {
    pub fn elapsed(&self, now: u64) -> u64 {
        now.saturating_sub(self.started_at)
    }

    pub fn remaining(&self, now: u64) -> u64 {
        self.total_ticks.saturating_sub(self.elapsed(now))
    }
}

/// Authoritative fighter record.
///
/// Fields are readable by everyone; writes go through the state machine and
/// the hit resolver only.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: ActorId,

    // Resources
    pub health: f32,
    pub max_health: f32,
    pub energy: f32,
    pub max_energy: f32,

    // Position (top-left of the body box) and body size
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub ground_y: f32,
    pub facing: Facing,

    // State machine
    pub state: StateTag,
    pub phase: Phase,
    pub phase_elapsed: u64,
    pub pending: Option<TransitionHandle>,
    pub airborne: Option<JumpArc>,

    // Defenders already hit in the current active window
    pub struck: Vec<ActorId>,
}

impl Actor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ActorId,
        spawn_x: f32,
        ground_y: f32,
        width: f32,
        height: f32,
        facing: Facing,
        max_health: f32,
        max_energy: f32,
        starting_energy: f32,
    ) -> Self {
        Self {
            id,
            health: max_health,
            max_health,
            energy: starting_energy.clamp(0.0, max_energy),
            max_energy,
            x: spawn_x,
            y: ground_y - height,
            width,
            height,
            ground_y,
            facing,
            state: StateTag::Idle,
            phase: Phase::None,
            phase_elapsed: 0,
            pending: None,
            airborne: None,
            struck: Vec::new(),
        }
    }

    /// Y of the body top when standing on the ground
    pub fn standing_y(&self) -> f32 {
        self.ground_y - self.height
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    /// Set health, clamped into `[0, max_health]`
    pub(crate) fn set_health(&mut self, health: f32) {
        self.health = health.clamp(0.0, self.max_health);
    }

    /// Set energy, clamped into `[0, max_energy]`
    pub(crate) fn set_energy(&mut self, energy: f32) {
        self.energy = energy.clamp(0.0, self.max_energy);
    }

    pub fn snapshot(&self) -> ActorSnapshot {
        ActorSnapshot {
            id: self.id,
            state: self.state,
            phase: self.phase,
            facing: self.facing,
            x: self.x,
            y: self.y,
            health: self.health,
            energy: self.energy,
            airborne: self.airborne.is_some(),
        }
    }
}

/// Read-only view of an actor, handed to the AI and to collaborators
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActorSnapshot {
    pub id: ActorId,
    pub state: StateTag,
    pub phase: Phase,
    pub facing: Facing,
    pub x: f32,
    pub y: f32,
    pub health: f32,
    pub energy: f32,
    pub airborne: bool,
}

/// Both fighters, indexed by [`ActorId`]
#[derive(Debug, Clone)]
pub struct Roster {
    actors: [Actor; 2],
}

impl Roster {
    pub fn new(player: Actor, boss: Actor) -> Self {
        Self {
            actors: [player, boss],
        }
    }

    pub fn get(&self, id: ActorId) -> &Actor {
        &self.actors[id.index()]
    }

    pub(crate) fn get_mut(&mut self, id: ActorId) -> &mut Actor {
        &mut self.actors[id.index()]
    }

    /// Mutable access to `id` and its opponent at the same time
    pub(crate) fn pair_mut(&mut self, id: ActorId) -> (&mut Actor, &mut Actor) {
        let (first, second) = self.actors.split_at_mut(1);
        match id {
            ActorId::Player => (&mut first[0], &mut second[0]),
            ActorId::Boss => (&mut second[0], &mut first[0]),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Actor> {
        self.actors.iter()
    }

    pub fn snapshots(&self) -> Vec<ActorSnapshot> {
        self.actors.iter().map(Actor::snapshot).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(id: ActorId) -> Actor {
        Actor::new(id, 100.0, 400.0, 80.0, 160.0, Facing::Right, 100.0, 100.0, 0.0)
    }

    #[test]
    fn test_state_tag_index_matches_all() {
        for (i, tag) in StateTag::ALL.iter().enumerate() {
            assert_eq!(tag.index(), i, "{tag} out of order");
        }
    }

    #[test]
    fn test_state_classes() {
        assert!(StateTag::JumpSpecial.is_attack());
        assert!(StateTag::JumpSpecial.is_special());
        assert!(StateTag::JumpSpecial.is_airborne_attack());
        assert!(!StateTag::HitStun.is_attack());
        assert!(!StateTag::HitStun.is_free());
        assert!(StateTag::Block.is_free());
        assert!(StateTag::Death.is_terminal());
        assert!(!StateTag::Dash.is_free());
        assert_eq!(StateTag::default(), StateTag::Idle);
    }

    #[test]
    fn test_clamped_setters() {
        let mut a = actor(ActorId::Player);
        a.set_health(-12.0);
        assert_eq!(a.health, 0.0);
        a.set_health(250.0);
        assert_eq!(a.health, 100.0);
        a.set_energy(130.0);
        assert_eq!(a.energy, 100.0);
        a.set_energy(-1.0);
        assert_eq!(a.energy, 0.0);
    }

    #[test]
    fn test_new_actor_stands_on_ground() {
        let a = actor(ActorId::Boss);
        assert_eq!(a.y, 240.0);
        assert_eq!(a.standing_y(), 240.0);
        assert_eq!(a.health, a.max_health);
    }

    #[test]
    fn test_pair_mut_orders_self_first() {
        let mut roster = Roster::new(actor(ActorId::Player), actor(ActorId::Boss));
        let (me, other) = roster.pair_mut(ActorId::Boss);
        assert_eq!(me.id, ActorId::Boss);
        assert_eq!(other.id, ActorId::Player);
    }
}
