//! Input interpreter: raw key edges in, at most one intent per tick out

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::InputSpec;
use crate::util::time::ms_to_ticks;

use super::actor::Facing;

/// Logical keys a binding can resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Left,
    Right,
    Jump,
    Crouch,
    Light,
    Heavy,
    Special,
    Block,
}

impl Key {
    fn direction(self) -> Option<Facing> {
        match self {
            Key::Left => Some(Facing::Left),
            Key::Right => Some(Facing::Right),
            _ => None,
        }
    }

    fn for_direction(facing: Facing) -> Key {
        match facing {
            Facing::Left => Key::Left,
            Facing::Right => Key::Right,
        }
    }
}

/// Key edge direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    Down,
    Up,
}

/// A resolved key edge stamped with the tick it arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub key: Key,
    pub edge: Edge,
    pub tick: u64,
}

/// What an actor is asked to do this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    /// Let go of whatever free state is held
    Release,
    Move { dir: Facing },
    Dash { dir: Facing },
    Crouch,
    Jump { dir: Option<Facing> },
    Block,
    LightAttack,
    HeavyAttack,
    Special,
    CrouchLightAttack,
    CrouchHeavyAttack,
    JumpLightAttack,
    JumpHeavyAttack,
    JumpSpecial,
}

/// Bounded, ordered record of recent down-edges; the oldest is evicted
#[derive(Debug, Clone)]
pub struct InputBuffer {
    edges: VecDeque<InputEvent>,
    capacity: usize,
}

impl InputBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            edges: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, event: InputEvent) {
        if self.edges.len() == self.capacity {
            self.edges.pop_front();
        }
        self.edges.push_back(event);
    }

    /// Down-edges of `key` stamped at or after `since`
    pub fn count_since(&self, key: Key, since: u64) -> usize {
        self.edges
            .iter()
            .filter(|e| e.key == key && e.edge == Edge::Down && e.tick >= since)
            .count()
    }

    pub fn forget(&mut self, key: Key) {
        self.edges.retain(|e| e.key != key);
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn clear(&mut self) {
        self.edges.clear();
    }
}

/// Decodes the human actor's key edges into intents
#[derive(Debug, Clone)]
pub struct InputInterpreter {
    bindings: HashMap<String, Key>,
    held: HashSet<Key>,
    pressed: Vec<Key>,
    released: Vec<Key>,
    buffer: InputBuffer,
    dash_window: u64,
    last_direction: Option<Key>,
}

impl InputInterpreter {
    pub fn new(bindings: HashMap<String, Key>, spec: &InputSpec) -> Self {
        Self {
            bindings,
            held: HashSet::new(),
            pressed: Vec::new(),
            released: Vec::new(),
            buffer: InputBuffer::new(spec.buffer_capacity),
            dash_window: ms_to_ticks(spec.dash_window_ms),
            last_direction: None,
        }
    }

    /// Resolve a host key code through the binding table. Unbound codes are
    /// ignored.
    pub fn handle_code(&mut self, code: &str, edge: Edge, tick: u64) -> bool {
        match self.bindings.get(code).copied() {
            Some(key) => {
                self.handle(InputEvent { key, edge, tick });
                true
            }
            None => {
                trace!(code, "Ignoring unbound key");
                false
            }
        }
    }

    /// Record a resolved key edge
    pub fn handle(&mut self, event: InputEvent) {
        match event.edge {
            Edge::Down => {
                // Autorepeat: the key is already down
                if !self.held.insert(event.key) {
                    return;
                }
                self.pressed.push(event.key);
                self.buffer.push(event);
                if event.key.direction().is_some() {
                    self.last_direction = Some(event.key);
                }
            }
            Edge::Up => {
                if self.held.remove(&event.key) {
                    self.released.push(event.key);
                }
            }
        }
    }

    /// Forget held keys and history (round reset)
    pub fn reset(&mut self) {
        self.held.clear();
        self.pressed.clear();
        self.released.clear();
        self.buffer.clear();
        self.last_direction = None;
    }

    pub fn is_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    pub fn buffer(&self) -> &InputBuffer {
        &self.buffer
    }

    /// Evaluate the precedence table for this tick and clear per-tick edges
    pub fn poll(&mut self, now: u64, airborne: bool) -> Option<Intent> {
        let pressed = std::mem::take(&mut self.pressed);
        let released = std::mem::take(&mut self.released);
        self.decode(now, airborne, &pressed, &released)
    }

    fn decode(
        &mut self,
        now: u64,
        airborne: bool,
        pressed: &[Key],
        released: &[Key],
    ) -> Option<Intent> {
        let fresh = |k: Key| pressed.contains(&k);
        let held = |k: Key| self.held.contains(&k);
        let chord = |a: Key, b: Key| held(a) && held(b) && (fresh(a) || fresh(b));

        if airborne {
            if fresh(Key::Light) {
                return Some(Intent::JumpLightAttack);
            }
            if fresh(Key::Heavy) {
                return Some(Intent::JumpHeavyAttack);
            }
            return None;
        }

        // Jump chords
        if chord(Key::Jump, Key::Light) {
            return Some(Intent::JumpLightAttack);
        }
        if chord(Key::Jump, Key::Heavy) {
            return Some(Intent::JumpHeavyAttack);
        }
        if chord(Key::Jump, Key::Special) {
            return Some(Intent::JumpSpecial);
        }

        // Crouch chords
        if chord(Key::Crouch, Key::Light) {
            return Some(Intent::CrouchLightAttack);
        }
        if chord(Key::Crouch, Key::Heavy) {
            return Some(Intent::CrouchHeavyAttack);
        }

        // Directional jump
        for dir in [Facing::Left, Facing::Right] {
            if chord(Key::for_direction(dir), Key::Jump) {
                return Some(Intent::Jump { dir: Some(dir) });
            }
        }

        // Double-tap dash, judged against the buffer
        for dir in [Facing::Left, Facing::Right] {
            let key = Key::for_direction(dir);
            let since = now.saturating_sub(self.dash_window);
            if fresh(key) && self.buffer.count_since(key, since) >= 2 {
                self.buffer.forget(key);
                return Some(Intent::Dash { dir });
            }
        }

        // Single presses, in precedence order
        if let Some(dir) = pressed.iter().find_map(|k| k.direction()) {
            return Some(Intent::Move { dir });
        }
        if fresh(Key::Crouch) {
            return Some(Intent::Crouch);
        }
        if fresh(Key::Jump) {
            return Some(Intent::Jump { dir: None });
        }
        if fresh(Key::Light) {
            return Some(Intent::LightAttack);
        }
        if fresh(Key::Heavy) {
            return Some(Intent::HeavyAttack);
        }
        if fresh(Key::Special) {
            return Some(Intent::Special);
        }
        if fresh(Key::Block) {
            return Some(Intent::Block);
        }

        // Held keys keep their state going
        if let Some(dir) = self.held_direction() {
            return Some(Intent::Move { dir });
        }
        if held(Key::Crouch) {
            return Some(Intent::Crouch);
        }
        if held(Key::Block) {
            return Some(Intent::Block);
        }

        if !released.is_empty() {
            return Some(Intent::Release);
        }

        None
    }

    /// Direction of the most recently pressed direction key still held
    fn held_direction(&self) -> Option<Facing> {
        if let Some(key) = self.last_direction {
            if self.held.contains(&key) {
                return key.direction();
            }
        }
        [Key::Left, Key::Right]
            .into_iter()
            .find(|k| self.held.contains(k))
            .and_then(Key::direction)
    }
}
