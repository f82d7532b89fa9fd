use crate::constants::layout::ARRAY_COUNT;

/// Logical meaning of a simulation array
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferRole {
    Previous = 0,
    CurrentPosition = 1,
    CurrentVelocity = 2,
}

impl BufferRole {
    pub const ALL: [BufferRole; ARRAY_COUNT] = [
        BufferRole::Previous,
        BufferRole::CurrentPosition,
        BufferRole::CurrentVelocity,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            BufferRole::Previous => "previous",
            BufferRole::CurrentPosition => "current_position",
            BufferRole::CurrentVelocity => "current_velocity",
        }
    }
}

/// Role -> physical slot mapping.
///
/// The simulation owns its arrays in a fixed `[_; 3]` arena; this table is the
/// only thing that changes when buffers ping-pong.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoleTable {
    slots: [usize; ARRAY_COUNT],
}

impl RoleTable {
    /// Role i bound to slot i
    pub fn identity() -> Self {
        Self { slots: [0, 1, 2] }
    }

    pub fn slot(&self, role: BufferRole) -> usize {
        self.slots[role.index()]
    }

    /// Role currently bound to `slot`
    pub fn role_of(&self, slot: usize) -> Option<BufferRole> {
        BufferRole::ALL.into_iter().find(|role| self.slot(*role) == slot)
    }

    pub fn swap(&mut self, a: BufferRole, b: BufferRole) {
        self.slots.swap(a.index(), b.index());
    }

    /// Ping-pong after an update: the freshly written previous array becomes current
    pub fn rotate_positions(&mut self) {
        self.swap(BufferRole::Previous, BufferRole::CurrentPosition);
    }
}

impl Default for RoleTable {
    fn default() -> Self {
        Self::identity()
    }
}
