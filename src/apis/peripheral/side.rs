//! The six attachment points of a computer

use std::fmt;

/// A side of the computer a peripheral can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComputerSide {
    Bottom,
    Top,
    Back,
    Front,
    Right,
    Left,
}

impl ComputerSide {
    /// Every side, in slot order
    pub const ALL: [ComputerSide; 6] = [
        ComputerSide::Bottom,
        ComputerSide::Top,
        ComputerSide::Back,
        ComputerSide::Front,
        ComputerSide::Right,
        ComputerSide::Left,
    ];

    /// Slot index
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ComputerSide::Bottom => "bottom",
            ComputerSide::Top => "top",
            ComputerSide::Back => "back",
            ComputerSide::Front => "front",
            ComputerSide::Right => "right",
            ComputerSide::Left => "left",
        }
    }

    /// Case-insensitive lookup by name
    pub fn from_name(name: &str) -> Option<ComputerSide> {
        Self::ALL
            .into_iter()
            .find(|side| side.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for ComputerSide {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.name())
    }
}
