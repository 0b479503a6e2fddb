//! Output channel identities and roles.
//!
//! The controller board switches four relay/SSR outputs, D4 through D7.
//! What each output drives (heating element, fan, nothing) is configured by
//! the user and stored with the rest of the settings. Heating elements
//! participate in duty-cycle modulation; fans are binary per phase policy.

/// Number of switchable outputs on the board.
pub const CHANNEL_COUNT: usize = 4;

/// One of the four output channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelId {
    D4 = 0,
    D5 = 1,
    D6 = 2,
    D7 = 3,
}

impl ChannelId {
    /// All channels, in board order.
    pub const ALL: [ChannelId; CHANNEL_COUNT] =
        [ChannelId::D4, ChannelId::D5, ChannelId::D6, ChannelId::D7];

    /// Array index for this channel.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Channel for an array index. Out-of-range falls back to D4 in release
    /// builds (safe: D4 is always present).
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::D4,
            1 => Self::D5,
            2 => Self::D6,
            3 => Self::D7,
            _ => {
                debug_assert!(false, "invalid channel index: {idx}");
                Self::D4
            }
        }
    }
}

impl core::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::D4 => write!(f, "D4"),
            Self::D5 => write!(f, "D5"),
            Self::D6 => write!(f, "D6"),
            Self::D7 => write!(f, "D7"),
        }
    }
}

/// What a channel drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputType {
    Unused = 0,
    TopElement = 1,
    BottomElement = 2,
    BoostElement = 3,
    ConvectionFan = 4,
    CoolingFan = 5,
}

impl OutputType {
    /// Heating elements are duty-cycle modulated.
    pub const fn is_heating(self) -> bool {
        matches!(
            self,
            Self::TopElement | Self::BottomElement | Self::BoostElement
        )
    }

    /// Fans are switched on/off per phase policy, never modulated.
    pub const fn is_fan(self) -> bool {
        matches!(self, Self::ConvectionFan | Self::CoolingFan)
    }

    /// Decode a stored byte; unknown values map to `Unused`.
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::TopElement,
            2 => Self::BottomElement,
            3 => Self::BoostElement,
            4 => Self::ConvectionFan,
            5 => Self::CoolingFan,
            _ => Self::Unused,
        }
    }
}

impl core::fmt::Display for OutputType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unused => write!(f, "Unused"),
            Self::TopElement => write!(f, "Top"),
            Self::BottomElement => write!(f, "Bottom"),
            Self::BoostElement => write!(f, "Boost"),
            Self::ConvectionFan => write!(f, "Fan"),
            Self::CoolingFan => write!(f, "Cool"),
        }
    }
}
