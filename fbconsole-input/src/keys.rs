//! Byte-level key vocabulary.

pub const CARRIAGE_RETURN: u8 = b'\r';
pub const LINE_FEED: u8 = b'\n';
pub const ESCAPE: u8 = 0x1B;

/// Enter arrives as CR or LF depending on the terminal's ICRNL setting.
pub fn is_enter(key: u8) -> bool {
    key == CARRIAGE_RETURN || key == LINE_FEED
}

/// The four control bytes that would normally kill or stop a foreground job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKey {
    /// Ctrl+C
    Interrupt,
    /// Ctrl+Z
    Suspend,
    /// Ctrl+\
    Quit,
    /// Ctrl+D
    EndOfFile,
}

impl ControlKey {
    pub fn from_byte(key: u8) -> Option<Self> {
        match key {
            0x03 => Some(Self::Interrupt),
            0x1A => Some(Self::Suspend),
            0x1C => Some(Self::Quit),
            0x04 => Some(Self::EndOfFile),
            _ => None,
        }
    }

    pub fn byte(self) -> u8 {
        match self {
            Self::Interrupt => 0x03,
            Self::Suspend => 0x1A,
            Self::Quit => 0x1C,
            Self::EndOfFile => 0x04,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Interrupt => "Ctrl+C",
            Self::Suspend => "Ctrl+Z",
            Self::Quit => "Ctrl+\\",
            Self::EndOfFile => "Ctrl+D",
        }
    }
}

/// A selection on the configuration menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Option(u8),
    Quit,
    Confirm,
}

impl MenuChoice {
    pub fn from_byte(key: u8) -> Option<Self> {
        match key {
            b'1'..=b'5' => Some(Self::Option(key - b'0')),
            b'q' | b'Q' | ESCAPE => Some(Self::Quit),
            k if is_enter(k) => Some(Self::Confirm),
            _ => None,
        }
    }
}
