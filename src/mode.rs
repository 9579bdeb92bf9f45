use std::fmt;

/// Hardware configuration the engine drives towards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Nothing applied yet since process start
    #[default]
    Unknown,
    Desktop,
    Game,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Unknown => "unknown",
            Mode::Desktop => "desktop",
            Mode::Game => "game",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
