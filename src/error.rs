//! Error taxonomy for hardware backends

use thiserror::Error;

/// Failure of a single backend call.
///
/// `DeviceUnavailable` and `DriverUnavailable` mean the surface is absent and
/// the call was not attempted. `Io` and `Command` are transient: the call was
/// attempted and failed, and the engine retries on its next tick.
#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("device not connected: {0}")]
    DeviceUnavailable(String),

    #[error("driver not available: {0}")]
    DriverUnavailable(String),

    #[error("{surface} I/O failed: {source}")]
    Io {
        surface: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{surface} command failed: {message}")]
    Command {
        surface: &'static str,
        message: String,
    },
}

impl HardwareError {
    pub fn io(surface: &'static str, source: std::io::Error) -> Self {
        Self::Io { surface, source }
    }

    pub fn command(surface: &'static str, message: impl Into<String>) -> Self {
        Self::Command {
            surface,
            message: message.into(),
        }
    }

    /// True when the call was attempted and may succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Command { .. })
    }
}

pub type HardwareResult<T> = Result<T, HardwareError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_is_not_transient() {
        assert!(!HardwareError::DeviceUnavailable("mouse".into()).is_transient());
        assert!(!HardwareError::DriverUnavailable("nvidia".into()).is_transient());
    }

    #[test]
    fn test_io_and_command_are_transient() {
        let io = HardwareError::io("mouse", std::io::Error::other("broken pipe"));
        assert!(io.is_transient());
        assert_eq!(io.to_string(), "mouse I/O failed: broken pipe");

        let cmd = HardwareError::command("gpu", "exit status 1");
        assert!(cmd.is_transient());
        assert_eq!(cmd.to_string(), "gpu command failed: exit status 1");
    }
}
