use std::time::Duration;

/// Operating system family, which decides the ping command syntax and the
/// shape of its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Windows,
    Unix,
}

impl Platform {
    /// The family this binary was compiled for.
    pub const fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    /// Arguments placed before the host: packet count, then per-reply timeout.
    /// Windows expects the timeout in milliseconds, Unix in seconds.
    pub fn ping_args(self, packet_count: u32, timeout: Duration) -> [String; 4] {
        match self {
            Platform::Windows => [
                "-n".to_string(),
                packet_count.to_string(),
                "-w".to_string(),
                timeout.as_millis().to_string(),
            ],
            Platform::Unix => [
                "-c".to_string(),
                packet_count.to_string(),
                "-W".to_string(),
                timeout.as_secs().to_string(),
            ],
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}
