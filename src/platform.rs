//! Host platform detection.
use std::fmt;

use crate::error::{BuildError, Result};

/// Detected operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    /// Linux, macOS, the BSDs and other Unix-likes.
    Unix,
    /// Microsoft Windows.
    Windows,
    /// Anything the engine has no filesystem driver for.
    Unsupported,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix => write!(f, "unix"),
            Self::Windows => write!(f, "windows"),
            Self::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// Platform information for the current host.
#[derive(Debug, Clone)]
pub struct Platform {
    /// Operating system family.
    pub os: Os,
    /// Compiler target OS string (e.g. `"linux"`, `"macos"`).
    pub target_os: &'static str,
}

impl Platform {
    /// Detect the current platform.
    #[must_use]
    pub const fn detect() -> Self {
        Self {
            os: Self::detect_os(),
            target_os: std::env::consts::OS,
        }
    }

    /// Create a platform with explicit values (for testing).
    #[must_use]
    pub const fn new(os: Os, target_os: &'static str) -> Self {
        Self { os, target_os }
    }

    /// Whether this is a Unix-like host.
    #[must_use]
    pub fn is_unix(&self) -> bool {
        self.os == Os::Unix
    }

    /// Whether this is a Windows host.
    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.os == Os::Windows
    }

    /// Fail with [`BuildError::UnsupportedPlatform`] unless a driver exists.
    ///
    /// # Errors
    ///
    /// Returns an error when [`Platform::os`] is [`Os::Unsupported`].
    pub fn require_supported(&self) -> Result<Os> {
        match self.os {
            Os::Unsupported => Err(BuildError::UnsupportedPlatform {
                platform: self.target_os.to_string(),
            }),
            os => Ok(os),
        }
    }

    const fn detect_os() -> Os {
        if cfg!(windows) {
            Os::Windows
        } else if cfg!(unix) {
            Os::Unix
        } else {
            Os::Unsupported
        }
    }
}
