//! I/O backend selection.
//!
//! tokio drives sockets through the readiness mechanism of the host platform.
//! [`Transport`] names those mechanisms so a configuration can pin one and
//! fail fast when the platform does not provide it.

use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Transport {
    /// Linux and Android `epoll`
    Epoll,
    /// BSD and Apple `kqueue`
    Kqueue,
    /// Windows I/O completion ports
    Iocp,
    /// `poll(2)` on the remaining unix platforms
    Poll,
}

impl Transport {
    /// The best transport the current platform provides.
    pub const fn detect() -> Self {
        if cfg!(any(target_os = "linux", target_os = "android")) {
            Self::Epoll
        } else if cfg!(any(
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd",
            target_os = "dragonfly"
        )) {
            Self::Kqueue
        } else if cfg!(windows) {
            Self::Iocp
        } else {
            Self::Poll
        }
    }

    pub fn is_available(self) -> bool {
        self == Self::detect()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Epoll => "epoll",
            Self::Kqueue => "kqueue",
            Self::Iocp => "iocp",
            Self::Poll => "poll",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
