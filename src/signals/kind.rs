//! # Signal kinds.
//!
//! [`SignalKind`] names the OS signals the supervisor knows how to trap.
//! [`SignalKind::HANDLED`] is the default handled set (`SIGINT`, `SIGQUIT`).

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// OS signal known to the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SignalKind {
    /// `SIGINT` (Ctrl-C in a terminal).
    Interrupt,
    /// `SIGQUIT`.
    Quit,
    /// `SIGTERM` (default kill signal, used by systemd/Kubernetes).
    Terminate,
    /// `SIGHUP`.
    Hangup,
}

impl SignalKind {
    /// Signals handled when nothing else is configured.
    pub const HANDLED: [SignalKind; 2] = [SignalKind::Interrupt, SignalKind::Quit];

    /// Every known signal.
    pub const ALL: [SignalKind; 4] = [
        SignalKind::Interrupt,
        SignalKind::Quit,
        SignalKind::Terminate,
        SignalKind::Hangup,
    ];

    /// Conventional signal name, e.g. `"SIGINT"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Interrupt => "SIGINT",
            SignalKind::Quit => "SIGQUIT",
            SignalKind::Terminate => "SIGTERM",
            SignalKind::Hangup => "SIGHUP",
        }
    }

    #[cfg(unix)]
    pub(crate) fn to_unix(self) -> tokio::signal::unix::SignalKind {
        use tokio::signal::unix::SignalKind as Unix;
        match self {
            SignalKind::Interrupt => Unix::interrupt(),
            SignalKind::Quit => Unix::quit(),
            SignalKind::Terminate => Unix::terminate(),
            SignalKind::Hangup => Unix::hangup(),
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known signal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown signal {0:?}")]
pub struct ParseSignalError(pub String);

impl FromStr for SignalKind {
    type Err = ParseSignalError;

    /// Accepts `SIGINT`, `INT` and `interrupt` forms, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let short = upper.strip_prefix("SIG").unwrap_or(&upper);
        match short {
            "INT" | "INTERRUPT" => Ok(SignalKind::Interrupt),
            "QUIT" => Ok(SignalKind::Quit),
            "TERM" | "TERMINATE" => Ok(SignalKind::Terminate),
            "HUP" | "HANGUP" => Ok(SignalKind::Hangup),
            _ => Err(ParseSignalError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_conventional_names() {
        assert_eq!(SignalKind::Interrupt.to_string(), "SIGINT");
        assert_eq!(SignalKind::Quit.to_string(), "SIGQUIT");
    }

    #[test]
    fn parses_common_spellings() {
        assert_eq!("SIGINT".parse(), Ok(SignalKind::Interrupt));
        assert_eq!("int".parse(), Ok(SignalKind::Interrupt));
        assert_eq!("Quit".parse(), Ok(SignalKind::Quit));
        assert_eq!(" sigterm ".parse(), Ok(SignalKind::Terminate));
        assert_eq!("hangup".parse(), Ok(SignalKind::Hangup));
        assert!("SIGUSR1".parse::<SignalKind>().is_err());
    }
}
