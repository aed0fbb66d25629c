use std::fmt;
#[cfg(unix)]
use std::path::PathBuf;

/// Address of the peer a session talks to.
///
/// Covers the four channel kinds a session can run on. `Stdio` carries no
/// address — the session inherits the process's own standard streams, the
/// arrangement used when an editor spawns this process as a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// TCP client connection to `host:port`.
    Tcp { host: String, port: u16 },

    /// Unix domain socket connection to a filesystem path.
    #[cfg(unix)]
    Unix { path: PathBuf },

    /// The process's own standard input/output.
    Stdio,

    /// A child process spawned from `argv`, with its stdio piped.
    Child { argv: Vec<String> },
}

impl Endpoint {
    /// TCP endpoint from host and port.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Unix domain socket endpoint from a path.
    #[cfg(unix)]
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }

    /// Child process endpoint from a full argv (program + arguments).
    pub fn child(argv: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Child {
            argv: argv.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            #[cfg(unix)]
            Self::Unix { path } => write!(f, "unix://{}", path.display()),
            Self::Stdio => write!(f, "stdio"),
            Self::Child { argv } => write!(f, "child:{}", argv.join(" ")),
        }
    }
}
