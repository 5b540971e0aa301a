//! Raw connections to the relay under test.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;

use hyper_util::rt::TokioIo;

/// Any stream hyper's connection-level client can drive.
pub trait HyperIo: hyper::rt::Read + hyper::rt::Write + Unpin + Send {}

impl<T: hyper::rt::Read + hyper::rt::Write + Unpin + Send> HyperIo for T {}

/// Where the relay under test listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl Target {
    /// Pick the target from the CLI: exactly one of a localhost port or a
    /// Unix socket path.
    pub fn from_args(port: Option<u16>, unix_socket_path: Option<PathBuf>) -> anyhow::Result<Self> {
        match (port, unix_socket_path) {
            (Some(port), None) => Ok(Target::Tcp(SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::LOCALHOST,
                port,
            )))),
            (None, Some(path)) => Ok(Target::Unix(path)),
            _ => anyhow::bail!("Either server port or unix socket path must be specified"),
        }
    }

    /// Open a fresh connection.
    pub async fn connect(&self) -> anyhow::Result<Box<dyn HyperIo>> {
        let io: Box<dyn HyperIo> = match self {
            Target::Tcp(addr) => {
                let stream = tokio::net::TcpStream::connect(addr).await?;
                stream.set_nodelay(true)?;
                Box::new(TokioIo::new(stream))
            }
            #[cfg(unix)]
            Target::Unix(path) => {
                Box::new(TokioIo::new(tokio::net::UnixStream::connect(path).await?))
            }
            #[cfg(not(unix))]
            Target::Unix(path) => {
                anyhow::bail!("Unix sockets are not supported here: {}", path.display())
            }
        };

        Ok(io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_target_is_required() {
        assert_eq!(
            Target::from_args(Some(24444), None).unwrap(),
            Target::Tcp("127.0.0.1:24444".parse().unwrap())
        );
        assert_eq!(
            Target::from_args(None, Some("/tmp/relay.sock".into())).unwrap(),
            Target::Unix("/tmp/relay.sock".into())
        );
        assert!(Target::from_args(None, None).is_err());
        assert!(Target::from_args(Some(1), Some("/tmp/relay.sock".into())).is_err());
    }

    #[tokio::test]
    async fn connect_fails_when_nothing_listens() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(Target::Tcp(addr).connect().await.is_err());
    }
}
