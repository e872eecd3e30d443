//! memcached text protocol statistics client.
//!
//! Only the read-only `stats` family of commands is spoken. Every round trip
//! is bounded by the configured timeout.

pub mod tls;

use std::future::Future;
use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use crate::stats::{Record, ServerStats};

pub use tls::Tls;

const CMD_STATS: &str = "stats";
const CMD_SETTINGS: &str = "stats settings";
const CMD_ITEMS: &str = "stats items";
const CMD_SLABS: &str = "stats slabs";

/// Errors talking to a memcached server.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connecting to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("unexpected reply to {command}: {line:?}")]
    Protocol { command: &'static str, line: String },

    #[error("connection closed")]
    Closed,
}

/// Opens stats sessions to memcached servers.
pub trait StatsSource: Send + Sync + 'static {
    type Session: StatsSession + 'static;

    /// Connect to the server at `address`.
    fn connect(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Self::Session, TransportError>> + Send;
}

/// An established connection able to fetch statistics.
pub trait StatsSession: Send {
    /// Fetch general, per slab class item and per slab class allocation stats.
    fn stats(&mut self) -> impl Future<Output = Result<ServerStats, TransportError>> + Send;

    /// Fetch the server settings.
    fn settings(&mut self) -> impl Future<Output = Result<Record, TransportError>> + Send;
}

/// Byte stream a session can run over.
pub trait Io: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Io for T {}

/// Text protocol client over TCP or unix sockets, optionally wrapped in TLS.
///
/// Addresses starting with `/` are unix socket paths; everything else is
/// passed to the TCP resolver as `host:port`.
#[derive(Clone)]
pub struct TextClient {
    timeout: Duration,
    tls: Option<Tls>,
}

impl TextClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, tls: None }
    }

    /// Runs every connection through a TLS handshake first.
    pub fn with_tls(mut self, tls: Tls) -> Self {
        self.tls = Some(tls);
        self
    }

    async fn open(&self, address: &str) -> io::Result<Box<dyn Io>> {
        let stream: Box<dyn Io> = if address.starts_with('/') {
            open_unix(address).await?
        } else {
            let stream = TcpStream::connect(address).await?;
            stream.set_nodelay(true)?;
            Box::new(stream)
        };

        match &self.tls {
            Some(tls) => tls.wrap(address, stream).await,
            None => Ok(stream),
        }
    }
}

#[cfg(unix)]
async fn open_unix(path: &str) -> io::Result<Box<dyn Io>> {
    let stream = tokio::net::UnixStream::connect(path).await?;
    Ok(Box::new(stream))
}

#[cfg(not(unix))]
async fn open_unix(_path: &str) -> io::Result<Box<dyn Io>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "unix sockets are not supported on this platform",
    ))
}

impl StatsSource for TextClient {
    type Session = TextSession;

    async fn connect(&self, address: &str) -> Result<TextSession, TransportError> {
        debug!(address, tls = self.tls.is_some(), "connecting to memcached");

        let stream = tokio::time::timeout(self.timeout, self.open(address))
            .await
            .map_err(|_| TransportError::Timeout {
                operation: "connect",
                timeout: self.timeout,
            })?
            .map_err(|source| TransportError::Connect {
                address: address.to_string(),
                source,
            })?;

        Ok(TextSession::new(stream, self.timeout))
    }
}

/// One connection to a memcached server.
///
/// A failed round trip leaves the stream at an unknown position in the reply,
/// so the session refuses further commands with [`TransportError::Closed`].
pub struct TextSession {
    stream: BufReader<Box<dyn Io>>,
    timeout: Duration,
    broken: bool,
}

impl TextSession {
    /// Wraps an already connected stream.
    pub fn new(stream: Box<dyn Io>, timeout: Duration) -> Self {
        Self {
            stream: BufReader::new(stream),
            timeout,
            broken: false,
        }
    }

    async fn command(
        &mut self,
        command: &'static str,
    ) -> Result<Vec<(String, String)>, TransportError> {
        if self.broken {
            return Err(TransportError::Closed);
        }

        let timeout = self.timeout;
        let result = match tokio::time::timeout(timeout, self.round_trip(command)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                operation: command,
                timeout,
            }),
        };

        if result.is_err() {
            self.broken = true;
        }
        result
    }

    async fn round_trip(
        &mut self,
        command: &'static str,
    ) -> Result<Vec<(String, String)>, TransportError> {
        self.stream
            .write_all(format!("{command}\r\n").as_bytes())
            .await?;
        self.stream.flush().await?;

        let mut pairs = Vec::new();
        let mut buf = String::new();

        loop {
            buf.clear();
            if self.stream.read_line(&mut buf).await? == 0 {
                return Err(TransportError::Closed);
            }

            let line = buf.trim_end_matches(['\r', '\n']);
            if line == "END" {
                return Ok(pairs);
            }

            match parse_stat_line(line) {
                Some((key, value)) => pairs.push((key.to_string(), value.to_string())),
                None => {
                    return Err(TransportError::Protocol {
                        command,
                        line: line.to_string(),
                    })
                }
            }
        }
    }
}

impl StatsSession for TextSession {
    async fn stats(&mut self) -> Result<ServerStats, TransportError> {
        let mut stats = ServerStats {
            stats: self.command(CMD_STATS).await?.into_iter().collect(),
            ..Default::default()
        };

        let slabs = self.command(CMD_SLABS).await?;
        fold_slabs(&mut stats, slabs);

        let items = self.command(CMD_ITEMS).await?;
        fold_items(&mut stats, items);

        Ok(stats)
    }

    async fn settings(&mut self) -> Result<Record, TransportError> {
        Ok(self.command(CMD_SETTINGS).await?.into_iter().collect())
    }
}

/// Splits `STAT <key> <value>` into key and value. The value may be empty or
/// contain spaces.
fn parse_stat_line(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("STAT ")?;
    match rest.split_once(' ') {
        Some((key, value)) => Some((key, value)),
        None if !rest.is_empty() => Some((rest, "")),
        None => None,
    }
}

/// Distributes `stats slabs` output: `<class>:<field>` lines go to the class
/// sub-record, global lines such as `total_malloced` into the general record.
fn fold_slabs(stats: &mut ServerStats, pairs: Vec<(String, String)>) {
    for (key, value) in pairs {
        match split_class(&key) {
            Some((slab, field)) => {
                stats.slabs_mut(slab).insert(field.to_string(), value);
            }
            None => {
                stats.stats.entry(key).or_insert(value);
            }
        }
    }
}

/// Distributes `stats items` output: `items:<class>:<field>` lines go to the
/// class sub-record; anything else is ignored.
fn fold_items(stats: &mut ServerStats, pairs: Vec<(String, String)>) {
    for (key, value) in pairs {
        let Some(rest) = key.strip_prefix("items:") else {
            continue;
        };
        if let Some((slab, field)) = split_class(rest) {
            stats.items_mut(slab).insert(field.to_string(), value);
        }
    }
}

fn split_class(key: &str) -> Option<(u32, &str)> {
    let (class, field) = key.split_once(':')?;
    Some((class.parse().ok()?, field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, DuplexStream};

    fn pairs(list: &[(&str, &str)]) -> Vec<(String, String)> {
        list.iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_parse_stat_line() {
        assert_eq!(parse_stat_line("STAT pid 1234"), Some(("pid", "1234")));
        assert_eq!(
            parse_stat_line("STAT version 1.6.21 extra"),
            Some(("version", "1.6.21 extra"))
        );
        assert_eq!(parse_stat_line("STAT inter"), Some(("inter", "")));
        assert_eq!(parse_stat_line("STAT "), None);
        assert_eq!(parse_stat_line("ERROR"), None);
        assert_eq!(parse_stat_line("SERVER_ERROR out of memory"), None);
    }

    #[test]
    fn test_fold_slabs() {
        let mut stats = ServerStats::default();
        stats.stats.insert("uptime".to_string(), "10".to_string());

        fold_slabs(
            &mut stats,
            pairs(&[
                ("1:chunk_size", "96"),
                ("1:get_hits", "4"),
                ("12:chunk_size", "1184"),
                ("active_slabs", "2"),
                ("total_malloced", "2097152"),
                ("uptime", "999"),
            ]),
        );

        assert_eq!(stats.slabs.len(), 2);
        assert_eq!(stats.slabs[&1]["chunk_size"], "96");
        assert_eq!(stats.slabs[&12]["chunk_size"], "1184");
        assert_eq!(stats.stats["total_malloced"], "2097152");
        // General stats win over slab globals with the same key.
        assert_eq!(stats.stats["uptime"], "10");
    }

    #[test]
    fn test_fold_items() {
        let mut stats = ServerStats::default();

        fold_items(
            &mut stats,
            pairs(&[
                ("items:1:number", "5"),
                ("items:1:hits_to_hot", "3"),
                ("items:4:number", "1"),
                ("items:x:number", "1"),
                ("unrelated", "1"),
            ]),
        );

        assert_eq!(stats.items.len(), 2);
        assert_eq!(stats.items[&1]["number"], "5");
        assert_eq!(stats.items[&1]["hits_to_hot"], "3");
        assert_eq!(stats.items[&4]["number"], "1");
    }

    async fn serve(mut server: DuplexStream, replies: &[&str]) {
        let mut buf = vec![0u8; 256];
        for reply in replies {
            let _ = server.read(&mut buf).await;
            server
                .write_all(reply.as_bytes())
                .await
                .expect("write reply");
        }
    }

    #[tokio::test]
    async fn test_session_settings() {
        let (client, server) = tokio::io::duplex(4096);
        let server = tokio::spawn(async move {
            serve(server, &["STAT maxconns 1024\r\nSTAT lru_crawler yes\r\nEND\r\n"]).await;
        });

        let mut session = TextSession::new(Box::new(client), Duration::from_secs(1));
        let settings = session.settings().await.expect("settings");

        assert_eq!(settings["maxconns"], "1024");
        assert_eq!(settings["lru_crawler"], "yes");
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn test_session_stats_merges_three_commands() {
        let (client, server) = tokio::io::duplex(4096);
        let server = tokio::spawn(async move {
            serve(
                server,
                &[
                    "STAT uptime 5\r\nSTAT version 1.6.21\r\nEND\r\n",
                    "STAT 1:chunk_size 96\r\nSTAT total_malloced 1048576\r\nEND\r\n",
                    "STAT items:1:number 3\r\nEND\r\n",
                ],
            )
            .await;
        });

        let mut session = TextSession::new(Box::new(client), Duration::from_secs(1));
        let stats = session.stats().await.expect("stats");

        assert_eq!(stats.stats["uptime"], "5");
        assert_eq!(stats.stats["total_malloced"], "1048576");
        assert_eq!(stats.slabs[&1]["chunk_size"], "96");
        assert_eq!(stats.items[&1]["number"], "3");
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn test_session_protocol_error() {
        let (client, server) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            serve(server, &["ERROR\r\n"]).await;
        });

        let mut session = TextSession::new(Box::new(client), Duration::from_secs(1));
        let err = session.settings().await.expect_err("protocol error");

        assert!(matches!(err, TransportError::Protocol { command: CMD_SETTINGS, .. }));
    }

    #[tokio::test]
    async fn test_session_refuses_commands_after_bad_reply() {
        let (client, server) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            serve(
                server,
                &[
                    "STAT uptime 1\r\nBOGUS\r\nSTAT maxconns 7\r\nEND\r\n",
                    "STAT maxconns 1024\r\nEND\r\n",
                ],
            )
            .await;
        });

        let mut session = TextSession::new(Box::new(client), Duration::from_secs(1));

        let err = session.stats().await.expect_err("protocol error");
        assert!(matches!(err, TransportError::Protocol { command: CMD_STATS, .. }));

        // The rest of the stats reply must never be read as settings.
        let err = session.settings().await.expect_err("session is unusable");
        assert!(matches!(err, TransportError::Closed));
    }

    #[tokio::test]
    async fn test_session_fails_fast_after_timeout() {
        let (client, _server) = tokio::io::duplex(4096);
        let mut session = TextSession::new(Box::new(client), Duration::from_millis(50));

        let err = session.stats().await.expect_err("timeout");
        assert!(matches!(err, TransportError::Timeout { operation: CMD_STATS, .. }));

        let started = std::time::Instant::now();
        let err = session.settings().await.expect_err("session is unusable");
        assert!(matches!(err, TransportError::Closed));
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_session_times_out() {
        let (client, _server) = tokio::io::duplex(4096);

        let mut session = TextSession::new(Box::new(client), Duration::from_millis(50));
        let err = session.settings().await.expect_err("timeout");

        assert!(matches!(err, TransportError::Timeout { operation: CMD_SETTINGS, .. }));
    }

    #[tokio::test]
    async fn test_session_closed() {
        let (client, server) = tokio::io::duplex(4096);
        drop(server);

        let mut session = TextSession::new(Box::new(client), Duration::from_secs(1));
        let err = session.settings().await.expect_err("closed");

        assert!(matches!(err, TransportError::Closed | TransportError::Io(_)));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let address = listener.local_addr().expect("addr").to_string();
        drop(listener);

        let client = TextClient::new(Duration::from_secs(1));
        let err = client.connect(&address).await.err().expect("connect should fail");

        assert!(matches!(err, TransportError::Connect { .. }));
    }
}
