//! ClamAV daemon client
//!
//! Talks to clamd over a unix socket or TCP using the `clamav-client` blocking API.
//! Every daemon call runs on the blocking pool under its own timeout; a call that
//! exceeds it is abandoned and reported as a timeout. The same timeout is set on the
//! socket itself, so the abandoned blocking thread finishes shortly after. Responses are turned into a
//! [`Detection`] at this boundary and never interpreted anywhere else.

use std::io;
use std::net::{TcpStream, ToSocketAddrs};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::str;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use scanvault_core::{Config, ScanOutcome};

use super::scanner::{ScanClientError, VirusScanner};

/// Where clamd listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClamdEndpoint {
    Socket(PathBuf),
    Tcp(String),
}

impl std::fmt::Display for ClamdEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClamdEndpoint::Socket(path) => write!(f, "unix:{}", path.display()),
            ClamdEndpoint::Tcp(address) => write!(f, "tcp:{}", address),
        }
    }
}

/// TCP transport whose connect, reads and writes all give up after `timeout`, so a
/// call abandoned by the async side still ends its blocking thread.
struct TimedTcp<'a> {
    address: &'a str,
    timeout: Duration,
}

impl clamav_client::TransportProtocol for TimedTcp<'_> {
    type Stream = TcpStream;

    fn connect(&self) -> io::Result<TcpStream> {
        let mut last_err = None;
        for addr in self.address.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.timeout))?;
                    stream.set_write_timeout(Some(self.timeout))?;
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} did not resolve to any address", self.address),
            )
        }))
    }
}

#[cfg(unix)]
struct TimedSocket<'a> {
    path: &'a Path,
    timeout: Duration,
}

#[cfg(unix)]
impl clamav_client::TransportProtocol for TimedSocket<'_> {
    type Stream = UnixStream;

    fn connect(&self) -> io::Result<UnixStream> {
        let stream = UnixStream::connect(self.path)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        Ok(stream)
    }
}

impl ClamdEndpoint {
    fn ping(&self, timeout: Duration) -> io::Result<Vec<u8>> {
        match self {
            #[cfg(unix)]
            ClamdEndpoint::Socket(path) => clamav_client::ping(TimedSocket { path, timeout }),
            #[cfg(not(unix))]
            ClamdEndpoint::Socket(_) => Err(unix_sockets_unsupported()),
            ClamdEndpoint::Tcp(address) => clamav_client::ping(TimedTcp { address, timeout }),
        }
    }

    fn version(&self, timeout: Duration) -> io::Result<Vec<u8>> {
        match self {
            #[cfg(unix)]
            ClamdEndpoint::Socket(path) => {
                clamav_client::get_version(TimedSocket { path, timeout })
            }
            #[cfg(not(unix))]
            ClamdEndpoint::Socket(_) => Err(unix_sockets_unsupported()),
            ClamdEndpoint::Tcp(address) => {
                clamav_client::get_version(TimedTcp { address, timeout })
            }
        }
    }

    fn scan_file(&self, file: &Path, timeout: Duration) -> io::Result<Vec<u8>> {
        match self {
            #[cfg(unix)]
            ClamdEndpoint::Socket(path) => {
                clamav_client::scan_file(file, TimedSocket { path, timeout }, None)
            }
            #[cfg(not(unix))]
            ClamdEndpoint::Socket(_) => Err(unix_sockets_unsupported()),
            ClamdEndpoint::Tcp(address) => {
                clamav_client::scan_file(file, TimedTcp { address, timeout }, None)
            }
        }
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

#[cfg(not(unix))]
fn unix_sockets_unsupported() -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        "unix sockets are not available on this platform",
    )
}

/// What the daemon said about a scanned stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    Clean,
    Detected(String),
}

/// Parse a clamd scan reply such as `stream: OK` or `stream: Eicar-Signature FOUND`.
///
/// Replies are NUL or newline terminated. Anything that is not a recognizable OK or
/// FOUND line (daemon `ERROR` replies, empty or non-UTF-8 bytes) is an error.
pub fn parse_scan_response(raw: &[u8]) -> Result<Detection, ScanClientError> {
    let text = str::from_utf8(raw)
        .map_err(|_| ScanClientError::Protocol("response is not valid UTF-8".to_string()))?;
    let text = text.trim_end_matches(['\0', '\n', '\r']).trim();

    if text.is_empty() {
        return Err(ScanClientError::Protocol("empty response".to_string()));
    }

    if text.ends_with("ERROR") {
        return Err(ScanClientError::Daemon(text.to_string()));
    }

    let Some((_, verdict)) = text.rsplit_once(": ") else {
        return Err(ScanClientError::Protocol(text.to_string()));
    };

    if verdict == "OK" {
        return Ok(Detection::Clean);
    }

    match verdict.strip_suffix(" FOUND").map(str::trim) {
        Some(signature) if !signature.is_empty() => Ok(Detection::Detected(signature.to_string())),
        _ => Err(ScanClientError::Protocol(text.to_string())),
    }
}

/// Parse a clamd VERSION reply, keeping the engine part (`ClamAV 1.0.5`).
fn parse_version(raw: &[u8]) -> Option<String> {
    let text = str::from_utf8(raw).ok()?;
    let text = text.trim_end_matches(['\0', '\n', '\r']).trim();
    let engine = text.split('/').next()?.trim();
    (!engine.is_empty()).then(|| engine.to_string())
}

#[derive(Clone)]
pub struct ClamAVService {
    endpoints: Vec<ClamdEndpoint>,
    /// Limit for each individual daemon call
    timeout: Duration,
}

impl ClamAVService {
    /// Create a client that tries `endpoints` in order.
    pub fn new(endpoints: Vec<ClamdEndpoint>, timeout: Duration) -> Self {
        Self { endpoints, timeout }
    }

    /// Unix socket first (when configured), then `host:port`.
    pub fn from_config(config: &Config) -> Self {
        let mut endpoints = Vec::new();
        if let Some(ref socket) = config.clamav_socket {
            endpoints.push(ClamdEndpoint::Socket(PathBuf::from(socket)));
        }
        endpoints.push(ClamdEndpoint::Tcp(format!(
            "{}:{}",
            config.clamav_host, config.clamav_port
        )));
        Self::new(endpoints, config.clamav_timeout())
    }

    pub fn endpoints(&self) -> &[ClamdEndpoint] {
        &self.endpoints
    }

    async fn blocking<T, F>(&self, operation: &'static str, call: F) -> Result<T, ScanClientError>
    where
        F: FnOnce() -> io::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        match tokio::time::timeout(self.timeout, tokio::task::spawn_blocking(call)).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(e))) if is_timeout(&e) => Err(ScanClientError::Timeout {
                operation,
                limit: self.timeout,
            }),
            Ok(Ok(Err(e))) => Err(ScanClientError::Io {
                operation,
                message: e.to_string(),
            }),
            Ok(Err(join)) => Err(ScanClientError::TaskFailed(join.to_string())),
            Err(_) => Err(ScanClientError::Timeout {
                operation,
                limit: self.timeout,
            }),
        }
    }

    /// First endpoint that answers PING.
    pub async fn connect(&self) -> Result<ClamdEndpoint, ScanClientError> {
        let mut failures = Vec::new();

        for endpoint in &self.endpoints {
            if let ClamdEndpoint::Socket(path) = endpoint {
                if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                    failures.push(format!("{}: socket not found", endpoint));
                    continue;
                }
            }

            let target = endpoint.clone();
            let timeout = self.timeout;
            match self.blocking("ping", move || target.ping(timeout)).await {
                Ok(reply) if reply.as_slice() == clamav_client::PONG => {
                    tracing::debug!(endpoint = %endpoint, "Connected to ClamAV");
                    return Ok(endpoint.clone());
                }
                Ok(reply) => failures.push(format!(
                    "{}: unexpected ping reply {:?}",
                    endpoint,
                    String::from_utf8_lossy(&reply)
                )),
                Err(ScanClientError::Timeout { .. }) => {
                    failures.push(format!("{}: ping timeout", endpoint))
                }
                Err(e) => failures.push(format!("{}: {}", endpoint, e)),
            }
        }

        Err(ScanClientError::Unavailable(failures.join("; ")))
    }

    /// Engine version string reported by the daemon.
    pub async fn version(&self) -> Result<String, ScanClientError> {
        let endpoint = self.connect().await?;
        self.version_at(&endpoint).await
    }

    async fn version_at(&self, endpoint: &ClamdEndpoint) -> Result<String, ScanClientError> {
        let target = endpoint.clone();
        let timeout = self.timeout;
        let reply = self
            .blocking("version", move || target.version(timeout))
            .await?;
        parse_version(&reply)
            .ok_or_else(|| ScanClientError::Protocol(String::from_utf8_lossy(&reply).to_string()))
    }

    async fn scan_with(
        &self,
        endpoint: &ClamdEndpoint,
        path: &Path,
    ) -> Result<Detection, ScanClientError> {
        let target = endpoint.clone();
        let file = path.to_path_buf();
        let timeout = self.timeout;
        let reply = self
            .blocking("scan", move || target.scan_file(&file, timeout))
            .await?;
        parse_scan_response(&reply)
    }
}

#[async_trait]
impl VirusScanner for ClamAVService {
    fn name(&self) -> &'static str {
        "clamav"
    }

    async fn probe(&self) -> bool {
        self.connect().await.is_ok()
    }

    async fn scan(&self, path: &Path) -> ScanOutcome {
        let start = Instant::now();

        let endpoint = match self.connect().await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                tracing::error!(error = %e, "ClamAV unavailable");
                return ScanOutcome::error(e.to_string())
                    .with_duration_secs(start.elapsed().as_secs_f64());
            }
        };

        // Informational only; a failing VERSION never fails the scan.
        let engine_version = match self.version_at(&endpoint).await {
            Ok(version) => Some(version),
            Err(e) => {
                tracing::debug!(error = %e, "ClamAV version unavailable");
                None
            }
        };

        let outcome = match self.scan_with(&endpoint, path).await {
            Ok(Detection::Clean) => {
                tracing::info!(
                    duration_ms = start.elapsed().as_millis(),
                    "File scan completed: clean"
                );
                ScanOutcome::clean()
            }
            Ok(Detection::Detected(signature)) => {
                tracing::warn!(
                    duration_ms = start.elapsed().as_millis(),
                    virus = %signature,
                    "File scan detected virus"
                );
                ScanOutcome::infected(signature)
            }
            Err(e) => {
                tracing::error!(error = %e, endpoint = %endpoint, "ClamAV scan failed");
                ScanOutcome::error(e.to_string())
            }
        };

        outcome
            .with_duration_secs(start.elapsed().as_secs_f64())
            .with_engine_version(engine_version)
    }
}

#[cfg(test)]
pub(crate) mod fake_clamd {
    //! Minimal clamd speaking PING, VERSION and INSTREAM over TCP.

    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    pub const EICAR_MARKER: &[u8] = b"EICAR";

    #[derive(Clone, Copy)]
    pub enum Behaviour {
        Normal,
        /// Accept connections and never answer
        Silent,
        /// Answer every scan with a daemon error
        ScanError,
    }

    fn read_command(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
        let mut command = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            stream.read_exact(&mut byte)?;
            if byte[0] == 0 {
                return Ok(command);
            }
            command.push(byte[0]);
        }
    }

    fn read_instream(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
        let mut data = Vec::new();
        loop {
            let mut len = [0u8; 4];
            stream.read_exact(&mut len)?;
            let len = u32::from_be_bytes(len) as usize;
            if len == 0 {
                return Ok(data);
            }
            let mut chunk = vec![0u8; len];
            stream.read_exact(&mut chunk)?;
            data.extend_from_slice(&chunk);
        }
    }

    fn handle(mut stream: TcpStream, behaviour: Behaviour) -> std::io::Result<()> {
        let command = read_command(&mut stream)?;
        if let Behaviour::Silent = behaviour {
            thread::sleep(std::time::Duration::from_secs(5));
            return Ok(());
        }

        let reply: Vec<u8> = match command.as_slice() {
            b"zPING" => b"PONG\0".to_vec(),
            b"zVERSION" => b"ClamAV 1.0.5/27100/Mon Jan  6 09:00:00 2025\0".to_vec(),
            b"zINSTREAM" => {
                let data = read_instream(&mut stream)?;
                match behaviour {
                    Behaviour::ScanError => b"INSTREAM size limit exceeded. ERROR\0".to_vec(),
                    _ if data.windows(EICAR_MARKER.len()).any(|w| w == EICAR_MARKER) => {
                        b"stream: EICAR-Test FOUND\0".to_vec()
                    }
                    _ => b"stream: OK\0".to_vec(),
                }
            }
            _ => b"UNKNOWN COMMAND\0".to_vec(),
        };
        stream.write_all(&reply)?;
        stream.flush()
    }

    /// Start a fake daemon on an ephemeral port and return `host:port`.
    pub fn spawn(behaviour: Behaviour) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                thread::spawn(move || {
                    let _ = handle(stream, behaviour);
                });
            }
        });
        address
    }

    /// An address nothing listens on.
    pub fn closed_address() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);
        address
    }
}

#[cfg(test)]
mod tests {
    use super::fake_clamd::{self, Behaviour};
    use super::*;
    use scanvault_core::ScanVerdict;
    use tempfile::NamedTempFile;

    fn client(address: String, timeout: Duration) -> ClamAVService {
        ClamAVService::new(vec![ClamdEndpoint::Tcp(address)], timeout)
    }

    fn file_with(contents: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, contents).unwrap();
        file
    }

    #[test]
    fn test_parse_ok_and_found() {
        assert_eq!(parse_scan_response(b"stream: OK\0").unwrap(), Detection::Clean);
        assert_eq!(
            parse_scan_response(b"stream: Eicar-Signature FOUND\0").unwrap(),
            Detection::Detected("Eicar-Signature".to_string())
        );
        assert_eq!(
            parse_scan_response(b"/tmp/a: b.txt: Win.Test.EICAR_HDB-1 FOUND\n").unwrap(),
            Detection::Detected("Win.Test.EICAR_HDB-1".to_string())
        );
    }

    #[test]
    fn test_parse_rejects_everything_else() {
        assert!(matches!(
            parse_scan_response(b"INSTREAM size limit exceeded. ERROR\0"),
            Err(ScanClientError::Daemon(_))
        ));
        assert!(matches!(
            parse_scan_response(b"stream: lstat() failed ERROR"),
            Err(ScanClientError::Daemon(_))
        ));
        assert!(matches!(
            parse_scan_response(b""),
            Err(ScanClientError::Protocol(_))
        ));
        assert!(matches!(
            parse_scan_response(&[0xff, 0xfe, 0x00]),
            Err(ScanClientError::Protocol(_))
        ));
        assert!(matches!(
            parse_scan_response(b"stream:  FOUND"),
            Err(ScanClientError::Protocol(_))
        ));
        assert!(matches!(
            parse_scan_response(b"PONG"),
            Err(ScanClientError::Protocol(_))
        ));
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(
            parse_version(b"ClamAV 1.0.5/27100/Mon Jan  6 09:00:00 2025\0").as_deref(),
            Some("ClamAV 1.0.5")
        );
        assert_eq!(parse_version(b"\0"), None);
    }

    #[test]
    fn test_from_config_prefers_socket() {
        let config = Config::default();
        let service = ClamAVService::from_config(&config);
        assert_eq!(
            service.endpoints(),
            &[
                ClamdEndpoint::Socket(PathBuf::from("/var/run/clamav/clamd.ctl")),
                ClamdEndpoint::Tcp("localhost:3310".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_probe_and_version_against_daemon() {
        let service = client(fake_clamd::spawn(Behaviour::Normal), Duration::from_secs(5));
        assert!(service.probe().await);
        assert_eq!(service.version().await.unwrap(), "ClamAV 1.0.5");
    }

    #[tokio::test]
    async fn test_scan_clean_file() {
        let service = client(fake_clamd::spawn(Behaviour::Normal), Duration::from_secs(5));
        let file = file_with(b"hello, this file is harmless");

        let outcome = service.scan(file.path()).await;
        assert_eq!(outcome.status, ScanVerdict::Clean);
        assert!(outcome.threats.is_empty());
        assert_eq!(outcome.engine_version.as_deref(), Some("ClamAV 1.0.5"));
    }

    #[tokio::test]
    async fn test_scan_infected_file() {
        let service = client(fake_clamd::spawn(Behaviour::Normal), Duration::from_secs(5));
        let file = file_with(b"X5O!P%@AP[4\\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!");

        let outcome = service.scan(file.path()).await;
        assert_eq!(outcome.status, ScanVerdict::Infected);
        assert_eq!(outcome.threats, vec!["EICAR-Test".to_string()]);
    }

    #[tokio::test]
    async fn test_daemon_error_becomes_error_outcome() {
        let service = client(
            fake_clamd::spawn(Behaviour::ScanError),
            Duration::from_secs(5),
        );
        let file = file_with(b"anything");

        let outcome = service.scan(file.path()).await;
        assert_eq!(outcome.status, ScanVerdict::Error);
        assert!(outcome
            .error_detail
            .unwrap()
            .contains("size limit exceeded"));
    }

    #[tokio::test]
    async fn test_unreachable_daemon_is_error_not_clean() {
        let service = client(fake_clamd::closed_address(), Duration::from_secs(2));
        let file = file_with(b"anything");

        assert!(!service.probe().await);
        let outcome = service.scan(file.path()).await;
        assert_eq!(outcome.status, ScanVerdict::Error);
        assert!(outcome.error_detail.unwrap().contains("unavailable"));
    }

    #[tokio::test]
    async fn test_silent_daemon_times_out() {
        let service = client(
            fake_clamd::spawn(Behaviour::Silent),
            Duration::from_millis(200),
        );
        let file = file_with(b"anything");

        let outcome = service.scan(file.path()).await;
        assert_eq!(outcome.status, ScanVerdict::Error);
        assert!(outcome.error_detail.unwrap().contains("timeout"));
    }

    #[test]
    fn test_silent_daemon_releases_blocking_call() {
        let endpoint = ClamdEndpoint::Tcp(fake_clamd::spawn(Behaviour::Silent));
        let start = Instant::now();

        let err = endpoint.ping(Duration::from_millis(200)).unwrap_err();

        assert!(is_timeout(&err), "unexpected error kind: {:?}", err.kind());
        assert!(start.elapsed() < Duration::from_secs(3));
    }
}
