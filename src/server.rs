//! The server loop: bounded accept wait, idle-time housekeeping, and one
//! client served to completion at a time.
//!
//! ```text
//! Idle/Polling -> Accepting -> ReadingRequest -> Routing -> Sending -> Idle/Polling
//! ```
//!
//! Any fault while accepting, reading or sending is logged, the connection is
//! dropped, and the loop goes back to idle. Nothing a client does can end it.

use std::io;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpSocket};
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn, Instrument};

use crate::collaborators::{poll, Collaborators};
use crate::csv_log::CsvLog;
use crate::errors::ConnectionFault;
use crate::extremes::RunningExtremes;
use crate::http::{
    read_request, DashboardTemplate, DashboardView, ExtremesView, ReadingsView, Request,
    Response, ResponseBuilder, Route, Runtime,
};
use crate::models::SensorReadings;
use crate::Config;

// ---

/// Pause after a failed accept so a persistent socket error cannot spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Format of the dashboard clock line, e.g. `6-14-2025 9:30:00 AM`.
const DISPLAY_TIME_FORMAT: &str = "%-m-%-d-%Y %-I:%M:%S %p";

/// Everything the loop mutates, owned in one place.
#[derive(Debug, Clone)]
pub struct ServerState {
    // ---
    /// Epoch seconds at startup, for the runtime counter.
    pub started_at: i64,

    /// Last good snapshot, kept across failed polls.
    pub latest: Option<SensorReadings>,

    pub extremes: RunningExtremes,

    /// Epoch seconds of the last successful CSV append.
    pub last_sample_at: i64,

    /// Epoch seconds of the last poll attempt, successful or not.
    pub last_poll_at: Option<i64>,
}

impl ServerState {
    // ---
    pub fn new(started_at: i64) -> Self {
        // ---
        ServerState {
            started_at,
            latest: None,
            extremes: RunningExtremes::new(),
            last_sample_at: started_at,
            last_poll_at: None,
        }
    }

    /// Adopt a good reading as the current snapshot and widen the extremes.
    pub fn record(&mut self, readings: SensorReadings) {
        // ---
        self.extremes.observe(&readings);
        self.latest = Some(readings);
    }

    pub fn poll_due(&self, now: i64, interval_secs: i64) -> bool {
        // ---
        self.last_poll_at
            .map_or(true, |last| now - last >= interval_secs)
    }

    pub fn sample_due(&self, now: i64, interval_secs: i64) -> bool {
        // ---
        now - self.last_sample_at > interval_secs
    }

    /// The latest snapshot, only if it came from the most recent poll attempt.
    ///
    /// After a failed poll the kept snapshot is stale and must not be logged
    /// under the current time.
    pub fn fresh_reading(&self) -> Option<&SensorReadings> {
        // ---
        let latest = self.latest.as_ref()?;
        (self.last_poll_at == Some(latest.timestamp.timestamp())).then_some(latest)
    }

    pub fn runtime(&self, now: i64) -> Runtime {
        // ---
        Runtime::from_secs(now - self.started_at)
    }
}

/// The dashboard server. Owns the listener, the collaborators and all state.
pub struct Server {
    listener: TcpListener,
    config: Config,
    collaborators: Collaborators,
    log: CsvLog,
    template: DashboardTemplate,
    state: ServerState,
}

impl Server {
    // ---
    /// Bind the listening socket with `SO_REUSEADDR` and the configured backlog.
    pub async fn bind(config: Config, collaborators: Collaborators) -> Result<Self> {
        // ---
        let addr = SocketAddr::new(config.bind_addr, config.port);
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .context("Failed to create listening socket")?;
        socket.set_reuseaddr(true)?;
        socket
            .bind(addr)
            .with_context(|| format!("Failed to bind {}", addr))?;
        let listener = socket
            .listen(config.listen_backlog)
            .with_context(|| format!("Failed to listen on {}", addr))?;

        let template = DashboardTemplate::new().context("Dashboard template is invalid")?;
        let log = CsvLog::new(&config.log_path);
        let started_at = collaborators.clock.now().timestamp();

        Ok(Server {
            listener,
            config,
            collaborators,
            log,
            template,
            state: ServerState::new(started_at),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        // ---
        self.listener.local_addr()
    }

    pub fn state(&self) -> &ServerState {
        // ---
        &self.state
    }

    /// Serve forever.
    pub async fn run(mut self) {
        // ---
        info!("Listening for connections...");
        loop {
            self.turn().await;
        }
    }

    /// One pass of the loop: housekeeping, then wait up to `accept_wait` for a
    /// client and serve it if one arrives.
    pub async fn turn(&mut self) {
        // ---
        self.housekeeping();

        match timeout(self.config.accept_wait, self.listener.accept()).await {
            Err(_idle) => {}
            Ok(Err(e)) => {
                warn!(error = %ConnectionFault::Accept(e), "Error receiving request");
                sleep(ACCEPT_ERROR_BACKOFF).await;
            }
            Ok(Ok((stream, peer))) => {
                let span = tracing::info_span!("connection", %peer);
                self.serve(stream).instrument(span).await;
            }
        }
    }

    async fn serve<S>(&mut self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        // ---
        let budget = self.config.socket_timeout;
        let result = match timeout(budget, self.handle_connection(stream)).await {
            Ok(result) => result,
            Err(_) => Err(ConnectionFault::TimedOut("connection")),
        };
        self.collaborators.indicator.off();

        match result {
            Ok(()) => debug!("Successfully sent response"),
            Err(e) => warn!(error = %e, "Dropping connection"),
        }
    }

    async fn handle_connection<S>(&mut self, stream: S) -> Result<(), ConnectionFault>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        // ---
        self.collaborators.indicator.on();
        let mut stream = BufReader::new(stream);
        let request = read_request(&mut stream).await?;
        self.collaborators.indicator.off();

        let response = self.respond(&request);

        self.collaborators.indicator.on();
        stream
            .write_all(&response.to_bytes())
            .await
            .map_err(ConnectionFault::Send)?;
        stream.flush().await.map_err(ConnectionFault::Send)?;
        stream
            .get_mut()
            .shutdown()
            .await
            .map_err(ConnectionFault::Send)?;
        Ok(())
    }

    /// Route `request` and build its response.
    pub fn respond(&mut self, request: &Request) -> Response {
        // ---
        match Route::resolve(request) {
            Route::Dashboard => {
                debug!("Incoming connection, sending dashboard");
                let now = self.collaborators.clock.now();
                self.poll_sensor(now);
                self.sample_if_due(now);
                let view = self.dashboard_view(now);
                self.builder().dashboard(&view)
            }
            Route::Resource(resource) => {
                info!(path = %request.path, "Resource requested");
                self.builder().resource(resource)
            }
        }
    }

    fn builder(&self) -> ResponseBuilder<'_> {
        // ---
        ResponseBuilder::new(&self.log, self.collaborators.blobs.as_ref(), &self.template)
    }

    /// Idle-time work: re-poll the sensor when due, then check the sample timer.
    fn housekeeping(&mut self) {
        // ---
        let now = self.collaborators.clock.now();
        if self
            .state
            .poll_due(now.timestamp(), self.config.poll_interval_secs)
        {
            self.poll_sensor(now);
        }
        self.sample_if_due(now);
    }

    fn poll_sensor(&mut self, now: DateTime<FixedOffset>) {
        // ---
        self.state.last_poll_at = Some(now.timestamp());
        match poll(
            self.collaborators.sensor.as_mut(),
            self.config.warmup_reads,
            now,
        ) {
            Ok(readings) => {
                debug!(
                    temperature_c = readings.temperature_c,
                    temperature_f = readings.temperature_f,
                    humidity_pct = readings.humidity_pct,
                    pressure_hpa = readings.pressure_hpa,
                    gas_kohm = readings.gas_kohm,
                    aqi = readings.aqi,
                    "Sensor polled"
                );
                self.state.record(readings);
            }
            Err(e) => warn!(error = %e, "Sensor fault, keeping last good snapshot"),
        }
    }

    /// Append the latest snapshot to the log once the sample interval has passed.
    ///
    /// Only a reading from the most recent poll is logged. The timer only
    /// advances on success, so a skipped or failed write is retried on the next
    /// tick.
    fn sample_if_due(&mut self, now: DateTime<FixedOffset>) {
        // ---
        let epoch = now.timestamp();
        if !self
            .state
            .sample_due(epoch, self.config.sample_interval_secs)
        {
            return;
        }
        let Some(readings) = self.state.fresh_reading() else {
            debug!("Sample interval elapsed but the last poll failed, deferring");
            return;
        };

        info!(path = %self.log.path().display(), "Writing sensor values to csv");
        match self.log.append(readings, now) {
            Ok(()) => {
                self.state.last_sample_at = epoch;
                info!("Done.");
            }
            Err(e) => warn!(error = %e, "CSV append failed, retrying on next tick"),
        }
    }

    fn dashboard_view(&self, now: DateTime<FixedOffset>) -> DashboardView {
        // ---
        DashboardView {
            title: self.config.site_title.clone(),
            refresh_secs: self.config.refresh_secs,
            refresh_url: self.config.refresh_url.clone(),
            readings: self.state.latest.as_ref().map(ReadingsView::from),
            extremes: ExtremesView::from(&self.state.extremes.snapshot()),
            download_token: now.timestamp(),
            local_time: now.format(DISPLAY_TIME_FORMAT).to_string(),
            runtime: self.state.runtime(now.timestamp()),
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::collaborators::{Clock, DirBlobStore, LogIndicator, Sensor};
    use crate::errors::SensorFault;
    use crate::extremes::{Metric, MinMax};
    use crate::models::RawReading;
    use chrono::TimeZone;
    use std::fs;
    use std::net::{IpAddr, Ipv4Addr};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;

    const START: i64 = 1_718_357_400;

    struct ManualClock(Arc<AtomicI64>);

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<FixedOffset> {
            // ---
            FixedOffset::east_opt(0)
                .unwrap()
                .timestamp_opt(self.0.load(Ordering::SeqCst), 0)
                .unwrap()
        }
    }

    struct SwitchedSensor(Arc<AtomicBool>);

    impl Sensor for SwitchedSensor {
        fn read(&mut self) -> Result<RawReading, SensorFault> {
            // ---
            if self.0.load(Ordering::SeqCst) {
                return Err(SensorFault::Read("no ack from sensor".into()));
            }
            Ok(RawReading {
                temperature_c: 21.0,
                humidity_pct: 45.0,
                pressure_hpa: 1013.25,
                gas_ohms: 10_000.0,
            })
        }
    }

    struct Fixture {
        server: Server,
        clock: Arc<AtomicI64>,
        failing: Arc<AtomicBool>,
    }

    impl Fixture {
        fn advance(&self, secs: i64) {
            self.clock.fetch_add(secs, Ordering::SeqCst);
        }
    }

    async fn fixture(dir: &Path, log_path: PathBuf) -> Fixture {
        // ---
        let static_dir = dir.join("static");
        fs::create_dir_all(&static_dir).unwrap();
        fs::write(static_dir.join("favicon.ico"), b"ICO").unwrap();

        let config = Config {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            log_path,
            static_dir: static_dir.clone(),
            sample_interval_secs: 60,
            poll_interval_secs: 10,
            accept_wait: Duration::from_millis(10),
            socket_timeout: Duration::from_secs(1),
            warmup_reads: 1,
            ..Config::default()
        };
        let clock = Arc::new(AtomicI64::new(START));
        let failing = Arc::new(AtomicBool::new(false));
        let collaborators = Collaborators {
            sensor: Box::new(SwitchedSensor(failing.clone())),
            clock: Box::new(ManualClock(clock.clone())),
            blobs: Box::new(DirBlobStore::new(static_dir)),
            indicator: Box::new(LogIndicator::default()),
        };

        Fixture {
            server: Server::bind(config, collaborators).await.unwrap(),
            clock,
            failing,
        }
    }

    fn rows(path: &Path) -> Vec<String> {
        // ---
        fs::read_to_string(path)
            .unwrap()
            .split("\r\n")
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect()
    }

    fn readings(temp_f: f64, humidity: f64) -> SensorReadings {
        // ---
        SensorReadings {
            temperature_c: (temp_f - 32.0) * 5.0 / 9.0,
            temperature_f: temp_f,
            humidity_pct: humidity,
            pressure_hpa: 1013.0,
            gas_kohm: 10.0,
            aqi: 2.3,
            timestamp: FixedOffset::east_opt(0)
                .unwrap()
                .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_sample_timer_is_strictly_greater() {
        // ---
        let state = ServerState::new(1_000);
        assert!(!state.sample_due(1_000, 60));
        assert!(!state.sample_due(1_060, 60));
        assert!(state.sample_due(1_061, 60));
    }

    #[test]
    fn test_poll_due() {
        // ---
        let mut state = ServerState::new(1_000);
        assert!(state.poll_due(1_000, 10));
        state.last_poll_at = Some(1_000);
        assert!(!state.poll_due(1_009, 10));
        assert!(state.poll_due(1_010, 10));
    }

    #[test]
    fn test_record_feeds_extremes() {
        // ---
        let mut state = ServerState::new(0);
        state.record(readings(70.0, 45.0));
        state.record(readings(68.0, 50.0));

        assert_eq!(state.latest.as_ref().unwrap().temperature_f, 68.0);
        assert_eq!(
            state.extremes.get(Metric::TemperatureF),
            Some(MinMax { min: 68.0, max: 70.0 })
        );
        assert_eq!(
            state.extremes.get(Metric::Humidity),
            Some(MinMax { min: 45.0, max: 50.0 })
        );
    }

    #[test]
    fn test_runtime_counts_from_start() {
        // ---
        let state = ServerState::new(1_000);
        let runtime = state.runtime(1_000 + 2 * 86_400 + 3 * 3_600 + 4 * 60 + 5);
        assert_eq!(
            runtime,
            Runtime {
                days: 2,
                hours: 3,
                minutes: 4,
                seconds: 5
            }
        );
    }

    #[test]
    fn test_fresh_reading_requires_last_poll_to_succeed() {
        // ---
        let mut state = ServerState::new(0);
        assert!(state.fresh_reading().is_none());

        let sample = readings(70.0, 45.0);
        let polled_at = sample.timestamp.timestamp();
        state.last_poll_at = Some(polled_at);
        state.record(sample);
        assert!(state.fresh_reading().is_some());

        // a later attempt failed: the snapshot is kept but no longer fresh
        state.last_poll_at = Some(polled_at + 10);
        assert!(state.latest.is_some());
        assert!(state.fresh_reading().is_none());
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_not_sampled() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("stats.csv");
        let mut f = fixture(dir.path(), log_path.clone()).await;

        f.server.turn().await;
        assert!(f.server.state().latest.is_some());

        f.failing.store(true, Ordering::SeqCst);
        f.advance(7_200);
        f.server.turn().await;

        assert!(!log_path.exists(), "stale snapshot was logged");
        assert_eq!(f.server.state().last_sample_at, START);
        assert_eq!(f.server.state().last_poll_at, Some(START + 7_200));

        // the sensor recovers: the next due poll is logged with its own time
        f.failing.store(false, Ordering::SeqCst);
        f.advance(10);
        f.server.turn().await;

        let rows = rows(&log_path);
        assert_eq!(rows.len(), 2);
        assert!(rows[1].starts_with("14-6-2024,11:30:10,21.00,69.80,"));
        assert_eq!(f.server.state().last_sample_at, START + 7_210);
    }

    #[tokio::test]
    async fn test_failed_append_is_retried_on_next_tick() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let log_path = log_dir.join("stats.csv");
        let mut f = fixture(dir.path(), log_path.clone()).await;

        f.server.turn().await;
        f.advance(61);
        f.server.turn().await;

        // parent directory is missing, so the append fails
        assert!(!log_path.exists());
        assert_eq!(f.server.state().last_sample_at, START);

        fs::create_dir(&log_dir).unwrap();
        f.advance(1);
        f.server.turn().await;

        let rows = rows(&log_path);
        assert_eq!(rows.len(), 2, "header plus the retried row");
        assert_eq!(rows[0], "date,time,Temp_C,Temp_F,Humidity,Pressure,Gas,AQI");
        assert!(rows[1].starts_with("14-6-2024,9:31:02,"));
        assert_eq!(f.server.state().last_sample_at, START + 62);
    }

    #[tokio::test]
    async fn test_send_failure_does_not_block_next_client() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let mut f = fixture(dir.path(), dir.path().join("stats.csv")).await;

        // client A disconnects while the response is being written
        let client_a = tokio_test::io::Builder::new()
            .read(b"GET /favicon.ico HTTP/1.1\r\nHost: tent\r\n\r\n")
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away"))
            .build();
        let err = f.server.handle_connection(client_a).await.unwrap_err();
        assert!(matches!(err, ConnectionFault::Send(_)));

        // client B is served in full afterwards
        let (mut client_b, conn) = tokio::io::duplex(4096);
        client_b
            .write_all(b"GET /favicon.ico HTTP/1.1\r\n\r\n")
            .await
            .unwrap();
        f.server.serve(conn).await;

        let mut response = Vec::new();
        client_b.read_to_end(&mut response).await.unwrap();
        assert_eq!(
            response,
            b"HTTP/1.1 200 OK\r\nContent-type: image/x-icon\r\nCache-Control: max-age=604800\r\n\r\nICO"
        );
    }
}
