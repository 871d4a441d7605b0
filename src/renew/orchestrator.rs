///! The renewal workflow state machine.
///!
///! Drives one complete run: login, hostname discovery, the per-host renewal
///! loop, the expiration rescrape, and next-run scheduling. Any uncaught
///! failure lands in the top-level handler, which reports the failed run to
///! the scheduler sink and maps it to the proper exit code.

use std::time::Duration;

use chrono::{Datelike, Local};

use crate::config::{Credentials, DebugLevel, Settings};
use crate::session::{Locator, SessionError, WebSession};

use super::reporter::{
    EXIT_OK, EXIT_REPORTED_FAILURE, EXIT_RUN_FAILED, ScheduleSink, WILDCARD,
};
use super::schedule;
use super::scraper::{self, HostScraper};
use super::types::{Host, RenewError, RunOutcome};

// Login controls are scoped to the login form so unrelated page controls
// can never match.
fn username_field() -> Locator {
    Locator::css("form#clogs input[name='username']")
}

fn password_field() -> Locator {
    Locator::css("form#clogs input[name='password']")
}

fn login_submit() -> Locator {
    Locator::css("form#clogs button[type='submit']")
}

pub struct RenewalOrchestrator<S, R> {
    session: S,
    reporter: R,
    credentials: Credentials,
    debug: DebugLevel,
    settings: Settings,
}

impl<S: WebSession, R: ScheduleSink> RenewalOrchestrator<S, R> {
    pub fn new(
        session: S,
        reporter: R,
        credentials: Credentials,
        debug: DebugLevel,
        settings: Settings,
    ) -> Self {
        Self {
            session,
            reporter,
            credentials,
            debug,
            settings,
        }
    }

    /// Execute one run and map its outcome to a process exit code.
    ///
    /// The scheduler sink is notified exactly once on every path, and the
    /// session is dropped with `self` regardless of where the run stopped.
    pub async fn run(self) -> u8 {
        tracing::info!("Debug level: {}", self.debug);
        match self.execute().await {
            Ok(outcome) if outcome.succeeded => EXIT_OK,
            Ok(_) => EXIT_REPORTED_FAILURE,
            Err(e) => {
                tracing::error!("Renewal run failed: {e}");
                self.session.snapshot("exception").await;
                self.reporter.notify(WILDCARD, WILDCARD, false);
                EXIT_RUN_FAILED
            }
        }
    }

    async fn execute(&self) -> Result<RunOutcome, RenewError> {
        self.login().await?;
        tokio::time::sleep(Duration::from_secs(1)).await;
        self.renew_hosts().await
    }

    /// Open the login surface and submit the credential form. A missing
    /// control aborts the run; login cannot be partially satisfied.
    async fn login(&self) -> Result<(), RenewError> {
        self.open_page(&self.settings.login_url).await?;
        self.checkpoint("debug1").await;

        tracing::info!("Logging in...");
        let username = self.session.find_one(&username_field())?;
        let password_input = self.session.find_one(&password_field())?;
        self.session.type_text(&username, &self.credentials.username)?;
        let password = self
            .credentials
            .decode_password()
            .map_err(RenewError::BadCredentials)?;
        self.session.type_text(&password_input, &password)?;
        let submit = self.session.find_one(&login_submit())?;
        self.session.click(&submit)?;

        tokio::time::sleep(Duration::from_secs(1)).await;
        self.checkpoint("debug2").await;
        Ok(())
    }

    /// Discovery, the renewal loop, the expiration rescrape and scheduling.
    async fn renew_hosts(&self) -> Result<RunOutcome, RenewError> {
        let scraper = HostScraper::new(&self.session);

        self.open_page(&self.settings.dns_records_url).await?;
        tokio::time::sleep(Duration::from_secs(1)).await;

        // Capture names up front: navigation invalidates element handles,
        // and the same captured order drives every later phase.
        let mut hosts: Vec<Host> = scraper
            .host_names()?
            .into_iter()
            .map(Host::new)
            .collect();

        let mut renewed = 0;
        for host in &hosts {
            self.open_page(&self.settings.dns_records_url).await?;
            tokio::time::sleep(Duration::from_secs(1)).await;
            self.renew_host(&scraper, &host.name).await?;
            renewed += 1;
        }

        self.open_page(&self.settings.hosts_url).await?;
        tokio::time::sleep(Duration::from_secs(3)).await;
        self.session.snapshot("results").await;
        tracing::info!("Confirmed hosts: {renewed}");

        for (iteration, host) in hosts.iter_mut().enumerate() {
            host.expiration_days = Some(scraper.expiration_days(&host.name, iteration)?);
        }

        let counts: Vec<u32> = hosts.iter().filter_map(|h| h.expiration_days).collect();
        let today = Local::now().date_naive();
        let next_run =
            schedule::next_run_date(today, &counts).ok_or(RenewError::NoExpirations)?;

        tracing::info!("Next renewal run scheduled for {next_run}");
        self.reporter
            .notify(&next_run.day().to_string(), &next_run.month().to_string(), true);

        Ok(RunOutcome {
            renewed_count: renewed,
            next_run_date: Some(next_run),
            succeeded: true,
        })
    }

    /// One host's renewal: its Modify control, then the update confirmation.
    /// Any failure here aborts the whole run; there is no per-host isolation.
    async fn renew_host(
        &self,
        scraper: &HostScraper<'_, S>,
        host_name: &str,
    ) -> Result<(), RenewError> {
        tracing::info!("Updating {host_name}");
        let modify = scraper.modify_control(host_name)?;
        self.session.click(&modify)?;
        tokio::time::sleep(Duration::from_secs(3)).await;

        let confirm = self.session.find_one(&scraper::confirm_control())?;
        self.session.click(&confirm)?;
        tokio::time::sleep(Duration::from_secs(1)).await;

        self.session.snapshot(&format!("{host_name}_success")).await;
        Ok(())
    }

    /// Open a page, treating a load timeout as recoverable: if the page
    /// truly never loaded, the next element lookup surfaces the failure.
    async fn open_page(&self, url: &str) -> Result<(), RenewError> {
        match self.session.open(url).await {
            Err(SessionError::NavigationTimeout { url }) => {
                tracing::warn!("Timeout loading {url}");
                self.session.snapshot("timeout").await;
                Ok(())
            }
            other => Ok(other?),
        }
    }

    /// Snapshot capture gated behind the debug level.
    async fn checkpoint(&self, label: &str) {
        if self.debug.snapshots_enabled() {
            self.session.snapshot(label).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::{Arc, Mutex};

    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use chrono::{Duration, Local};

    use crate::session::testing::{FakeHost, FakeSession};

    use super::*;

    struct RecordingSink {
        calls: Arc<Mutex<Vec<(String, String, bool)>>>,
    }

    impl ScheduleSink for RecordingSink {
        fn notify(&self, day: &str, month: &str, success: bool) {
            self.calls
                .lock()
                .unwrap()
                .push((day.to_string(), month.to_string(), success));
        }
    }

    fn orchestrator(
        session: FakeSession,
    ) -> (
        RenewalOrchestrator<FakeSession, RecordingSink>,
        Arc<Mutex<Vec<(String, String, bool)>>>,
    ) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            calls: calls.clone(),
        };
        let credentials = Credentials::new("alice", BASE64.encode("hunter2"));
        let orchestrator = RenewalOrchestrator::new(
            session,
            sink,
            credentials,
            DebugLevel::new(1),
            Settings::default(),
        );
        (orchestrator, calls)
    }

    fn expected_next_run(min_days: u32) -> (String, String) {
        let date = Local::now().date_naive()
            + Duration::days(min_days as i64 - schedule::SAFETY_MARGIN_DAYS);
        (date.day().to_string(), date.month().to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_run_notifies_scheduler_once() {
        let session = FakeSession::new(vec![
            FakeHost::new("a.example.com", Some("Expires in 30 days")),
            FakeHost::new("b.example.com", Some("Expires in 12 days")),
        ]);
        let (orchestrator, calls) = orchestrator(session);

        assert_eq!(orchestrator.run().await, EXIT_OK);

        let calls = calls.lock().unwrap();
        let (day, month) = expected_next_run(12);
        assert_eq!(calls.as_slice(), &[(day, month, true)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hosts_are_processed_in_captured_order() {
        let session = FakeSession::new(vec![
            FakeHost::new("a.example.com", Some("Expires in 30 days")),
            FakeHost::new("b.example.com", Some("Expires in 12 days")),
        ]);
        let events = session.events.clone();
        let (orchestrator, _calls) = orchestrator(session);

        assert_eq!(orchestrator.run().await, EXIT_OK);

        let events = events.lock().unwrap();
        let renewals: Vec<&String> = events
            .iter()
            .filter(|e| e.starts_with("click:modify:"))
            .collect();
        assert_eq!(
            renewals,
            ["click:modify:a.example.com", "click:modify:b.example.com"]
        );
        let rescrapes: Vec<&String> = events
            .iter()
            .filter(|e| e.starts_with("read-expiration:"))
            .collect();
        assert_eq!(
            rescrapes,
            ["read-expiration:a.example.com", "read-expiration:b.example.com"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_types_decoded_credentials() {
        let session = FakeSession::new(vec![FakeHost::new(
            "a.example.com",
            Some("Expires in 30 days"),
        )]);
        let events = session.events.clone();
        let (orchestrator, _calls) = orchestrator(session);

        assert_eq!(orchestrator.run().await, EXIT_OK);

        let events = events.lock().unwrap();
        assert!(events.contains(&"type:username:alice".to_string()));
        assert!(events.contains(&"type:password:hunter2".to_string()));
        assert!(events.contains(&"click:submit".to_string()));
        // Level 1 logs but never captures the gated checkpoints.
        assert!(!events.contains(&"snapshot:debug1".to_string()));
        assert!(!events.contains(&"snapshot:debug2".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_host_table_is_fatal() {
        let session = FakeSession::new(Vec::new());
        let (orchestrator, calls) = orchestrator(session);

        assert_eq!(orchestrator.run().await, EXIT_RUN_FAILED);

        let calls = calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            &[("*".to_string(), "*".to_string(), false)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_host_renewal_failure_aborts_the_run() {
        let mut failing = FakeHost::new("b.example.com", Some("Expires in 12 days"));
        failing.missing_modify = true;
        let session = FakeSession::new(vec![
            FakeHost::new("a.example.com", Some("Expires in 30 days")),
            failing,
        ]);
        let events = session.events.clone();
        let (orchestrator, calls) = orchestrator(session);

        assert_eq!(orchestrator.run().await, EXIT_RUN_FAILED);

        // The first host was renewed before the failure, but the run still
        // reports failure: no partial success.
        let events = events.lock().unwrap();
        assert!(events.contains(&"click:modify:a.example.com".to_string()));
        assert!(events.contains(&"snapshot:exception".to_string()));
        let calls = calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            &[("*".to_string(), "*".to_string(), false)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_expiration_label_defaults_to_seven() {
        let session = FakeSession::new(vec![
            FakeHost::new("a.example.com", None),
            FakeHost::new("b.example.com", Some("Expires in 20 days")),
        ]);
        let (orchestrator, calls) = orchestrator(session);

        assert_eq!(orchestrator.run().await, EXIT_OK);

        let calls = calls.lock().unwrap();
        let (day, month) = expected_next_run(7);
        assert_eq!(calls.as_slice(), &[(day, month, true)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_digitless_expiration_label_is_fatal() {
        let session = FakeSession::new(vec![FakeHost::new("a.example.com", Some("expires soon"))]);
        let (orchestrator, calls) = orchestrator(session);

        assert_eq!(orchestrator.run().await, EXIT_RUN_FAILED);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_load_timeout_is_recoverable() {
        let session = FakeSession::new(vec![FakeHost::new(
            "a.example.com",
            Some("Expires in 30 days"),
        )])
        .with_timeout_once(&Settings::default().dns_records_url);
        let events = session.events.clone();
        let (orchestrator, calls) = orchestrator(session);

        assert_eq!(orchestrator.run().await, EXIT_OK);

        let events = events.lock().unwrap();
        assert!(events.contains(&"snapshot:timeout".to_string()));
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_password_encoding_is_fatal() {
        let session = FakeSession::new(vec![FakeHost::new(
            "a.example.com",
            Some("Expires in 30 days"),
        )]);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            calls: calls.clone(),
        };
        let orchestrator = RenewalOrchestrator::new(
            session,
            sink,
            Credentials::new("alice", "!!!not-base64!!!"),
            DebugLevel::new(1),
            Settings::default(),
        );

        assert_eq!(orchestrator.run().await, EXIT_RUN_FAILED);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debug_level_gates_checkpoint_snapshots() {
        let session = FakeSession::new(vec![FakeHost::new(
            "a.example.com",
            Some("Expires in 30 days"),
        )]);
        let events = session.events.clone();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            calls: calls.clone(),
        };
        let orchestrator = RenewalOrchestrator::new(
            session,
            sink,
            Credentials::new("alice", BASE64.encode("hunter2")),
            DebugLevel::new(2),
            Settings::default(),
        );

        assert_eq!(orchestrator.run().await, EXIT_OK);

        let events = events.lock().unwrap();
        assert!(events.contains(&"snapshot:debug1".to_string()));
        assert!(events.contains(&"snapshot:debug2".to_string()));
        assert!(events.contains(&"snapshot:results".to_string()));
        assert!(events.contains(&"snapshot:a.example.com_success".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_is_released_exactly_once_per_run() {
        for hosts in [
            Vec::new(), // fails at discovery
            vec![FakeHost::new("a.example.com", Some("Expires in 30 days"))],
        ] {
            let session = FakeSession::new(hosts);
            let closed = session.closed.clone();
            let (orchestrator, _calls) = orchestrator(session);
            orchestrator.run().await;
            assert_eq!(closed.load(Ordering::SeqCst), 1);
        }
    }
}
