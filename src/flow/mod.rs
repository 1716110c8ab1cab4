//! Analysis flow controller
//!
//! Owns the `AnalysisSession` and is its only writer. Sequences
//! idle → analyzing → (complete | error) and publishes every change on a
//! watch channel so rendering layers can observe it.
//!
//! Every session write happens under the `active` lock and is tied to the
//! attempt id that started it. A reset clears the id, so a late result from a
//! superseded attempt can never land on a newer session.

use crate::client::prompt::build_prompt;
use crate::client::{AnalysisClient, ExtractionRequest};
use crate::config::FlowConfig;
use crate::encoder::{self, UploadCandidate};
use crate::error::AnalysisError;
use crate::models::{AnalysisSession, AnalysisStatus, ExtractionResult};
use crate::report::{project, Report};
use crate::schema::ExtractionSchema;
use crate::Result;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub mod progress;

struct ActiveAttempt {
    id: Uuid,
    ticker: JoinHandle<()>,
    worker: JoinHandle<()>,
}

pub(crate) struct FlowInner {
    client: Arc<dyn AnalysisClient>,
    schema: Arc<ExtractionSchema>,
    config: FlowConfig,
    session: watch::Sender<AnalysisSession>,
    active: Mutex<Option<ActiveAttempt>>,
}

/// Cloneable handle to one analysis session.
#[derive(Clone)]
pub struct AnalysisFlow {
    inner: Arc<FlowInner>,
}

impl AnalysisFlow {
    pub fn new(client: Arc<dyn AnalysisClient>, config: FlowConfig) -> Result<Self> {
        Self::with_schema(client, config, ExtractionSchema::standard())
    }

    /// Fails with `Config` when the timing would break the progress contract
    /// (zero tick or step, cap of 100 or more).
    pub fn with_schema(
        client: Arc<dyn AnalysisClient>,
        config: FlowConfig,
        schema: ExtractionSchema,
    ) -> Result<Self> {
        config.validate()?;
        let (session, _) = watch::channel(AnalysisSession::idle());

        Ok(Self {
            inner: Arc::new(FlowInner {
                client,
                schema: Arc::new(schema),
                config,
                session,
                active: Mutex::new(None),
            }),
        })
    }

    /// Current session snapshot.
    pub fn session(&self) -> AnalysisSession {
        self.inner.session.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AnalysisSession> {
        self.inner.session.subscribe()
    }

    /// Report for the current result, if the session is complete.
    pub fn report(&self) -> Option<Report> {
        let session = self.inner.session.borrow();
        match (&session.status, &session.result) {
            (AnalysisStatus::Complete, Some(result)) => Some(project(result)),
            _ => None,
        }
    }

    /// Wait until the session is not analyzing and return it.
    pub async fn wait_until_settled(&self) -> AnalysisSession {
        let mut rx = self.subscribe();
        let settled = rx
            .wait_for(|s| !s.is_analyzing())
            .await
            .map(|session| session.clone());
        settled.unwrap_or_else(|_| self.session())
    }

    /// Start analyzing the first of `files`.
    pub fn submit_first(&self, files: Vec<UploadCandidate>) -> Result<Uuid> {
        let candidate = files.into_iter().next().ok_or(AnalysisError::NoDocument)?;
        self.submit(candidate)
    }

    /// Start an analysis. Must be called from within a Tokio runtime.
    ///
    /// Rejected without any state change while another attempt is in flight.
    /// From `complete` or `error` the previous result is dropped in the same
    /// update that enters `analyzing`.
    pub fn submit(&self, candidate: UploadCandidate) -> Result<Uuid> {
        self.submit_with_jurisdiction(candidate, None)
    }

    /// Like `submit`, with the prompt written for `jurisdiction`. The value is
    /// fixed for the lifetime of the attempt.
    pub fn submit_with_jurisdiction(
        &self,
        candidate: UploadCandidate,
        jurisdiction: Option<String>,
    ) -> Result<Uuid> {
        let mut active = self.inner.lock_active();

        if let Some(current) = active.as_ref() {
            warn!(
                attempt_id = %current.id,
                file = %candidate.original_name(),
                "Submit rejected: analysis already in flight"
            );
            return Err(AnalysisError::AnalysisInFlight);
        }

        let attempt_id = Uuid::new_v4();

        info!(
            attempt_id = %attempt_id,
            file = %candidate.original_name(),
            media_type = %candidate.media_type(),
            size_bytes = candidate.size_bytes(),
            "Analysis started"
        );

        self.inner.session.send_replace(AnalysisSession {
            status: AnalysisStatus::Analyzing,
            progress: 0,
            result: None,
            error_reason: None,
            error_kind: None,
            attempt_id: Some(attempt_id),
        });

        let ticker = tokio::spawn(progress::run(self.inner.clone(), attempt_id));
        let worker = tokio::spawn(run_attempt(
            self.inner.clone(),
            attempt_id,
            candidate,
            jurisdiction,
        ));

        *active = Some(ActiveAttempt {
            id: attempt_id,
            ticker,
            worker,
        });

        Ok(attempt_id)
    }

    /// Return to `idle`. Cancels an in-flight attempt. Calling it on an idle
    /// session changes nothing.
    pub fn reset(&self) {
        let mut active = self.inner.lock_active();

        if let Some(attempt) = active.take() {
            attempt.ticker.abort();
            attempt.worker.abort();
            info!(attempt_id = %attempt.id, "Analysis cancelled by reset");
        }

        self.inner.session.send_if_modified(|session| {
            if *session == AnalysisSession::idle() {
                false
            } else {
                *session = AnalysisSession::idle();
                true
            }
        });
    }
}

async fn run_attempt(
    inner: Arc<FlowInner>,
    attempt_id: Uuid,
    candidate: UploadCandidate,
    jurisdiction: Option<String>,
) {
    let outcome = inner.execute(&candidate, jurisdiction.as_deref()).await;
    inner.finish(attempt_id, outcome);
}

impl FlowInner {
    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveAttempt>> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Encode, call the model once, wrap the accepted data.
    async fn execute(
        &self,
        candidate: &UploadCandidate,
        jurisdiction: Option<&str>,
    ) -> Result<ExtractionResult> {
        let document = encoder::encode(candidate)?;
        let digest = document.digest.clone();

        let request = ExtractionRequest {
            document,
            prompt: build_prompt(jurisdiction),
            schema: self.schema.clone(),
        };

        let call = self.client.analyze(&request);
        let data = match self.config.analysis_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                AnalysisError::TransportFailure(format!(
                    "analysis timed out after {}s",
                    limit.as_secs_f32()
                ))
            })??,
            None => call.await?,
        };

        Ok(ExtractionResult {
            id: Uuid::new_v4(),
            file_name: candidate.original_name().to_string(),
            media_type: candidate.media_type(),
            document_digest: digest,
            analyzed_at: Utc::now(),
            data,
        })
    }

    /// Advance progress for the active attempt. Returns `false` once the
    /// ticker should stop.
    fn tick_progress(&self, attempt_id: Uuid) -> bool {
        let active = self.lock_active();
        if active.as_ref().map(|a| a.id) != Some(attempt_id) {
            return false;
        }

        let (step, cap) = (self.config.progress_step, self.config.progress_cap);
        let mut keep_going = true;
        self.session.send_if_modified(|session| {
            let next = progress::advance(session.progress, step, cap);
            keep_going = next < cap;
            if next == session.progress {
                return false;
            }
            session.progress = next;
            true
        });
        keep_going
    }

    /// Apply the outcome of `attempt_id` unless it has been superseded.
    fn finish(&self, attempt_id: Uuid, outcome: Result<ExtractionResult>) {
        let mut active = self.lock_active();

        let attempt = match active.take() {
            Some(attempt) if attempt.id == attempt_id => attempt,
            other => {
                *active = other;
                debug!(attempt_id = %attempt_id, "Ignoring outcome of superseded attempt");
                return;
            }
        };
        attempt.ticker.abort();

        self.session.send_modify(|session| session.progress = 100);

        match outcome {
            Ok(result) => {
                info!(
                    attempt_id = %attempt_id,
                    result_id = %result.id,
                    digest = %result.document_digest,
                    "Analysis complete"
                );
                self.session.send_modify(|session| {
                    session.status = AnalysisStatus::Complete;
                    session.result = Some(result);
                    session.error_reason = None;
                    session.error_kind = None;
                });
            }
            Err(e) => {
                warn!(
                    attempt_id = %attempt_id,
                    kind = e.kind(),
                    error = %e,
                    "Analysis failed"
                );
                self.session.send_modify(|session| {
                    session.status = AnalysisStatus::Error;
                    session.result = None;
                    session.error_reason = Some(e.to_string());
                    session.error_kind = Some(e.kind().to_string());
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{sample_extraction, MockAnalysisClient};
    use crate::models::ExtractionData;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    /// Each call waits for the next gate to be released by the test.
    struct GatedClient {
        gates: Mutex<VecDeque<oneshot::Receiver<Result<ExtractionData>>>>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl GatedClient {
        fn new(count: usize) -> (Arc<Self>, Vec<oneshot::Sender<Result<ExtractionData>>>) {
            let mut senders = Vec::new();
            let mut gates = VecDeque::new();
            for _ in 0..count {
                let (tx, rx) = oneshot::channel();
                senders.push(tx);
                gates.push_back(rx);
            }
            let client = Arc::new(Self {
                gates: Mutex::new(gates),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            });
            (client, senders)
        }
    }

    #[async_trait]
    impl AnalysisClient for GatedClient {
        async fn analyze(&self, request: &ExtractionRequest) -> Result<ExtractionData> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(request.prompt.clone());
            let gate = self.gates.lock().unwrap().pop_front();
            match gate {
                Some(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(AnalysisError::TransportFailure("gate dropped".into()))),
                None => Err(AnalysisError::TransportFailure("no gate".into())),
            }
        }
    }

    fn fast_config() -> FlowConfig {
        FlowConfig {
            progress_tick: Duration::from_millis(1),
            ..FlowConfig::default()
        }
    }

    fn pdf(name: &str) -> UploadCandidate {
        UploadCandidate::from_bytes(name, "application/pdf", b"%PDF-1.7".to_vec()).unwrap()
    }

    fn data_with_income(income: f64) -> ExtractionData {
        ExtractionData {
            applicant_income: income,
            ..sample_extraction()
        }
    }

    #[tokio::test]
    async fn test_submit_enters_analyzing_at_zero() {
        let (client, _gates) = GatedClient::new(1);
        let flow = AnalysisFlow::new(client, FlowConfig::default()).unwrap();

        let attempt = flow.submit(pdf("a.pdf")).unwrap();
        let session = flow.session();
        assert_eq!(session.status, AnalysisStatus::Analyzing);
        assert_eq!(session.progress, 0);
        assert_eq!(session.attempt_id, Some(attempt));
        flow.reset();
    }

    #[test]
    fn test_rejects_config_that_breaks_progress() {
        let client: Arc<dyn AnalysisClient> = Arc::new(MockAnalysisClient::new(Duration::ZERO));

        for config in [
            FlowConfig { progress_cap: 100, ..fast_config() },
            FlowConfig { progress_cap: 120, ..fast_config() },
            FlowConfig { progress_tick: Duration::ZERO, ..fast_config() },
            FlowConfig { progress_step: 0, ..fast_config() },
        ] {
            let err = AnalysisFlow::new(client.clone(), config).err().unwrap();
            assert!(matches!(err, AnalysisError::Config(_)), "{:?}", config);
        }

        assert!(AnalysisFlow::new(client, fast_config()).is_ok());
    }

    #[tokio::test]
    async fn test_jurisdiction_is_fixed_per_attempt() {
        let (client, mut gates) = GatedClient::new(1);
        let flow = AnalysisFlow::new(client.clone(), fast_config()).unwrap();

        flow.submit_with_jurisdiction(pdf("a.pdf"), Some("british_columbia".into()))
            .unwrap();
        let err = flow
            .submit_with_jurisdiction(pdf("b.pdf"), Some("quebec".into()))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::AnalysisInFlight));

        gates.remove(0).send(Ok(sample_extraction())).unwrap();
        assert_eq!(flow.wait_until_settled().await.status, AnalysisStatus::Complete);

        let prompts = client.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("British Columbia"));
        assert!(!prompts[0].contains("Quebec"));
    }

    #[tokio::test]
    async fn test_single_flight() {
        let (client, mut gates) = GatedClient::new(2);
        let flow = AnalysisFlow::new(client.clone(), fast_config()).unwrap();

        let first = flow.submit(pdf("a.pdf")).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let err = flow.submit(pdf("b.pdf")).unwrap_err();
        assert!(matches!(err, AnalysisError::AnalysisInFlight));
        assert_eq!(flow.session().attempt_id, Some(first));
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);

        gates.remove(0).send(Ok(sample_extraction())).unwrap();
        let session = flow.wait_until_settled().await;
        assert_eq!(session.status, AnalysisStatus::Complete);
        assert_eq!(session.result.unwrap().file_name, "a.pdf");
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_file_list_rejected() {
        let flow = AnalysisFlow::new(
            Arc::new(MockAnalysisClient::new(Duration::ZERO)),
            FlowConfig::default(),
        ).unwrap();
        assert!(matches!(flow.submit_first(vec![]), Err(AnalysisError::NoDocument)));
        assert_eq!(flow.session(), AnalysisSession::idle());
    }

    #[tokio::test]
    async fn test_progress_monotonic_then_snaps_to_100_once() {
        let (client, mut gates) = GatedClient::new(1);
        let flow = AnalysisFlow::new(client, fast_config()).unwrap();
        let mut rx = flow.subscribe();

        flow.submit(pdf("a.pdf")).unwrap();

        let observer = tokio::spawn(async move {
            let initial = rx.borrow_and_update().clone();
            let mut seen = vec![(initial.status, initial.progress)];
            while rx.changed().await.is_ok() {
                let session = rx.borrow_and_update().clone();
                seen.push((session.status, session.progress));
                if !session.is_analyzing() {
                    break;
                }
            }
            seen
        });

        // long enough for the ticker to hit the cap
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(flow.session().progress, 98);

        gates.remove(0).send(Ok(sample_extraction())).unwrap();
        let seen = observer.await.unwrap();

        let mut previous = 0;
        let mut hundreds = 0;
        for (status, progress) in &seen {
            assert!(*progress >= previous, "progress went backwards: {:?}", seen);
            if *status == AnalysisStatus::Analyzing && *progress < 100 {
                assert!(*progress <= 98);
            }
            if *progress == 100 && previous != 100 {
                hundreds += 1;
            }
            previous = *progress;
        }
        assert_eq!(hundreds, 1);
        assert_eq!(seen.last().unwrap(), &(AnalysisStatus::Complete, 100));
    }

    #[tokio::test]
    async fn test_failure_moves_to_error_without_result() {
        let client = MockAnalysisClient::failing(|| AnalysisError::EmptyResponse);
        let flow = AnalysisFlow::new(Arc::new(client), fast_config()).unwrap();

        flow.submit(pdf("a.pdf")).unwrap();
        let session = flow.wait_until_settled().await;

        assert_eq!(session.status, AnalysisStatus::Error);
        assert_eq!(session.error_kind.as_deref(), Some("EmptyResponse"));
        assert_eq!(session.error_reason.as_deref(), Some("No data returned from analysis."));
        assert!(session.result.is_none());
        assert_eq!(session.progress, 100);
        assert!(flow.report().is_none());
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let flow = AnalysisFlow::new(
            Arc::new(MockAnalysisClient::new(Duration::ZERO)),
            fast_config(),
        ).unwrap();
        flow.submit(pdf("a.pdf")).unwrap();
        assert_eq!(flow.wait_until_settled().await.status, AnalysisStatus::Complete);

        flow.reset();
        let first = flow.session();
        flow.reset();
        let second = flow.session();

        assert_eq!(first, AnalysisSession::idle());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_reset_stops_progress() {
        let (client, _gates) = GatedClient::new(1);
        let flow = AnalysisFlow::new(client, fast_config()).unwrap();

        flow.submit(pdf("a.pdf")).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        flow.reset();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(flow.session(), AnalysisSession::idle());
    }

    #[tokio::test]
    async fn test_stale_outcome_is_ignored() {
        let (client, mut gates) = GatedClient::new(2);
        let flow = AnalysisFlow::new(client, fast_config()).unwrap();

        let first = flow.submit(pdf("a.pdf")).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        flow.reset();
        let second = flow.submit(pdf("b.pdf")).unwrap();
        assert_ne!(first, second);

        // a late outcome for the first attempt must not touch the session
        flow.inner.finish(first, Ok(ExtractionResult {
            id: Uuid::new_v4(),
            file_name: "a.pdf".to_string(),
            media_type: crate::models::MediaType::Pdf,
            document_digest: String::new(),
            analyzed_at: Utc::now(),
            data: data_with_income(1.0),
        }));
        assert!(flow.session().is_analyzing());
        assert_eq!(flow.session().attempt_id, Some(second));

        let _ = gates.remove(0);
        gates.remove(0).send(Ok(data_with_income(42.0))).unwrap();

        let session = flow.wait_until_settled().await;
        let result = session.result.unwrap();
        assert_eq!(result.file_name, "b.pdf");
        assert_eq!(result.data.applicant_income, 42.0);
    }

    #[tokio::test]
    async fn test_timeout_is_transport_failure() {
        let client = MockAnalysisClient::new(Duration::from_secs(5));
        let config = FlowConfig {
            analysis_timeout: Some(Duration::from_millis(20)),
            ..fast_config()
        };
        let flow = AnalysisFlow::new(Arc::new(client), config).unwrap();

        flow.submit(pdf("a.pdf")).unwrap();
        let session = flow.wait_until_settled().await;
        assert_eq!(session.error_kind.as_deref(), Some("TransportFailure"));
        assert!(session.error_reason.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_resubmit_from_complete_discards_previous_result() {
        let (client, mut gates) = GatedClient::new(2);
        let flow = AnalysisFlow::new(client, fast_config()).unwrap();

        flow.submit(pdf("a.pdf")).unwrap();
        gates.remove(0).send(Ok(sample_extraction())).unwrap();
        assert_eq!(flow.wait_until_settled().await.status, AnalysisStatus::Complete);
        assert!(flow.report().is_some());

        flow.submit(pdf("b.pdf")).unwrap();
        let session = flow.session();
        assert!(session.is_analyzing());
        assert!(session.result.is_none());
        assert!(flow.report().is_none());
        flow.reset();
    }
}
