//! Per-chunk analysis with bounded retries
//!
//! Each chunk goes through a small state machine:
//!
//! ```text
//! Pending -> Attempting -> Success
//!                       -> Retrying -> Attempting -> ...
//!                       -> Failed            (attempt budget spent)
//! ```
//!
//! Contract violations and transport errors both move `Attempting` to
//! `Retrying` until `1 + max_retries` attempts have been made. Attempts are
//! independent: every retry resends the same system instruction and chunk
//! with no memory of earlier replies.

use crate::ai::client::SmellDetector;
use crate::ai::contract::{parse_reply, SmellReport};
use crate::ai::prompts::PromptTemplate;
use crate::config::AnalysisConfig;
use crate::models::{Chunk, RawFinding};
use crate::store::ChunkStore;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Longest pause between two attempts
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Why a chunk ended without a validated reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    ContractViolation { detail: String },
    TransportFailure { detail: String },
    /// A validated reply whose output could not be written
    PersistFailure { detail: String },
}

impl FailureReason {
    pub fn kind(&self) -> &'static str {
        match self {
            FailureReason::ContractViolation { .. } => "ContractViolation",
            FailureReason::TransportFailure { .. } => "TransportFailure",
            FailureReason::PersistFailure { .. } => "PersistFailure",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            FailureReason::ContractViolation { detail }
            | FailureReason::TransportFailure { detail }
            | FailureReason::PersistFailure { detail } => detail,
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind(), self.detail())
    }
}

/// Result of analyzing one chunk
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Success(Vec<RawFinding>),
    Failure(FailureReason),
}

impl AnalysisOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisOutcome::Success(_))
    }
}

/// Retry bound and backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first
    pub max_retries: u32,
    /// Pause before the first retry, doubled for each further retry
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_millis(1_000),
        }
    }
}

impl From<&AnalysisConfig> for RetryPolicy {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Pause before attempt number `attempt + 1`, given `attempt` failures so far.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        if self.backoff.is_zero() || attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32 << (attempt - 1).min(16);
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

/// Where a chunk analysis currently stands
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptState {
    Pending,
    Attempting { attempt: u32 },
    Retrying { attempt: u32, last_failure: FailureReason },
    Success { attempts: u32, report: SmellReport },
    Failed { attempts: u32, reason: FailureReason },
}

/// Inspectable retry state machine for one chunk
#[derive(Debug, Clone)]
pub struct AnalysisAttempt {
    state: AttemptState,
    max_attempts: u32,
}

impl AnalysisAttempt {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            state: AttemptState::Pending,
            max_attempts: policy.max_attempts(),
        }
    }

    pub fn state(&self) -> &AttemptState {
        &self.state
    }

    pub fn into_state(self) -> AttemptState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            AttemptState::Success { .. } | AttemptState::Failed { .. }
        )
    }

    /// `Pending`/`Retrying` -> `Attempting`. Returns the 1-based attempt number.
    pub fn begin(&mut self) -> Option<u32> {
        let next = match &self.state {
            AttemptState::Pending => 1,
            AttemptState::Retrying { attempt, .. } => attempt.saturating_add(1),
            _ => return None,
        };
        self.state = AttemptState::Attempting { attempt: next };
        Some(next)
    }

    /// `Attempting` -> `Success` | `Retrying` | `Failed`.
    pub fn record(&mut self, result: Result<SmellReport, FailureReason>) {
        let AttemptState::Attempting { attempt } = self.state else {
            return;
        };
        self.state = match result {
            Ok(report) => AttemptState::Success {
                attempts: attempt,
                report,
            },
            Err(reason) if attempt < self.max_attempts => AttemptState::Retrying {
                attempt,
                last_failure: reason,
            },
            Err(reason) => AttemptState::Failed {
                attempts: attempt,
                reason,
            },
        };
    }
}

/// Sends chunks to a detector and enforces the reply contract
pub struct ChunkAnalyzer<'a, D: SmellDetector + ?Sized> {
    detector: &'a D,
    prompt: &'a PromptTemplate,
    policy: RetryPolicy,
    store: Option<&'a ChunkStore>,
}

impl<'a, D: SmellDetector + ?Sized> ChunkAnalyzer<'a, D> {
    pub fn new(detector: &'a D, prompt: &'a PromptTemplate, policy: RetryPolicy) -> Self {
        Self {
            detector,
            prompt,
            policy,
            store: None,
        }
    }

    /// Persist every outcome to `store`
    pub fn with_store(mut self, store: &'a ChunkStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Analyze a chunk, persist the outcome and convert it to raw findings.
    ///
    /// A chunk whose output cannot be written is a failure even when the
    /// reply was valid, since `compare` would never see it.
    pub fn analyze(&self, chunk: &Chunk) -> AnalysisOutcome {
        let state = self.run(chunk);

        if let Some(store) = self.store {
            if let Err(e) = store.persist(chunk, &state) {
                error!(
                    "Failed to persist {} chunk {}: {:#}",
                    chunk.source_path, chunk.sequence_index, e
                );
                return AnalysisOutcome::Failure(FailureReason::PersistFailure {
                    detail: format!("{:#}", e),
                });
            }
        }

        match state {
            AttemptState::Success { report, .. } => AnalysisOutcome::Success(
                report.to_raw_findings(&chunk.source_path, chunk.start_line, chunk.end_line),
            ),
            AttemptState::Failed { reason, .. } => AnalysisOutcome::Failure(reason),
            other => AnalysisOutcome::Failure(FailureReason::TransportFailure {
                detail: format!("analysis stopped in non-terminal state {:?}", other),
            }),
        }
    }

    /// Drive the state machine to a terminal state.
    pub fn run(&self, chunk: &Chunk) -> AttemptState {
        let mut attempt = AnalysisAttempt::new(self.policy);

        while !attempt.is_terminal() {
            if let AttemptState::Retrying {
                attempt: n,
                last_failure,
            } = attempt.state()
            {
                warn!(
                    "{} chunk {} attempt {} failed ({}), retrying",
                    chunk.source_path, chunk.sequence_index, n, last_failure
                );
                let pause = self.policy.backoff_after(*n);
                if !pause.is_zero() {
                    std::thread::sleep(pause);
                }
            }

            let Some(n) = attempt.begin() else {
                break;
            };
            debug!(
                "Analyzing {} chunk {} (lines {}-{}), attempt {}",
                chunk.source_path, chunk.sequence_index, chunk.start_line, chunk.end_line, n
            );
            attempt.record(self.attempt_once(chunk));
        }

        if let AttemptState::Failed { attempts, reason } = attempt.state() {
            warn!(
                "{} chunk {} unanalyzed after {} attempt(s): {}",
                chunk.source_path, chunk.sequence_index, attempts, reason
            );
        }
        attempt.into_state()
    }

    fn attempt_once(&self, chunk: &Chunk) -> Result<SmellReport, FailureReason> {
        let user = self.prompt.render_user(&chunk.text);
        let reply = self
            .detector
            .complete(&self.prompt.system, &user)
            .map_err(|e| FailureReason::TransportFailure {
                detail: e.to_string(),
            })?;
        parse_reply(&reply).map_err(|e| FailureReason::ContractViolation {
            detail: e.to_string(),
        })
    }
}
