use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::Instant;

use crate::errors::ApiError;
use crate::errors::AttemptError;
use crate::errors::FailureReason;
use crate::errors::RequestFailed;
use crate::errors::Result;
use crate::response::RawResponse;
use crate::response::Reply;

pub type SendFuture<'a> = Pin<Box<dyn Future<Output = std::result::Result<RawResponse, AttemptError>> + Send + 'a>>;

/// One unit of work the executor knows how to retry
///
/// `perform` is called once per attempt and must be safe to repeat. `validate` sees the
/// first response that made it through `perform` and `parse`, and is never retried.
pub trait Request: Send + Sync {
    type Body: Send;

    fn perform(&self) -> SendFuture<'_>;

    fn parse(&self, response: &RawResponse) -> std::result::Result<Self::Body, AttemptError>;

    fn validate(&self, response: &RawResponse, body: &Self::Body) -> std::result::Result<(), ApiError>;
}

/// Retry and backoff settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionSettings {
    /// Maximum number of attempts; values below 1 are treated as 1 (default: 3)
    pub retries: u32,

    /// Sleep after the first failed attempt (default: 1s)
    pub delay: Duration,

    /// Growth factor applied to the sleep after every failed attempt (default: 2.0)
    pub backoff: f64,

    /// Return the raw response alongside the body (default: false)
    pub full: bool,

    /// Upper bound on a single backoff sleep (default: uncapped)
    pub max_delay: Option<Duration>,

    /// Upper bound on the whole call, attempts and sleeps included (default: none)
    pub deadline: Option<Duration>,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self { retries: 3, delay: Duration::from_secs(1), backoff: 2.0, full: false, max_delay: None, deadline: None }
    }
}

impl ExecutionSettings {
    /// Same settings with a budget of one attempt
    pub fn single_shot(&self) -> Self {
        Self { retries: 1, ..*self }
    }

    pub fn with_full(&self, full: bool) -> Self {
        Self { full, ..*self }
    }

    fn budget(&self) -> u32 {
        self.retries.max(1)
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        let grown = Duration::try_from_secs_f64((delay.as_secs_f64() * self.backoff).max(0.0)).unwrap_or(Duration::MAX);

        match self.max_delay {
            Some(cap) => grown.min(cap),
            None => grown,
        }
    }
}

/// Run `request` with bounded retries
///
/// 2xx responses are parsed and validated. 4xx fails at once, 5xx and transport or decode
/// failures are retried with exponential backoff until the budget runs out. Validation errors
/// propagate unchanged and are never retried.
pub async fn execute_request<R>(request: &R, settings: &ExecutionSettings) -> Result<Reply<R::Body>>
where
    R: Request + ?Sized,
{
    let retries = settings.budget();
    let deadline = settings.deadline.and_then(|limit| Instant::now().checked_add(limit));
    let mut delay = settings.delay;
    let mut errors = Vec::new();
    let mut attempt = 0;

    let (response, body) = loop {
        attempt += 1;

        let outcome = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, attempt_once(request)).await {
                Ok(outcome) => outcome,
                Err(elapsed) => {
                    tracing::warn!(attempt, retries, "Request attempt outlived the deadline");
                    errors.push(AttemptError::transport(elapsed));
                    return Err(RequestFailed::new(FailureReason::DeadlineExceeded { attempt }, errors).into());
                }
            },
            None => attempt_once(request).await,
        };

        let error = match outcome {
            Ok(success) => break success,
            Err(error) => error,
        };

        tracing::warn!(attempt, retries, kind = %error.kind(), status = error.status(), "Request attempt {} failed: {}", attempt, error);

        let retryable = error.is_retryable();
        errors.push(error);

        if !retryable {
            return Err(RequestFailed::new(FailureReason::NonRetryable { attempt }, errors).into());
        }

        if attempt >= retries {
            return Err(RequestFailed::new(FailureReason::Exhausted { retries }, errors).into());
        }

        if let Some(deadline) = deadline {
            let wakes_in_time = Instant::now().checked_add(delay).is_some_and(|wake| wake < deadline);
            if !wakes_in_time {
                return Err(RequestFailed::new(FailureReason::DeadlineExceeded { attempt }, errors).into());
            }
        }

        tokio::time::sleep(delay).await;
        delay = settings.next_delay(delay);
    };

    request.validate(&response, &body)?;

    if settings.full {
        Ok(Reply::Full(response, body))
    } else {
        Ok(Reply::Body(body))
    }
}

async fn attempt_once<R>(request: &R) -> std::result::Result<(RawResponse, R::Body), AttemptError>
where
    R: Request + ?Sized,
{
    let response = request.perform().await?;

    if !response.is_success() {
        let body = response.text().into_owned();
        return Err(AttemptError::Status { status: response.status, body });
    }

    let body = request.parse(&response)?;
    Ok((response, body))
}
