use std::{fmt, sync::Arc};

use crate::{
    classify, drain, observe::default_observer, AttemptEvent, BackoffPolicy, ClientOptions,
    LoopMode, Observer, ReplayableBody, Request, Response, RetryDecision, Transport,
    TransportError,
};

/// Drives the attempt loop over a [`Transport`].
///
/// Per attempt: replay the buffered body, invoke the transport, classify a
/// failure, then either return, or wait `backoff(n) + jitter(n)` and go
/// again. Every invocation consumes one attempt from the budget.
///
/// With [`LoopMode::Exhaust`] a successful response does not end the loop:
/// it is drained and the next attempt is issued until the budget is spent,
/// and the last response is returned.
///
/// The executor only holds immutable configuration; each call owns its own
/// attempt counter and buffered body, so one executor can serve concurrent
/// calls.
#[derive(Clone)]
pub struct ResilientExecutor {
    max_attempts: usize,
    backoff: BackoffPolicy,
    loop_mode: LoopMode,
    observer: Arc<dyn Observer>,
}

impl fmt::Debug for ResilientExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientExecutor")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("loop_mode", &self.loop_mode)
            .finish_non_exhaustive()
    }
}

impl Default for ResilientExecutor {
    fn default() -> Self {
        Self::new(&ClientOptions::default())
    }
}

impl ResilientExecutor {
    pub fn new(options: &ClientOptions) -> Self {
        Self {
            max_attempts: options.max_retries.max(1),
            backoff: BackoffPolicy::from_options(options),
            loop_mode: options.loop_mode,
            observer: default_observer(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn observer(&self) -> &Arc<dyn Observer> {
        &self.observer
    }

    /// Runs the attempt loop when `retry` is set, a single attempt otherwise.
    pub async fn execute<T>(
        &self,
        transport: &T,
        request: Request,
        retry: bool,
    ) -> Result<Response, TransportError>
    where
        T: Transport + ?Sized,
    {
        if retry {
            self.execute_with_retry(transport, request).await
        } else {
            self.execute_once(transport, request).await
        }
    }

    /// Exactly one attempt; any error is returned as is.
    pub async fn execute_once<T>(
        &self,
        transport: &T,
        request: Request,
    ) -> Result<Response, TransportError>
    where
        T: Transport + ?Sized,
    {
        let head = Arc::clone(request.head());
        let context = request.context().clone();
        let event = AttemptEvent {
            method: &head.method,
            url: &head.url,
            attempt: 0,
            max_attempts: 1,
        };
        self.observer.on_attempt(&event);

        match context.run(transport.execute(request)).await {
            Ok(response) => {
                self.observer.on_response(&event, response.status());
                Ok(response)
            }
            Err(err) => {
                self.observer
                    .on_failure(&event, &err, RetryDecision::Terminal);
                Err(err)
            }
        }
    }

    pub async fn execute_with_retry<T>(
        &self,
        transport: &T,
        request: Request,
    ) -> Result<Response, TransportError>
    where
        T: Transport + ?Sized,
    {
        let (head, body, context) = request.into_parts();
        let body = match body {
            Some(body) => Some(
                context
                    .run(async {
                        ReplayableBody::prepare(body)
                            .await
                            .map_err(TransportError::body_read)
                    })
                    .await?,
            ),
            None => None,
        };

        let mut attempt = 0usize;
        loop {
            let event = AttemptEvent {
                method: &head.method,
                url: &head.url,
                attempt,
                max_attempts: self.max_attempts,
            };
            self.observer.on_attempt(&event);

            let request = Request::from_parts(
                Arc::clone(&head),
                body.as_ref().map(ReplayableBody::replay),
                context.clone(),
            );
            let outcome = context.run(transport.execute(request)).await;
            attempt += 1;
            let budget_spent = attempt >= self.max_attempts;

            match outcome {
                Ok(response) => {
                    self.observer.on_response(&event, response.status());
                    if self.loop_mode == LoopMode::FirstSuccess || budget_spent {
                        return Ok(response);
                    }
                    let drained = context.run(async { Ok(drain(response).await) }).await?;
                    self.observer.on_drained(&event, drained);
                }
                Err(err) => {
                    let decision = classify(&err);
                    self.observer.on_failure(&event, &err, decision);
                    if decision == RetryDecision::Terminal || budget_spent {
                        return Err(err);
                    }
                    let delay = self.backoff.delay(event.attempt);
                    self.observer.on_retry_scheduled(&event, delay);
                    context.sleep(delay).await?;
                }
            }
        }
    }
}
