use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use reqwest::header::HeaderMap;

use crate::types::Body;

/// Opaque correlation handle returned by [`Interceptor::log_request`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CallToken(u64);

/// Recorded request half of a call.
#[derive(Clone, Debug)]
pub struct RequestRecord {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    /// Milliseconds since the Unix epoch at issue time.
    pub timestamp_ms: u128,
}

/// Recorded response half of a call.
#[derive(Clone, Debug)]
pub struct ResponseRecord {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Body,
    /// Wall-clock time from request issue to response arrival.
    pub duration: Duration,
    pub timestamp_ms: u128,
}

/// One captured call: a request and, once resolved, its response or error.
#[derive(Clone, Debug)]
pub struct CallLog {
    pub request: RequestRecord,
    pub response: Option<ResponseRecord>,
    pub error: Option<String>,
}

impl CallLog {
    pub fn is_resolved(&self) -> bool {
        self.response.is_some() || self.error.is_some()
    }

    /// An errored call, or a resolved response with a 4xx/5xx status.
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
            || self
                .response
                .as_ref()
                .is_some_and(|response| response.status >= 400)
    }
}

/// Predicate set for [`Interceptor::filter`]; unset fields match anything.
#[derive(Clone, Debug, Default)]
pub struct LogFilter {
    pub method: Option<String>,
    pub url_contains: Option<String>,
    pub status: Option<u16>,
    pub errors_only: bool,
}

impl LogFilter {
    fn matches(&self, log: &CallLog) -> bool {
        if let Some(method) = &self.method {
            if !log.request.method.eq_ignore_ascii_case(method) {
                return false;
            }
        }
        if let Some(fragment) = &self.url_contains {
            if !log.request.url.contains(fragment.as_str()) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if log.response.as_ref().map(|response| response.status) != Some(status) {
                return false;
            }
        }
        if self.errors_only && log.error.is_none() {
            return false;
        }
        true
    }
}

/// Aggregate view over the captured logs, computed on demand.
#[derive(Clone, Debug, Default)]
pub struct CallStats {
    pub total: usize,
    pub successes: usize,
    pub failures: usize,
    /// Mean duration over resolved responses, in milliseconds.
    pub average_duration_ms: f64,
    /// URL and duration of the slowest resolved call.
    pub slowest: Option<(String, Duration)>,
    /// URL and duration of the fastest resolved call.
    pub fastest: Option<(String, Duration)>,
    /// Response count per status code.
    pub status_codes: BTreeMap<u16, usize>,
}

#[derive(Debug, Default)]
struct Inner {
    enabled: bool,
    logs: Vec<CallLog>,
    pending: HashMap<u64, Pending>,
    next_token: u64,
}

#[derive(Debug)]
struct Pending {
    index: usize,
    started: Instant,
}

/// Captures requests and their outcomes for later inspection.
///
/// Capture is off until [`enable`](Self::enable) is called; while disabled
/// every logging method is a cheap no-op. Logs accumulate in memory for
/// the life of the instance; [`clear`](Self::clear) resets them. State is
/// behind a mutex so one interceptor can be shared across tasks through an
/// `Arc`.
#[derive(Debug, Default)]
pub struct Interceptor {
    inner: Mutex<Inner>,
}

fn epoch_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or(0)
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_owned(),
                value.to_str().unwrap_or("<non-ascii>").to_owned(),
            )
        })
        .collect()
}

impl Interceptor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn enable(&self) {
        self.lock().enabled = true;
    }

    pub fn disable(&self) {
        self.lock().enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// Records an outbound request and returns its correlation token.
    ///
    /// While disabled, returns a token that will never match anything.
    pub fn log_request(
        &self,
        method: &str,
        url: &str,
        headers: &HeaderMap,
        body: Option<&str>,
    ) -> CallToken {
        let mut inner = self.lock();
        if !inner.enabled {
            return CallToken(0);
        }

        inner.next_token += 1;
        let token = inner.next_token;
        let index = inner.logs.len();

        inner.logs.push(CallLog {
            request: RequestRecord {
                method: method.to_owned(),
                url: url.to_owned(),
                headers: header_pairs(headers),
                body: body.map(str::to_owned),
                timestamp_ms: epoch_ms(),
            },
            response: None,
            error: None,
        });
        inner.pending.insert(
            token,
            Pending {
                index,
                started: Instant::now(),
            },
        );

        tracing::debug!(method, url, token, "captured request");
        CallToken(token)
    }

    /// Records the response for a pending request.
    ///
    /// The body is decoded as JSON when the content type says JSON, else
    /// kept as text; a JSON parse failure records a placeholder rather than
    /// failing, since capture must never abort the flow it observes. Unknown or
    /// already-resolved tokens are ignored.
    pub fn log_response(
        &self,
        token: CallToken,
        status: u16,
        headers: &HeaderMap,
        content_type: Option<&str>,
        raw_body: &str,
    ) {
        let mut inner = self.lock();
        if !inner.enabled {
            return;
        }
        let Some(pending) = inner.pending.remove(&token.0) else {
            return;
        };

        let record = ResponseRecord {
            status,
            headers: header_pairs(headers),
            body: Body::from_raw(content_type, raw_body),
            duration: pending.started.elapsed(),
            timestamp_ms: epoch_ms(),
        };
        if let Some(log) = inner.logs.get_mut(pending.index) {
            log.response = Some(record);
        }
        tracing::debug!(status, token = token.0, "captured response");
    }

    /// Records a failure message for a pending request.
    pub fn log_error(&self, token: CallToken, message: impl Into<String>) {
        let mut inner = self.lock();
        if !inner.enabled {
            return;
        }
        let Some(pending) = inner.pending.remove(&token.0) else {
            return;
        };
        if let Some(log) = inner.logs.get_mut(pending.index) {
            log.error = Some(message.into());
        }
    }

    /// Snapshot of every captured log, in capture order.
    pub fn logs(&self) -> Vec<CallLog> {
        self.lock().logs.clone()
    }

    /// Logs matching every set field of the filter.
    pub fn filter(&self, filter: &LogFilter) -> Vec<CallLog> {
        self.lock()
            .logs
            .iter()
            .filter(|log| filter.matches(log))
            .cloned()
            .collect()
    }

    /// Errored calls plus resolved calls with 4xx/5xx statuses.
    pub fn failed(&self) -> Vec<CallLog> {
        self.lock()
            .logs
            .iter()
            .filter(|log| log.is_failure())
            .cloned()
            .collect()
    }

    /// Resolved calls slower than `threshold`.
    pub fn slower_than(&self, threshold: Duration) -> Vec<CallLog> {
        self.lock()
            .logs
            .iter()
            .filter(|log| {
                log.response
                    .as_ref()
                    .is_some_and(|response| response.duration > threshold)
            })
            .cloned()
            .collect()
    }

    /// Computes aggregate statistics over the captured logs.
    pub fn stats(&self) -> CallStats {
        let inner = self.lock();
        let mut stats = CallStats {
            total: inner.logs.len(),
            ..CallStats::default()
        };

        let mut total_duration = Duration::ZERO;
        let mut resolved = 0usize;

        for log in &inner.logs {
            if log.is_failure() {
                stats.failures += 1;
            } else if log.is_resolved() {
                stats.successes += 1;
            }

            if let Some(response) = &log.response {
                *stats.status_codes.entry(response.status).or_insert(0) += 1;
                total_duration += response.duration;
                resolved += 1;

                let entry = (log.request.url.clone(), response.duration);
                match &stats.slowest {
                    Some((_, duration)) if *duration >= response.duration => {}
                    _ => stats.slowest = Some(entry.clone()),
                }
                match &stats.fastest {
                    Some((_, duration)) if *duration <= response.duration => {}
                    _ => stats.fastest = Some(entry),
                }
            }
        }

        if resolved > 0 {
            stats.average_duration_ms = total_duration.as_millis() as f64 / resolved as f64;
        }
        stats
    }

    /// Duration at or below which `percentile` percent of resolved calls
    /// completed. Returns `None` when nothing has resolved yet.
    pub fn duration_percentile(&self, percentile: f64) -> Option<Duration> {
        let inner = self.lock();
        let mut durations: Vec<Duration> = inner
            .logs
            .iter()
            .filter_map(|log| log.response.as_ref().map(|response| response.duration))
            .collect();
        if durations.is_empty() {
            return None;
        }
        durations.sort_unstable();

        let clamped = percentile.clamp(0.0, 100.0);
        let rank = ((clamped / 100.0) * durations.len() as f64).ceil() as usize;
        Some(durations[rank.saturating_sub(1).min(durations.len() - 1)])
    }

    /// Drops every log and pending entry.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.logs.clear();
        inner.pending.clear();
    }
}
