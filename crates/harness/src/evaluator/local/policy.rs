//! Retry and Catch matching.

use serde_json::Value;

/// Retriers default to three attempts.
const DEFAULT_MAX_ATTEMPTS: u64 = 3;

/// Errors no retrier or catcher may intercept.
const UNCATCHABLE: &str = "States.Runtime";

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Handling<'a> {
    Retry,
    Catch(&'a Value),
    Unhandled,
}

/// Decide what happens to `error` raised by `state` on zero-based `attempt`.
///
/// The first retrier whose `ErrorEquals` matches wins; it retries while
/// `attempt < MaxAttempts`. Once it is exhausted (or nothing retries) the
/// first matching catcher applies.
pub(crate) fn decide<'a>(state: &'a Value, error: &str, attempt: u32) -> Handling<'a> {
    if let Some(retrier) = first_match(state.get("Retry"), error) {
        let max_attempts = retrier
            .get("MaxAttempts")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_MAX_ATTEMPTS);
        if u64::from(attempt) < max_attempts {
            return Handling::Retry;
        }
    }
    match first_match(state.get("Catch"), error) {
        Some(catcher) => Handling::Catch(catcher),
        None => Handling::Unhandled,
    }
}

fn first_match<'a>(policies: Option<&'a Value>, error: &str) -> Option<&'a Value> {
    policies
        .and_then(Value::as_array)?
        .iter()
        .find(|policy| error_matches(policy, error))
}

fn error_matches(policy: &Value, error: &str) -> bool {
    if error == UNCATCHABLE {
        return false;
    }
    policy
        .get("ErrorEquals")
        .and_then(Value::as_array)
        .is_some_and(|names| {
            names.iter().filter_map(Value::as_str).any(|name| match name {
                "States.ALL" => true,
                "States.TaskFailed" => error != "States.Timeout",
                other => other == error,
            })
        })
}
