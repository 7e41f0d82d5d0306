use std::fmt::{Debug, Display};
use std::future::Future;
use thiserror::Error;
use tracing::{debug, warn};

/// Outcome of exhausting an ordered provider list without a single success.
#[derive(Error, Debug)]
pub enum FailoverError<E: Display + Debug> {
    #[error("{label}: no providers configured")]
    NoProviders { label: String },
    #[error("{label}: all {attempts} providers failed, last error: {last}")]
    Exhausted {
        label: String,
        attempts: usize,
        last: E,
    },
}

/// Try an ordered list of providers until one succeeds.
///
/// Providers are attempted strictly in slice order. The first `Ok` is
/// returned immediately and no later provider is contacted. Each failure is
/// logged and the next provider is tried; once the list is exhausted the
/// last error is surfaced inside [`FailoverError::Exhausted`].
///
/// # Arguments
/// * `label` - Short description of the capability, used in logs
/// * `providers` - Ordered provider list (endpoints, URL templates, ...)
/// * `attempt` - Async operation to run against a single provider
pub async fn first_success<'a, P, T, E, F, Fut>(
    label: &str,
    providers: &'a [P],
    mut attempt: F,
) -> Result<T, FailoverError<E>>
where
    F: FnMut(usize, &'a P) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display + Debug,
{
    let mut last: Option<E> = None;

    for (index, provider) in providers.iter().enumerate() {
        match attempt(index, provider).await {
            Ok(value) => {
                if index > 0 {
                    debug!(
                        "{}: provider #{} succeeded after {} failed attempts",
                        label,
                        index + 1,
                        index
                    );
                }
                return Ok(value);
            }
            Err(e) => {
                warn!(
                    "{}: provider #{}/{} failed: {}",
                    label,
                    index + 1,
                    providers.len(),
                    e
                );
                last = Some(e);
            }
        }
    }

    match last {
        Some(last) => Err(FailoverError::Exhausted {
            label: label.to_string(),
            attempts: providers.len(),
            last,
        }),
        None => Err(FailoverError::NoProviders {
            label: label.to_string(),
        }),
    }
}
