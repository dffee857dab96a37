// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt, time::Duration};

/// How a worker retries delivering its result after a connection-level failure.
#[derive(Debug, Copy, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "backoff", rename_all = "kebab-case", deny_unknown_fields)]
pub enum RetryPolicy {
    /// Fixed backoff.
    #[serde(rename_all = "kebab-case")]
    Fixed {
        /// Maximum retry count.
        count: u32,

        /// Delay between retries.
        #[serde(default, with = "humantime_serde")]
        delay: Duration,

        /// If set to true, randomness will be added to the delay on each retry attempt.
        #[serde(default)]
        jitter: bool,
    },

    /// Exponential backoff.
    #[serde(rename_all = "kebab-case")]
    Exponential {
        /// Maximum retry count.
        count: u32,

        /// Delay before the first retry. Doubles on every further retry.
        #[serde(with = "humantime_serde")]
        delay: Duration,

        /// If set to true, randomness will be added to the delay on each retry attempt.
        #[serde(default)]
        jitter: bool,

        /// If set, limits the delay between retries.
        #[serde(default, with = "humantime_serde")]
        max_delay: Option<Duration>,
    },
}

impl Default for RetryPolicy {
    #[inline]
    fn default() -> Self {
        Self::Exponential {
            count: 8,
            delay: Duration::from_millis(100),
            jitter: true,
            max_delay: Some(Duration::from_secs(5)),
        }
    }
}

impl RetryPolicy {
    /// Create new policy with no delay between retries.
    pub fn new_without_delay(count: u32) -> Self {
        Self::Fixed {
            count,
            delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Returns the number of retries.
    pub fn count(&self) -> u32 {
        match self {
            Self::Fixed { count, .. } | Self::Exponential { count, .. } => *count,
        }
    }

    /// Returns an iterator over the delays before each retry.
    pub fn backoff(&self) -> BackoffIter {
        BackoffIter::new(*self)
    }

    fn validate<E: serde::de::Error>(&self) -> Result<(), E> {
        match self {
            Self::Fixed { delay, jitter, .. } => {
                // Jitter can't be specified if delay is 0.
                if delay.is_zero() && *jitter {
                    return Err(E::custom(
                        "`jitter` cannot be true if `delay` isn't specified or is zero",
                    ));
                }
            }
            Self::Exponential {
                count,
                delay,
                max_delay,
                ..
            } => {
                if *count == 0 {
                    return Err(E::custom("`count` cannot be zero with exponential backoff"));
                }
                if delay.is_zero() {
                    return Err(E::custom("`delay` cannot be zero with exponential backoff"));
                }
                if max_delay.is_some_and(|max_delay| max_delay < *delay) {
                    return Err(E::custom(
                        "`max-delay` cannot be less than delay with exponential backoff",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Deserializes a retry policy from either a bare retry count or a table.
pub(in crate::config) fn deserialize_retry_policy<'de, D>(
    deserializer: D,
) -> Result<Option<RetryPolicy>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct V;

    impl<'de2> serde::de::Visitor<'de2> for V {
        type Value = RetryPolicy;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            write!(
                formatter,
                "a table ({{ count = 5, backoff = \"exponential\", delay = \"100ms\", max-delay = \"5s\", jitter = true }}) or a number (5)"
            )
        }

        // Note that TOML uses i64, not u64.
        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            match v.cmp(&0) {
                Ordering::Greater | Ordering::Equal => {
                    let v = u32::try_from(v).map_err(|_| {
                        serde::de::Error::invalid_value(
                            serde::de::Unexpected::Signed(v),
                            &"a positive u32",
                        )
                    })?;
                    Ok(RetryPolicy::new_without_delay(v))
                }
                Ordering::Less => Err(serde::de::Error::invalid_value(
                    serde::de::Unexpected::Signed(v),
                    &self,
                )),
            }
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            let v = u32::try_from(v).map_err(|_| {
                serde::de::Error::invalid_value(serde::de::Unexpected::Unsigned(v), &"a u32")
            })?;
            Ok(RetryPolicy::new_without_delay(v))
        }

        fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
        where
            A: serde::de::MapAccess<'de2>,
        {
            RetryPolicy::deserialize(serde::de::value::MapAccessDeserializer::new(map))
        }
    }

    let retry_policy = deserializer.deserialize_any(V)?;
    retry_policy.validate::<D::Error>()?;
    Ok(Some(retry_policy))
}

/// An iterator over the delays before each delivery retry.
///
/// Yields exactly [`RetryPolicy::count`] delays.
#[derive(Debug)]
pub struct BackoffIter {
    policy: RetryPolicy,
    current_factor: f64,
    remaining_attempts: u32,
}

impl BackoffIter {
    const BACKOFF_EXPONENT: f64 = 2.;

    fn new(policy: RetryPolicy) -> Self {
        let remaining_attempts = policy.count();
        Self {
            policy,
            current_factor: 1.,
            remaining_attempts,
        }
    }

    fn next_delay_and_jitter(&mut self) -> (Duration, bool) {
        match self.policy {
            RetryPolicy::Fixed { delay, jitter, .. } => (delay, jitter),
            RetryPolicy::Exponential {
                delay,
                jitter,
                max_delay,
                ..
            } => {
                let exp_delay = delay.mul_f64(self.current_factor);

                // Stop growing once the cap is reached.
                if let Some(max_delay) = max_delay
                    && exp_delay > max_delay
                {
                    return (max_delay, jitter);
                }

                self.current_factor *= Self::BACKOFF_EXPONENT;
                (exp_delay, jitter)
            }
        }
    }

    fn apply_jitter(duration: Duration) -> Duration {
        let jitter: f64 = rand::random();
        // Scale into the range [0.5, 1).
        duration.mul_f64(0.5 + jitter / 2.)
    }
}

impl Iterator for BackoffIter {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining_attempts == 0 {
            return None;
        }
        let (mut delay, jitter) = self.next_delay_and_jitter();
        if jitter {
            delay = Self::apply_jitter(delay);
        }
        self.remaining_attempts -= 1;
        Some(delay)
    }
}
