// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::MaxWorkersParseError;
use serde::Deserialize;
use std::{cmp::Ordering, fmt, str::FromStr, sync::LazyLock};
use tracing::warn;

/// Type for the max-workers config key: how many worker processes may be alive at once.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MaxWorkers {
    /// Start every worker in a group at once.
    #[default]
    Unbounded,

    /// Run at most this many workers at once.
    Count(usize),

    /// Run at most as many workers as there are logical CPUs.
    NumCpus,
}

impl MaxWorkers {
    /// Gets the actual cap computed at runtime. [`MaxWorkers::Unbounded`] is `usize::MAX`.
    pub fn compute(self) -> usize {
        match self {
            Self::Unbounded => usize::MAX,
            Self::Count(workers) => workers,
            Self::NumCpus => get_num_cpus(),
        }
    }
}

impl FromStr for MaxWorkers {
    type Err = MaxWorkersParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unbounded" => return Ok(Self::Unbounded),
            "num-cpus" => return Ok(Self::NumCpus),
            _ => {}
        }

        match s.parse::<isize>() {
            Err(e) => Err(MaxWorkersParseError::new(format!("{s} ({e})"))),
            Ok(0) => Err(MaxWorkersParseError::new("0 (max-workers may not be 0)")),
            Ok(j) => Ok(Self::from_signed(j)),
        }
    }
}

impl MaxWorkers {
    fn from_signed(j: isize) -> Self {
        if j < 0 {
            Self::Count((get_num_cpus() as isize + j).max(1) as usize)
        } else {
            Self::Count(j as usize)
        }
    }
}

impl fmt::Display for MaxWorkers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbounded => write!(f, "unbounded"),
            Self::Count(workers) => write!(f, "{workers}"),
            Self::NumCpus => write!(f, "num-cpus"),
        }
    }
}

impl<'de> Deserialize<'de> for MaxWorkers {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = MaxWorkers;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(
                    formatter,
                    "an integer, or the string \"unbounded\" or \"num-cpus\""
                )
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                match v {
                    "unbounded" => Ok(MaxWorkers::Unbounded),
                    "num-cpus" => Ok(MaxWorkers::NumCpus),
                    _ => Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Str(v),
                        &self,
                    )),
                }
            }

            // Note that TOML uses i64, not u64.
            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                match v.cmp(&0) {
                    Ordering::Greater | Ordering::Less => Ok(MaxWorkers::from_signed(v as isize)),
                    Ordering::Equal => Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Signed(v),
                        &self,
                    )),
                }
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                match v {
                    0 => Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Unsigned(v),
                        &self,
                    )),
                    v => Ok(MaxWorkers::Count(v as usize)),
                }
            }
        }

        deserializer.deserialize_any(V)
    }
}

/// Returns the number of logical CPUs, computed once.
pub fn get_num_cpus() -> usize {
    static NUM_CPUS: LazyLock<usize> =
        LazyLock::new(|| match std::thread::available_parallelism() {
            Ok(count) => count.into(),
            Err(err) => {
                warn!("unable to determine num-cpus ({err}), assuming 1 logical CPU");
                1
            }
        });

    *NUM_CPUS
}
