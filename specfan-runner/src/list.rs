// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Spec discovery.
//!
//! Each glob passed to specfan becomes one [`SpecGroup`]. Groups are run one after the other,
//! while the specs within a group run concurrently.

use crate::errors::DiscoveryError;
use camino::{Utf8Path, Utf8PathBuf};
use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use walkdir::WalkDir;

/// The identifier of a single spec, typically a path.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct SpecId(String);

impl SpecId {
    /// Creates a new `SpecId`.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SpecId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SpecId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// The specs matched by one glob.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpecGroup {
    /// The glob the specs were matched by.
    pub pattern: String,

    /// The matched specs, sorted.
    pub specs: Vec<SpecId>,
}

/// The full set of specs for a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpecList {
    groups: Vec<SpecGroup>,
}

impl SpecList {
    /// Discovers specs under `root` that match `patterns` and aren't excluded.
    ///
    /// Patterns are matched against paths relative to `root` (or against absolute paths, for
    /// absolute patterns). `*` doesn't cross directory boundaries while `**` does. An `exclude`
    /// entry removes a spec if it's equal to the spec's path or matches it as a glob.
    pub fn discover(
        patterns: &[impl AsRef<str>],
        exclude: &[impl AsRef<str>],
        root: &Utf8Path,
    ) -> Result<Self, DiscoveryError> {
        let exclude = ExcludeSet::new(exclude)?;
        let groups = patterns
            .iter()
            .map(|pattern| discover_group(pattern.as_ref(), &exclude, root))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { groups })
    }

    /// Creates a list from groups that were already resolved.
    pub fn from_groups(groups: impl IntoIterator<Item = SpecGroup>) -> Self {
        Self {
            groups: groups.into_iter().collect(),
        }
    }

    /// Returns the groups in this list, in the order they'll be run.
    pub fn groups(&self) -> &[SpecGroup] {
        &self.groups
    }

    /// Returns the total number of specs across all groups.
    pub fn spec_count(&self) -> usize {
        self.groups.iter().map(|group| group.specs.len()).sum()
    }

    /// Returns true if no specs matched.
    pub fn is_empty(&self) -> bool {
        self.spec_count() == 0
    }

    /// Iterates over every spec, group by group.
    pub fn iter_specs(&self) -> impl Iterator<Item = &SpecId> + '_ {
        self.groups.iter().flat_map(|group| &group.specs)
    }
}

struct ExcludeSet {
    literals: Vec<String>,
    globs: GlobSet,
}

impl ExcludeSet {
    fn new(exclude: &[impl AsRef<str>]) -> Result<Self, DiscoveryError> {
        let mut literals = Vec::with_capacity(exclude.len());
        let mut builder = GlobSetBuilder::new();
        for entry in exclude {
            let entry = entry.as_ref();
            literals.push(normalize(entry).to_owned());
            builder.add(build_glob(normalize(entry))?);
        }
        let globs = builder.build().map_err(|err| DiscoveryError::InvalidGlob {
            pattern: exclude
                .iter()
                .map(|entry| entry.as_ref())
                .collect::<Vec<_>>()
                .join(", "),
            err,
        })?;
        Ok(Self { literals, globs })
    }

    fn is_excluded(&self, id: &str) -> bool {
        self.literals.iter().any(|literal| literal == id) || self.globs.is_match(id)
    }
}

fn discover_group(
    pattern: &str,
    exclude: &ExcludeSet,
    root: &Utf8Path,
) -> Result<SpecGroup, DiscoveryError> {
    let normalized = normalize(pattern);
    let matcher = build_glob(normalized)?.compile_matcher();
    let base = literal_prefix(normalized);
    let walk_root = root.join(&base);
    debug!(%pattern, %walk_root, "discovering specs");

    let mut specs = Vec::new();
    if walk_root.exists() {
        for entry in WalkDir::new(&walk_root).follow_links(true) {
            let entry = entry.map_err(|err| DiscoveryError::Walk {
                root: walk_root.clone(),
                err,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = Utf8Path::from_path(entry.path()).ok_or_else(|| {
                DiscoveryError::NonUtf8Path {
                    path: entry.path().to_owned(),
                }
            })?;
            if let Some(id) = spec_id_for(path, root, &base, &matcher)
                && !exclude.is_excluded(&id)
            {
                specs.push(SpecId::new(id));
            }
        }
    }
    specs.sort_unstable();
    specs.dedup();

    debug!(%pattern, count = specs.len(), "discovered specs");
    Ok(SpecGroup {
        pattern: pattern.to_owned(),
        specs,
    })
}

fn spec_id_for(
    path: &Utf8Path,
    root: &Utf8Path,
    base: &Utf8Path,
    matcher: &GlobMatcher,
) -> Option<String> {
    let id = if base.is_absolute() {
        path.to_owned()
    } else {
        path.strip_prefix(root).ok()?.to_owned()
    };
    // Globs are written with forward slashes on every platform.
    let id = id.as_str().replace(std::path::MAIN_SEPARATOR, "/");
    matcher.is_match(&id).then_some(id)
}

/// Returns the leading components of `pattern` that contain no glob metacharacters.
fn literal_prefix(pattern: &str) -> Utf8PathBuf {
    let mut components: Vec<_> = Utf8Path::new(pattern).components().collect();
    // The final component names the spec files themselves and is always matched.
    components.pop();
    components
        .into_iter()
        .map(|component| component.as_str())
        .take_while(|component| !has_glob_meta(component))
        .collect()
}

fn has_glob_meta(s: &str) -> bool {
    s.contains(['*', '?', '[', ']', '{', '}'])
}

fn normalize(pattern: &str) -> &str {
    let mut pattern = pattern;
    while let Some(rest) = pattern.strip_prefix("./") {
        pattern = rest;
    }
    pattern
}

fn build_glob(pattern: &str) -> Result<Glob, DiscoveryError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|err| DiscoveryError::InvalidGlob {
            pattern: pattern.to_owned(),
            err,
        })
}
