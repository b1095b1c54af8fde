//! Best-effort license discovery for vendored skills.

use std::fs;
use std::path::Path;

use tracing::debug;

use super::lock::License;
use crate::security::path_policy::to_slash;
use crate::source::{Checkout, SourceProvider};

const CANDIDATES: [&str; 4] = ["LICENSE", "LICENSE.txt", "COPYING", "NOTICE"];

/// Finds a license file near a skill and guesses its SPDX identifier.
///
/// Never fails: anything that goes wrong simply yields no license.
#[derive(Debug, Clone, Copy, Default)]
pub struct LicenseProbe;

impl LicenseProbe {
    /// Look in `skill_dir`, then `base_dir`. The recorded path is relative to
    /// `base_dir`.
    #[must_use]
    pub fn probe(skill_dir: &Path, base_dir: &Path) -> Option<License> {
        let found = first_file(skill_dir).or_else(|| first_file(base_dir))?;
        let text = fs::read_to_string(&found).unwrap_or_default();
        let rel = found
            .strip_prefix(base_dir)
            .map_or_else(|_| found.to_string_lossy().into_owned(), to_slash);
        Some(License {
            spdx: detect_spdx(&text).map(ToString::to_string),
            path: Some(rel),
        })
    }

    /// Like [`probe`](Self::probe) against the checkout root, falling back to
    /// the files committed at HEAD (sparse checkouts may not have them on disk).
    pub fn probe_checkout<P>(provider: &P, checkout: &Checkout, skill_dir: &Path) -> Option<License>
    where
        P: SourceProvider + ?Sized,
    {
        if let Some(license) = Self::probe(skill_dir, checkout.root()) {
            return Some(license);
        }
        for name in CANDIDATES {
            match provider.read_file_at_head(checkout, name) {
                Ok(Some(text)) => {
                    return Some(License {
                        spdx: detect_spdx(&text).map(ToString::to_string),
                        path: Some(name.to_string()),
                    });
                }
                Ok(None) => {}
                Err(err) => {
                    debug!(target: "license", error = %err, "license lookup at HEAD failed");
                    return None;
                }
            }
        }
        None
    }
}

fn first_file(dir: &Path) -> Option<std::path::PathBuf> {
    CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| fs::metadata(path).is_ok_and(|meta| meta.is_file()))
}

/// Guess an SPDX identifier from license text.
#[must_use]
pub fn detect_spdx(text: &str) -> Option<&'static str> {
    if text.contains("MIT License") {
        Some("MIT")
    } else if text.contains("Apache License") {
        Some("Apache-2.0")
    } else if text.contains("BSD 3-Clause") {
        Some("BSD-3-Clause")
    } else {
        None
    }
}
