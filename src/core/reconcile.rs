//! Reconciliation: turn manifest entries into verified lock entries.
//!
//! For each declared skill the [`Reconciler`] decides whether the vendored
//! copy can be reused, must be fetched again, or must be rejected, according
//! to the active [`Policy`]. Skills are processed one at a time in manifest
//! order and the first failure stops the run.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use super::hash::ContentHasher;
use super::license::LicenseProbe;
use super::links::LinkManager;
use super::lock::{LockEntry, Lockfile};
use super::manifest::{LocalSource, Manifest, ManifestEntry, RemoteSource, SkillSource};
use super::vendor::VendorStore;
use crate::error::{Result, SkvError};
use crate::security::path_policy::resolve_local_path;
use crate::source::{SourceProvider, is_commit_ref};
use crate::utils::fs::same_path;

/// How to treat existing vendored content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Policy {
    /// Reuse content that matches the lock, fetch anything new or changed in the manifest.
    #[default]
    Normal,
    /// Never contact a source; everything must already match the lock.
    Offline,
    /// Fetch every remote skill again.
    Refresh,
    /// Record whatever is currently vendored as the new truth.
    AcceptLocal,
}

impl Policy {
    /// Pick a policy from mutually exclusive command-line flags.
    pub fn from_flags(offline: bool, refresh: bool, accept_local: bool) -> Result<Self> {
        match (offline, refresh, accept_local) {
            (true, false, false) => Ok(Self::Offline),
            (false, true, false) => Ok(Self::Refresh),
            (false, false, true) => Ok(Self::AcceptLocal),
            (false, false, false) => Ok(Self::Normal),
            (true, _, _) => Err(SkvError::Usage(
                "offline mode is incompatible with --refresh or --accept-local".to_string(),
            )),
            (false, true, true) => Err(SkvError::Usage(
                "--refresh and --accept-local are mutually exclusive".to_string(),
            )),
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Normal => "normal",
            Self::Offline => "offline",
            Self::Refresh => "refresh",
            Self::AcceptLocal => "accept-local",
        })
    }
}

/// Which skills `update` should fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateSelection {
    /// Every remote skill that is not pinned to a commit.
    All,
    /// One named skill, optionally at a different ref than the manifest declares.
    One {
        name: String,
        ref_override: Option<String>,
    },
}

impl UpdateSelection {
    /// Interpret `update [name] [--all] [--ref R]`.
    pub fn from_args(name: Option<&str>, all: bool, reference: Option<&str>) -> Result<Self> {
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        let reference = reference.map(str::trim).filter(|r| !r.is_empty());
        match (name, all, reference) {
            (None, _, Some(_)) => Err(SkvError::Usage(
                "--ref requires a skill name".to_string(),
            )),
            (_, true, Some(_)) => Err(SkvError::Usage(
                "--ref cannot be used with --all".to_string(),
            )),
            (Some(_), true, None) => Err(SkvError::Usage(
                "cannot combine a skill name with --all".to_string(),
            )),
            (None, _, None) => Ok(Self::All),
            (Some(name), false, reference) => Ok(Self::One {
                name: name.to_string(),
                ref_override: reference.map(ToString::to_string),
            }),
        }
    }
}

/// Result of an update run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub lock: Lockfile,
    /// Names of the skills that were fetched, in manifest order.
    pub updated: Vec<String>,
}

/// Drives a manifest toward the vendored state.
pub struct Reconciler<'a, P: SourceProvider + ?Sized> {
    repo_root: &'a Path,
    provider: &'a P,
    vendor: &'a VendorStore,
    hasher: &'a ContentHasher,
    force: bool,
}

impl<'a, P: SourceProvider + ?Sized> Reconciler<'a, P> {
    pub const fn new(
        repo_root: &'a Path,
        provider: &'a P,
        vendor: &'a VendorStore,
        hasher: &'a ContentHasher,
    ) -> Self {
        Self {
            repo_root,
            provider,
            vendor,
            hasher,
            force: false,
        }
    }

    /// Accept tags that moved since they were locked.
    #[must_use]
    pub const fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Reconcile every manifest skill and link it.
    ///
    /// Returns the new lock, one entry per manifest skill, sorted by name.
    /// Nothing is written to disk apart from vendored content and links.
    #[instrument(skip_all, fields(%policy, skills = manifest.skills.len()))]
    pub fn sync(
        &self,
        manifest: &Manifest,
        lock: &Lockfile,
        policy: Policy,
        links: &LinkManager,
    ) -> Result<Lockfile> {
        manifest.validate()?;
        if policy != Policy::Offline {
            fs::create_dir_all(self.vendor.root())?;
        }

        let index = lock.index();
        let mut entries = Vec::with_capacity(manifest.skills.len());
        for entry in &manifest.skills {
            let prior = index.get(entry.name.as_str()).copied();
            let locked = self.reconcile(entry, prior, policy)?;
            links.link(&entry.name)?;
            entries.push(locked);
        }
        Ok(Lockfile::new(entries))
    }

    /// Fetch the selected remote skills again and link them.
    ///
    /// Entries for skills that were not selected carry over from `lock`.
    #[instrument(skip_all)]
    pub fn update(
        &self,
        manifest: &Manifest,
        lock: &Lockfile,
        selection: &UpdateSelection,
        links: &LinkManager,
    ) -> Result<UpdateOutcome> {
        manifest.validate()?;
        let targets = select_targets(manifest, selection)?;

        let mut resolved: BTreeMap<String, LockEntry> = lock
            .skills
            .iter()
            .map(|entry| (entry.name.clone(), entry.clone()))
            .collect();

        if !targets.is_empty() {
            fs::create_dir_all(self.vendor.root())?;
        }

        let mut updated = Vec::with_capacity(targets.len());
        for (name, remote) in targets {
            info!(target: "reconcile", skill = %name, "updating");
            let locked = self.fetch(&name, &remote, resolved.get(&name))?;
            links.link(&name)?;
            resolved.insert(name.clone(), locked);
            updated.push(name);
        }

        let entries = manifest
            .skills
            .iter()
            .filter_map(|entry| resolved.remove(&entry.name))
            .collect();
        Ok(UpdateOutcome {
            lock: Lockfile::new(entries),
            updated,
        })
    }

    /// Produce the lock entry for one skill under `policy`.
    pub fn reconcile(
        &self,
        entry: &ManifestEntry,
        prior: Option<&LockEntry>,
        policy: Policy,
    ) -> Result<LockEntry> {
        debug!(target: "reconcile", skill = %entry.name, %policy, has_prior = prior.is_some(), "reconciling");
        match (&entry.source, policy) {
            (_, Policy::Offline) => self.verify_offline(entry, prior),
            (SkillSource::Remote(_), Policy::AcceptLocal) => self.accept_remote(entry, prior),
            (SkillSource::Local(_), Policy::AcceptLocal) => self.accept_local(entry),
            (SkillSource::Local(local), Policy::Normal | Policy::Refresh) => {
                self.vendor_local(&entry.name, local)
            }
            (SkillSource::Remote(remote), Policy::Refresh) => {
                self.fetch(&entry.name, remote, prior)
            }
            (SkillSource::Remote(remote), Policy::Normal) => match prior {
                Some(prior) if prior.matches(&entry.source) => {
                    self.verify_vendored(prior)?;
                    debug!(target: "reconcile", skill = %entry.name, "reusing vendored copy");
                    Ok(prior.clone())
                }
                _ => self.fetch(&entry.name, remote, prior),
            },
        }
    }

    /// Clone, validate, vendor and fingerprint a remote skill.
    #[instrument(skip(self, remote, prior), fields(repo = %remote.repo))]
    pub fn fetch(
        &self,
        name: &str,
        remote: &RemoteSource,
        prior: Option<&LockEntry>,
    ) -> Result<LockEntry> {
        let subpath = remote.subpath.as_deref();
        let checkout =
            self.provider
                .clone_at(&remote.repo, remote.reference.as_deref(), subpath)?;
        self.vendor.check_checkout_size(checkout.root())?;
        let commit = self.provider.head_commit(&checkout)?;

        if let Some(reference) = remote.reference.as_deref() {
            if self.provider.is_tag(&checkout, reference)? {
                self.check_tag_pin(name, remote, reference, &commit, prior)?;
            }
        }

        let skill_root = checkout.skill_root(subpath);
        self.vendor.validate(&skill_root).map_err(|err| match err {
            SkvError::MissingMarker { .. } if subpath.is_none() => SkvError::Validation(format!(
                "{} has no SKILL.md at its root; specify a :path to the skill directory",
                remote.repo
            )),
            other => other,
        })?;

        let dst = self.vendor.skill_dir(name);
        self.vendor.materialize(&skill_root, &dst)?;
        self.vendor
            .validate(&dst)
            .map_err(|err| err.into_integrity(name))?;
        let checksum = self.hasher.fingerprint(&dst)?;
        let license = LicenseProbe::probe_checkout(self.provider, &checkout, &skill_root);

        info!(target: "reconcile", skill = name, %commit, %checksum, "vendored");
        Ok(LockEntry {
            name: name.to_string(),
            source: SkillSource::Remote(remote.clone()),
            commit: Some(commit),
            checksum,
            license,
        })
    }

    fn check_tag_pin(
        &self,
        name: &str,
        remote: &RemoteSource,
        tag: &str,
        resolved: &str,
        prior: Option<&LockEntry>,
    ) -> Result<()> {
        let Some(prior) = prior else {
            return Ok(());
        };
        let SkillSource::Remote(locked) = &prior.source else {
            return Ok(());
        };
        if locked.repo != remote.repo || locked.reference.as_deref() != Some(tag) {
            return Ok(());
        }
        match prior.commit.as_deref() {
            Some(recorded) if recorded != resolved => {
                if self.force {
                    info!(target: "reconcile", skill = name, tag, recorded, resolved, "accepting moved tag");
                    Ok(())
                } else {
                    Err(SkvError::TagMoved {
                        name: name.to_string(),
                        tag: tag.to_string(),
                        recorded: recorded.to_string(),
                        resolved: resolved.to_string(),
                    })
                }
            }
            _ => Ok(()),
        }
    }

    fn vendor_local(&self, name: &str, local: &LocalSource) -> Result<LockEntry> {
        let src = resolve_local_path(self.repo_root, &local.path)?;
        self.vendor.validate(&src)?;

        let dst = self.vendor.skill_dir(name);
        if same_path(&src, &dst)? {
            debug!(target: "reconcile", skill = name, "local source is the vendor directory");
        } else {
            self.vendor.materialize(&src, &dst)?;
            self.vendor
                .validate(&dst)
                .map_err(|err| err.into_integrity(name))?;
        }

        let checksum = self.hasher.fingerprint(&dst)?;
        Ok(LockEntry {
            name: name.to_string(),
            source: SkillSource::Local(local.clone()),
            commit: None,
            checksum,
            license: LicenseProbe::probe(&dst, self.repo_root),
        })
    }

    fn accept_local(&self, entry: &ManifestEntry) -> Result<LockEntry> {
        let dir = self.require_vendor_dir(&entry.name)?;
        self.vendor.validate(&dir)?;
        let checksum = self.hasher.fingerprint(&dir)?;
        Ok(LockEntry {
            name: entry.name.clone(),
            source: entry.source.clone(),
            commit: None,
            checksum,
            license: LicenseProbe::probe(&dir, self.repo_root),
        })
    }

    fn accept_remote(&self, entry: &ManifestEntry, prior: Option<&LockEntry>) -> Result<LockEntry> {
        let prior = require_matching_prior(entry, prior, "accept-local")?;
        let dir = self.require_vendor_dir(&entry.name)?;
        self.vendor.validate(&dir)?;
        let checksum = self.hasher.fingerprint(&dir)?;
        let license = LicenseProbe::probe(&dir, &dir).or_else(|| prior.license.clone());

        if checksum != prior.checksum {
            info!(target: "reconcile", skill = %entry.name, old = %prior.checksum, new = %checksum, "accepting local changes");
        }
        Ok(LockEntry {
            name: entry.name.clone(),
            source: entry.source.clone(),
            commit: prior.commit.clone(),
            checksum,
            license,
        })
    }

    fn verify_offline(&self, entry: &ManifestEntry, prior: Option<&LockEntry>) -> Result<LockEntry> {
        let prior = require_matching_prior(entry, prior, "offline mode")?;
        self.verify_vendored(prior)?;
        Ok(prior.clone())
    }

    /// The vendored copy exists, is valid and hashes to the locked checksum.
    fn verify_vendored(&self, prior: &LockEntry) -> Result<()> {
        let dir = self.vendor.skill_dir(&prior.name);
        if !dir.exists() {
            return Err(SkvError::VendorMissing {
                name: prior.name.clone(),
            });
        }
        self.vendor.validate(&dir)?;
        let actual = self.hasher.fingerprint(&dir)?;
        if actual != prior.checksum {
            return Err(SkvError::Drift {
                name: prior.name.clone(),
                expected: prior.checksum.clone(),
                actual,
            });
        }
        Ok(())
    }

    fn require_vendor_dir(&self, name: &str) -> Result<PathBuf> {
        let dir = self.vendor.skill_dir(name);
        if dir.exists() {
            Ok(dir)
        } else {
            Err(SkvError::VendorMissing {
                name: name.to_string(),
            })
        }
    }
}

fn require_matching_prior<'l>(
    entry: &ManifestEntry,
    prior: Option<&'l LockEntry>,
    mode: &str,
) -> Result<&'l LockEntry> {
    let Some(prior) = prior else {
        return Err(SkvError::LockMismatch {
            name: entry.name.clone(),
            reason: format!("{mode} requires an existing lock entry"),
        });
    };
    if !prior.matches(&entry.source) {
        return Err(SkvError::LockMismatch {
            name: entry.name.clone(),
            reason: format!("{mode} requires the lock entry to match the manifest"),
        });
    }
    Ok(prior)
}

fn select_targets(
    manifest: &Manifest,
    selection: &UpdateSelection,
) -> Result<Vec<(String, RemoteSource)>> {
    match selection {
        UpdateSelection::All => Ok(manifest
            .skills
            .iter()
            .filter_map(|entry| match &entry.source {
                SkillSource::Remote(remote)
                    if !remote.reference.as_deref().is_some_and(is_commit_ref) =>
                {
                    Some((entry.name.clone(), remote.clone()))
                }
                _ => None,
            })
            .collect()),
        UpdateSelection::One { name, ref_override } => {
            let entry = manifest.find(name).ok_or_else(|| {
                SkvError::NotFound(format!("skill {name:?} not found in manifest"))
            })?;
            let SkillSource::Remote(remote) = &entry.source else {
                return Err(SkvError::Validation(format!(
                    "cannot update local skill {name:?}"
                )));
            };
            let mut remote = remote.clone();
            match ref_override {
                Some(reference) => remote.reference = Some(reference.clone()),
                None if remote.reference.as_deref().is_some_and(is_commit_ref) => {
                    return Err(SkvError::Validation(format!(
                        "skill {name:?} is pinned to a commit"
                    )));
                }
                None => {}
            }
            Ok(vec![(name.clone(), remote)])
        }
    }
}
