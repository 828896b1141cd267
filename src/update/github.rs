//! GitHub releases backend for the update worker.
//!
//! Lists the project's releases, picks the best candidate for the active
//! channel and downloads its platform asset into the update cache.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use log::{debug, info};
use serde::Deserialize;

use super::{CheckOutcome, CheckRequest, ReleaseSource, Version};
use crate::model::StagedUpdate;

const GITHUB_API_BASE: &str = "https://api.github.com";

const RELEASES_REPO: &str = "inbox-shell/inbox-shell";

const USER_AGENT: &str = concat!("Inbox-Shell-Updater/", env!("CARGO_PKG_VERSION"));

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

/// File name suffix of the installer published for this platform.
pub fn platform_asset_suffix() -> &'static str {
    if cfg!(target_os = "macos") {
        ".dmg"
    } else if cfg!(target_os = "windows") {
        "-setup.exe"
    } else {
        ".AppImage"
    }
}

/// Picks the release to stage, if any.
///
/// Drafts and releases without a matching asset never qualify; prereleases
/// only when allowed. Without `allow_downgrade` the candidate must be newer
/// than the running version; with it, any version other than the running one
/// qualifies so a switch to stable can leave a prerelease build.
pub fn select_candidate<'a>(
    releases: &'a [Release],
    current: &Version,
    allow_prerelease: bool,
    allow_downgrade: bool,
    asset_suffix: &str,
) -> Option<(Version, &'a Release, &'a ReleaseAsset)> {
    releases
        .iter()
        .filter(|release| !release.draft)
        .filter_map(|release| {
            let version = release.tag_name.parse::<Version>().ok()?;
            if (version.is_prerelease() || release.prerelease) && !allow_prerelease {
                return None;
            }
            let asset = release
                .assets
                .iter()
                .find(|asset| asset.name.ends_with(asset_suffix))?;
            Some((version, release, asset))
        })
        .max_by(|(a, _, _), (b, _, _)| a.cmp(b))
        .filter(|(version, _, _)| {
            if allow_downgrade {
                version != current
            } else {
                version > current
            }
        })
}

pub struct GitHubReleases {
    client: reqwest::blocking::Client,
    download_dir: PathBuf,
}

impl GitHubReleases {
    pub fn new(download_dir: PathBuf) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            download_dir,
        })
    }

    fn fetch_releases(&self) -> Result<Vec<Release>> {
        let url = format!("{}/repos/{}/releases", GITHUB_API_BASE, RELEASES_REPO);
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github.v3+json")
            .send()
            .context("failed to reach the releases API")?;
        if !response.status().is_success() {
            bail!("releases API answered with status {}", response.status());
        }
        response.json().context("malformed releases manifest")
    }

    fn download(&self, asset: &ReleaseAsset) -> Result<PathBuf> {
        fs::create_dir_all(&self.download_dir).context("failed to create update directory")?;
        let dest = self.download_dir.join(&asset.name);
        if dest.exists() {
            debug!("Update asset {:?} already downloaded", dest);
            return Ok(dest);
        }

        let mut response = self
            .client
            .get(&asset.browser_download_url)
            .send()
            .context("failed to connect to download server")?;
        if !response.status().is_success() {
            bail!("download failed with status {}", response.status());
        }

        let partial = partial_path(&dest);
        let mut file = File::create(&partial).context("failed to create download file")?;
        io::copy(&mut response, &mut file).context("failed to write download file")?;
        drop(file);
        fs::rename(&partial, &dest).context("failed to finalize download")?;
        Ok(dest)
    }
}

impl ReleaseSource for GitHubReleases {
    fn check(&self, request: &CheckRequest) -> Result<CheckOutcome> {
        let releases = self.fetch_releases()?;
        let Some((version, release, asset)) = select_candidate(
            &releases,
            &request.current,
            request.allow_prerelease,
            request.allow_downgrade,
            platform_asset_suffix(),
        ) else {
            debug!("No release newer than {} in {} entries", request.current, releases.len());
            return Ok(CheckOutcome::NoUpdate);
        };

        info!("Downloading {} ({})", release.tag_name, asset.name);
        let path = self.download(asset)?;
        Ok(CheckOutcome::Staged(StagedUpdate {
            version: version.to_string(),
            path,
        }))
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
