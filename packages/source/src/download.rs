//! One-shot download of the three public feeds.
//!
//! Each feed is fetched with retry and exponential backoff on transient
//! failures (connection errors, timeouts, HTTP 429, HTTP 5xx) and written to
//! the output directory under a fixed file name. Other 4xx responses are
//! permanent and fail immediately.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::SourceError;
use crate::config::AnalysisConfig;
use crate::progress::ProgressCallback;

/// Maximum number of retry attempts for transient HTTP errors.
///
/// With exponential backoff (2s, 4s, 8s, 16s) the total wait before giving
/// up is 30 seconds.
const MAX_RETRIES: u32 = 4;

/// Per-request timeout. The station export is tens of megabytes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Placeholder replaced by the API key in configured URLs.
const API_KEY_PLACEHOLDER: &str = "{api_key}";

/// File written for the station feed.
pub const STATIONS_FILE: &str = "stations.csv";
/// File written for the wide population feed.
pub const POPULATION_WIDE_FILE: &str = "population_wide.csv";
/// File written for the single-year population feed.
pub const POPULATION_SINGLE_YEAR_FILE: &str = "population_single_year.csv";

/// A resolved download: label, URL with the API key filled in, and target
/// file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    /// Human-readable label for log messages.
    pub label: &'static str,
    /// URL to fetch. May contain a secret; never log it.
    pub url: String,
    /// File name inside the output directory.
    pub file_name: &'static str,
}

/// Resolves the configured URLs into download targets.
///
/// `api_key` fills the `{api_key}` placeholder. Passing `None` is only an
/// error when some URL actually contains the placeholder.
///
/// # Errors
///
/// Returns [`SourceError::MissingApiKey`] if a URL needs a key and none was
/// given.
pub fn resolve_targets(
    config: &AnalysisConfig,
    api_key: Option<&str>,
) -> Result<Vec<DownloadTarget>, SourceError> {
    let sources = &config.sources;
    let fill = |url: &str| -> Result<String, SourceError> {
        if !url.contains(API_KEY_PLACEHOLDER) {
            return Ok(url.to_owned());
        }
        let key = api_key.ok_or_else(|| SourceError::MissingApiKey {
            var: sources.api_key_env.clone(),
        })?;
        Ok(url.replace(API_KEY_PLACEHOLDER, key))
    };

    Ok(vec![
        DownloadTarget {
            label: "stations",
            url: fill(&sources.stations_url)?,
            file_name: STATIONS_FILE,
        },
        DownloadTarget {
            label: "population (wide)",
            url: fill(&sources.population_wide_url)?,
            file_name: POPULATION_WIDE_FILE,
        },
        DownloadTarget {
            label: "population (single year)",
            url: fill(&sources.population_single_year_url)?,
            file_name: POPULATION_SINGLE_YEAR_FILE,
        },
    ])
}

/// Downloads every feed into `output_dir`, returning the written paths.
///
/// The API key is read from the environment variable named in the config.
/// `progress` advances once per feed.
///
/// # Errors
///
/// Returns [`SourceError`] if a key is required but unset, a download fails
/// after all retries, or a file cannot be written.
pub async fn fetch_sources(
    config: &AnalysisConfig,
    output_dir: &Path,
    progress: &dyn ProgressCallback,
) -> Result<Vec<PathBuf>, SourceError> {
    let api_key = std::env::var(&config.sources.api_key_env).ok();
    let targets = resolve_targets(config, api_key.as_deref())?;

    tokio::fs::create_dir_all(output_dir).await?;

    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| SourceError::Http(e.without_url()))?;

    let mut written = Vec::with_capacity(targets.len());
    progress.set_total(targets.len() as u64);

    for (i, target) in targets.iter().enumerate() {
        progress.set_message(format!("Downloading {}", target.label));
        log::info!(
            "[{}] Downloading {}/{}",
            target.label,
            i + 1,
            targets.len()
        );

        let bytes = download_with_retry(&client, target).await?;
        let path = output_dir.join(target.file_name);
        tokio::fs::write(&path, &bytes).await?;

        log::info!(
            "[{}] Wrote {} bytes to {}",
            target.label,
            bytes.len(),
            path.display()
        );
        written.push(path);
        progress.inc(1);
    }

    progress.finish(format!("Downloaded {} feeds", written.len()));

    Ok(written)
}

/// Wait before retry `attempt` (1-based).
const fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt)
}

/// Fetches one target, retrying transient failures with exponential
/// backoff.
async fn download_with_retry(
    client: &reqwest::Client,
    target: &DownloadTarget,
) -> Result<Vec<u8>, SourceError> {
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = backoff_delay(attempt);
            log::warn!(
                "[{}] retry {attempt}/{MAX_RETRIES} in {delay:?}...",
                target.label
            );
            tokio::time::sleep(delay).await;
        }

        let outcome = match client.get(&target.url).send().await {
            Err(e) => Err(e.without_url()),
            Ok(response) => Ok(response),
        };

        match outcome {
            Err(e) => {
                if is_transient(&e) && attempt < MAX_RETRIES {
                    log::warn!("[{}] transient error: {e}", target.label);
                    attempt += 1;
                    continue;
                }
                return Err(SourceError::Http(e));
            }
            Ok(response) => {
                let status = response.status();

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    if attempt < MAX_RETRIES {
                        log::warn!("[{}] HTTP {status}", target.label);
                        attempt += 1;
                        continue;
                    }
                    return Err(SourceError::HttpStatus {
                        label: target.label.to_owned(),
                        status: status.as_u16(),
                    });
                }

                if !status.is_success() {
                    return Err(SourceError::HttpStatus {
                        label: target.label.to_owned(),
                        status: status.as_u16(),
                    });
                }

                match response.bytes().await {
                    Ok(bytes) => return Ok(bytes.to_vec()),
                    Err(e) if attempt < MAX_RETRIES => {
                        log::warn!(
                            "[{}] body read failed: {}",
                            target.label,
                            e.without_url()
                        );
                        attempt += 1;
                    }
                    Err(e) => return Err(SourceError::Http(e.without_url())),
                }
            }
        }
    }
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_thirty_seconds_total() {
        let delays: Vec<_> = (1..=MAX_RETRIES).map(backoff_delay).collect();
        assert_eq!(delays, [2, 4, 8, 16].map(Duration::from_secs).to_vec());
        assert_eq!(delays.iter().sum::<Duration>(), Duration::from_secs(30));
    }

    #[test]
    fn fills_api_key_placeholder() {
        let config = AnalysisConfig::default();
        let targets = resolve_targets(&config, Some("secret")).unwrap();
        assert_eq!(targets.len(), 3);
        assert!(targets[0].url.contains("api_key=secret"));
        assert!(!targets[0].url.contains(API_KEY_PLACEHOLDER));
        assert_eq!(targets[1].file_name, POPULATION_WIDE_FILE);
    }

    #[test]
    fn missing_key_is_an_error_only_when_needed() {
        let config = AnalysisConfig::default();
        let err = resolve_targets(&config, None).unwrap_err();
        assert!(matches!(err, SourceError::MissingApiKey { var } if var == "NREL_API_KEY"));

        let mut keyless = AnalysisConfig::default();
        keyless.sources.stations_url = "https://example.com/stations.csv".to_owned();
        assert!(resolve_targets(&keyless, None).is_ok());
    }
}
