use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{CampaignStatus, Platform, Tone};
use crate::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignConfig {
    pub platform: Platform,
    #[serde(default = "default_status")]
    pub status: CampaignStatus,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub target_groups: Vec<String>,
}

fn default_status() -> CampaignStatus {
    CampaignStatus::Active
}

impl CampaignConfig {
    /// Keywords trimmed, blank entries dropped, case-insensitive duplicates
    /// removed while keeping first-seen order.
    #[must_use]
    pub fn normalized_keywords(&self) -> Vec<String> {
        ordered_set(&self.keywords)
    }

    /// Target groups with the same treatment; subreddit names lose any `r/` prefix.
    #[must_use]
    pub fn normalized_target_groups(&self) -> Vec<String> {
        let groups: Vec<String> = self
            .target_groups
            .iter()
            .map(|g| {
                let g = g.trim();
                if self.platform == Platform::Reddit {
                    g.trim_start_matches("/r/")
                        .trim_start_matches("r/")
                        .to_string()
                } else {
                    g.to_string()
                }
            })
            .collect();
        ordered_set(&groups)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub business_type: String,
    pub core_offering: String,
    #[serde(default)]
    pub preferred_tone: Tone,
    pub contact: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub campaigns: Vec<CampaignConfig>,
}

#[derive(Debug, Deserialize)]
pub struct BusinessesFile {
    pub businesses: Vec<BusinessConfig>,
}

/// Load and validate the businesses seed file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_businesses(path: &Path) -> Result<BusinessesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::BusinessesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let file: BusinessesFile = serde_yaml::from_str(&content)?;
    validate_businesses(&file)?;
    Ok(file)
}

fn validate_businesses(file: &BusinessesFile) -> Result<(), ConfigError> {
    let mut seen_names = HashSet::new();

    for business in &file.businesses {
        if business.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "business name must be non-empty".to_string(),
            ));
        }

        if business.core_offering.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "business '{}' has an empty core_offering",
                business.name
            )));
        }

        if !seen_names.insert(business.name.trim().to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate business name: '{}'",
                business.name
            )));
        }

        let mut seen_platforms = HashSet::new();
        for campaign in &business.campaigns {
            if !seen_platforms.insert(campaign.platform) {
                return Err(ConfigError::Validation(format!(
                    "business '{}' has more than one {} campaign",
                    business.name, campaign.platform
                )));
            }

            if campaign.platform == Platform::GoogleAlerts {
                if let Some(bad) = campaign
                    .target_groups
                    .iter()
                    .find(|url| !url.starts_with("https://") && !url.starts_with("http://"))
                {
                    return Err(ConfigError::Validation(format!(
                        "business '{}': google_alerts target '{bad}' is not an http(s) feed URL",
                        business.name
                    )));
                }
            }
        }
    }

    Ok(())
}

fn ordered_set(values: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .filter(|v| seen.insert(v.to_lowercase()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
#[path = "businesses_test.rs"]
mod tests;
