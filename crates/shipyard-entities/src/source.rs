//! Where a service's deployable artifact comes from.

use serde::{Deserialize, Serialize};

use crate::types::RepositoryProvider;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServiceSource {
    /// Built from a git repository
    Repository {
        url: String,
        provider: Option<RepositoryProvider>,
        branch: Option<String>,
    },
    /// Pulled from a container registry
    Image { image: String, tag: Option<String> },
}

impl ServiceSource {
    pub fn repository(url: impl Into<String>, branch: impl Into<String>) -> Self {
        ServiceSource::Repository {
            url: url.into(),
            provider: None,
            branch: Some(branch.into()),
        }
    }

    pub fn image(image: impl Into<String>, tag: impl Into<String>) -> Self {
        ServiceSource::Image {
            image: image.into(),
            tag: Some(tag.into()),
        }
    }

    /// Provider guessed from the repository host when the caller did not name one
    pub fn detect_provider(url: &str) -> Option<RepositoryProvider> {
        let lower = url.to_lowercase();
        if lower.contains("github.com") {
            Some(RepositoryProvider::Github)
        } else if lower.contains("gitlab.") {
            Some(RepositoryProvider::Gitlab)
        } else if lower.contains("bitbucket.org") {
            Some(RepositoryProvider::Bitbucket)
        } else {
            None
        }
    }

    pub fn is_repository(&self) -> bool {
        matches!(self, ServiceSource::Repository { .. })
    }
}
