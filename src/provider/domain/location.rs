//! Provider source locations: container images and network endpoints.
//!
//! A provider is declared either by a container image reference (managed,
//! deployed by the orchestrator) or by a network URL (unmanaged, assumed
//! reachable). Both forms normalize to a canonical string that feeds the
//! deterministic provider id derivation, so syntactically different but
//! semantically equal spellings collide on purpose.

use super::{ProviderDomainError, ProviderId};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Default image registry applied to bare repository references.
const DEFAULT_REGISTRY: &str = "docker.io";

/// Default tag applied to untagged image references.
const DEFAULT_TAG: &str = "latest";

/// Normalized container image reference (registry, repository, tag).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageLocation {
    registry: String,
    repository: String,
    tag: String,
}

impl ImageLocation {
    /// Parses and normalizes an image reference.
    ///
    /// Bare references gain the `docker.io` registry and `library/`
    /// namespace; untagged references gain `:latest`, so `foo` normalizes
    /// to `docker.io/library/foo:latest`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderDomainError`] when the reference is empty or
    /// contains invalid characters.
    pub fn parse(reference: &str) -> Result<Self, ProviderDomainError> {
        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return Err(ProviderDomainError::EmptyLocation);
        }

        let (name, tag) = match trimmed.rsplit_once(':') {
            Some((head, candidate)) if !candidate.contains('/') => (head, candidate),
            _ => (trimmed, DEFAULT_TAG),
        };
        if name.is_empty() || tag.is_empty() {
            return Err(ProviderDomainError::InvalidImageReference {
                reference: reference.to_owned(),
                reason: "missing repository or tag".to_owned(),
            });
        }

        let (registry, repo_path) = match name.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (first.to_owned(), rest.to_owned())
            }
            _ => (DEFAULT_REGISTRY.to_owned(), name.to_owned()),
        };

        let repository = if registry == DEFAULT_REGISTRY && !repo_path.contains('/') {
            format!("library/{repo_path}")
        } else {
            repo_path
        };

        if repository.is_empty()
            || !repository
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "._-/".contains(c))
        {
            return Err(ProviderDomainError::InvalidImageReference {
                reference: reference.to_owned(),
                reason: "repository must be lowercase alphanumeric with ._-/ separators"
                    .to_owned(),
            });
        }

        Ok(Self {
            registry,
            repository,
            tag: tag.to_owned(),
        })
    }

    /// Returns the registry host.
    #[must_use]
    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Returns the repository path.
    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Returns the image tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the canonical `registry/repository:tag` reference.
    #[must_use]
    pub fn normalized(&self) -> String {
        format!("{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

impl fmt::Display for ImageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized())
    }
}

/// Normalized network endpoint for an unmanaged provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkLocation {
    url: Url,
}

impl NetworkLocation {
    /// Parses and normalizes a provider endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderDomainError`] when the URL does not parse or uses
    /// a scheme other than http/https.
    pub fn parse(raw: &str) -> Result<Self, ProviderDomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ProviderDomainError::EmptyLocation);
        }
        let url = Url::parse(trimmed).map_err(|err| ProviderDomainError::InvalidNetworkUrl {
            url: raw.to_owned(),
            reason: err.to_string(),
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ProviderDomainError::UnsupportedScheme {
                url: raw.to_owned(),
            });
        }
        Ok(Self { url })
    }

    /// Returns the parsed endpoint URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the canonical endpoint string (no trailing slash).
    #[must_use]
    pub fn normalized(&self) -> String {
        let rendered = self.url.to_string();
        rendered.trim_end_matches('/').to_owned()
    }

    /// Returns the host component, or an empty string for hostless URLs.
    #[must_use]
    pub fn host(&self) -> String {
        self.url.host_str().unwrap_or_default().to_owned()
    }
}

impl fmt::Display for NetworkLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized())
    }
}

/// Tagged union over the two provider source forms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderLocation {
    /// Container image reference; the provider is deployed and managed.
    Image(ImageLocation),
    /// Network endpoint; the provider is unmanaged and assumed reachable.
    Network(NetworkLocation),
}

impl ProviderLocation {
    /// Parses a raw location string, dispatching on the scheme prefix.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderDomainError`] when neither form parses.
    pub fn parse(raw: &str) -> Result<Self, ProviderDomainError> {
        let trimmed = raw.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Ok(Self::Network(NetworkLocation::parse(trimmed)?))
        } else {
            Ok(Self::Image(ImageLocation::parse(trimmed)?))
        }
    }

    /// Returns the canonical string used for id derivation and uniqueness.
    #[must_use]
    pub fn normalized(&self) -> String {
        match self {
            Self::Image(image) => image.normalized(),
            Self::Network(network) => network.normalized(),
        }
    }

    /// Derives the deterministic provider id for this location.
    #[must_use]
    pub fn derive_id(&self) -> ProviderId {
        ProviderId::from_source(&self.normalized())
    }

    /// Returns whether the provider has orchestrator-managed compute.
    #[must_use]
    pub const fn is_managed(&self) -> bool {
        matches!(self, Self::Image(_))
    }

    /// Returns the default origin grouping for this location.
    ///
    /// Image providers group by registry host, network providers by
    /// endpoint host.
    #[must_use]
    pub fn default_origin(&self) -> String {
        match self {
            Self::Image(image) => image.registry().to_owned(),
            Self::Network(network) => network.host(),
        }
    }
}

impl fmt::Display for ProviderLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized())
    }
}
