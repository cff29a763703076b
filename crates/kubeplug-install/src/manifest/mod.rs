//! Plugin manifest types describing installable artifacts per platform.
//!
//! A [`Plugin`] is the YAML document a plugin index publishes for each
//! plugin. The same document, as it existed at install time, is persisted as
//! the install receipt, so the model round-trips through
//! [`Plugin::from_yaml`] and [`Plugin::to_yaml`] without loss.
//!
//! Manifests are untrusted input. [`Plugin::validate`] rejects names that are
//! unsafe as path components, versions that do not parse, and platform
//! entries missing the fields the installer relies on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::InstallError;
use crate::version::PluginVersion;

/// API version stamped on manifests built in code.
pub const MANIFEST_API_VERSION: &str = "kubeplug.dev/v1alpha2";
/// Kind stamped on manifests built in code.
pub const MANIFEST_KIND: &str = "Plugin";

const SHA256_HEX_LEN: usize = 64;
const MAX_NAME_LEN: usize = 128;

/// A plugin manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plugin {
    /// Schema version of the document.
    pub api_version: String,
    /// Document kind, always `Plugin` for valid manifests.
    pub kind: String,
    /// Identity of the plugin.
    pub metadata: ObjectMeta,
    /// Installable content.
    pub spec: PluginSpec,
}

/// Identity fields of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Plugin name and install key.
    pub name: String,
}

/// Version, descriptive text and per-platform artifacts of a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSpec {
    /// Version string in `vMAJOR.MINOR.PATCH` form.
    pub version: String,
    /// Project homepage.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub homepage: String,
    /// One-line summary.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub short_description: String,
    /// Long description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Text shown to the user after installation.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub caveats: String,
    /// Ordered platform entries; the first match wins.
    #[serde(default)]
    pub platforms: Vec<Platform>,
}

/// One OS/architecture-specific artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    /// Label selector over `os` and `arch`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
    /// Archive location.
    pub uri: String,
    /// Expected SHA-256 of the archive bytes, hex encoded.
    pub sha256: String,
    /// Slash-separated path of the executable relative to the install root.
    pub bin: String,
    /// Ordered file moves from the extracted tree into the install root.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileOperation>,
}

/// A single `{from, to}` relocation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOperation {
    /// Glob relative to the extracted archive root.
    pub from: String,
    /// Destination directory relative to the install root.
    pub to: String,
}

impl FileOperation {
    /// Creates a relocation rule.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Kubernetes-style label selector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    /// Labels that must be present with exactly these values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
    /// Set-based requirements that must all hold.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<SelectorRequirement>,
}

impl LabelSelector {
    /// Builds a selector requiring `os` and `arch` to equal the given values.
    #[must_use]
    pub fn os_arch(os: &str, arch: &str) -> Self {
        let mut match_labels = BTreeMap::new();
        match_labels.insert(String::from("os"), os.to_owned());
        match_labels.insert(String::from("arch"), arch.to_owned());
        Self {
            match_labels,
            match_expressions: Vec::new(),
        }
    }

    /// Returns `true` when every label and expression holds for `labels`.
    ///
    /// An empty selector matches everything.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
            && self
                .match_expressions
                .iter()
                .all(|requirement| requirement.matches(labels))
    }
}

/// One set-based selector requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorRequirement {
    /// Label key.
    pub key: String,
    /// Relation between the label and `values`.
    pub operator: SelectorOperator,
    /// Candidate values for `In` and `NotIn`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl SelectorRequirement {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            SelectorOperator::In => value.is_some_and(|found| self.values.contains(found)),
            SelectorOperator::NotIn => value.is_none_or(|found| !self.values.contains(found)),
            SelectorOperator::Exists => value.is_some(),
            SelectorOperator::DoesNotExist => value.is_none(),
        }
    }
}

/// Operators supported by [`SelectorRequirement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectorOperator {
    /// Label value is one of `values`.
    In,
    /// Label is absent or its value is not one of `values`.
    NotIn,
    /// Label is present.
    Exists,
    /// Label is absent.
    DoesNotExist,
}

impl Plugin {
    /// Creates a manifest with the default API version and kind.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            api_version: String::from(MANIFEST_API_VERSION),
            kind: String::from(MANIFEST_KIND),
            metadata: ObjectMeta { name: name.into() },
            spec: PluginSpec {
                version: version.into(),
                homepage: String::new(),
                short_description: String::new(),
                description: String::new(),
                caveats: String::new(),
                platforms: Vec::new(),
            },
        }
    }

    /// Appends a platform entry.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.spec.platforms.push(platform);
        self
    }

    /// Sets the one-line summary.
    #[must_use]
    pub fn with_short_description(mut self, text: impl Into<String>) -> Self {
        self.spec.short_description = text.into();
        self
    }

    /// Plugin name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.metadata.name.as_str()
    }

    /// Raw version string.
    #[must_use]
    pub const fn version(&self) -> &str {
        self.spec.version.as_str()
    }

    /// Decodes a manifest from YAML.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Manifest`] when the text is not a valid
    /// manifest document. The result is not validated.
    pub fn from_yaml(text: &str) -> Result<Self, InstallError> {
        serde_saphyr::from_str(text).map_err(|error| InstallError::Manifest {
            message: error.to_string(),
        })
    }

    /// Encodes the manifest as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Manifest`] when serialisation fails.
    pub fn to_yaml(&self) -> Result<String, InstallError> {
        serde_saphyr::to_string(self).map_err(|error| InstallError::Manifest {
            message: error.to_string(),
        })
    }

    /// Validates the manifest, returning an error if it is malformed.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::InvalidName`] for unsafe names and
    /// [`InstallError::Manifest`] for every other defect.
    pub fn validate(&self) -> Result<(), InstallError> {
        validate_plugin_name(self.name())?;
        PluginVersion::parse(self.version())?;
        if self.spec.platforms.is_empty() {
            return Err(manifest_error(format!(
                "plugin '{}' declares no platforms",
                self.name()
            )));
        }
        for (index, platform) in self.spec.platforms.iter().enumerate() {
            platform
                .validate()
                .map_err(|reason| manifest_error(format!("platforms[{index}]: {reason}")))?;
        }
        Ok(())
    }
}

impl Platform {
    /// Creates a platform entry without file operations.
    #[must_use]
    pub fn new(
        selector: LabelSelector,
        uri: impl Into<String>,
        sha256: impl Into<String>,
        bin: impl Into<String>,
    ) -> Self {
        Self {
            selector: Some(selector),
            uri: uri.into(),
            sha256: sha256.into(),
            bin: bin.into(),
            files: Vec::new(),
        }
    }

    /// Replaces the file operations.
    #[must_use]
    pub fn with_files(mut self, files: Vec<FileOperation>) -> Self {
        self.files = files;
        self
    }

    fn validate(&self) -> Result<(), String> {
        if self.selector.is_none() {
            return Err(String::from("selector is required"));
        }
        if self.uri.trim().is_empty() {
            return Err(String::from("uri must not be empty"));
        }
        if self.sha256.len() != SHA256_HEX_LEN
            || !self.sha256.chars().all(|ch| ch.is_ascii_hexdigit())
        {
            return Err(format!(
                "sha256 must be {SHA256_HEX_LEN} hex characters, got '{}'",
                self.sha256
            ));
        }
        if self.bin.trim().is_empty() {
            return Err(String::from("bin must not be empty"));
        }
        for (index, operation) in self.files.iter().enumerate() {
            if operation.from.is_empty() || operation.to.is_empty() {
                return Err(format!("files[{index}] needs both 'from' and 'to'"));
            }
        }
        Ok(())
    }
}

/// Rejects names that cannot safely be used as a single path component.
///
/// Valid names are non-empty, at most 128 characters, and made of lowercase
/// ASCII letters, digits and `-`.
///
/// # Errors
///
/// Returns [`InstallError::InvalidName`] describing the first violation.
pub fn validate_plugin_name(name: &str) -> Result<(), InstallError> {
    let invalid = |reason| InstallError::InvalidName {
        name: name.to_owned(),
        reason,
    };
    if name.is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid("name is too long"));
    }
    if name.contains(['/', '\\']) {
        return Err(invalid("name must not contain path separators"));
    }
    if name.contains("..") {
        return Err(invalid("name must not contain '..'"));
    }
    if !name
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
    {
        return Err(invalid(
            "name may only contain lowercase letters, digits and '-'",
        ));
    }
    Ok(())
}

fn manifest_error(message: String) -> InstallError {
    InstallError::Manifest { message }
}
