//! Configuration system for mmindex.
//!
//! An [`IndexConfig`] is supplied once when an ingestor is built and is
//! never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{IndexError, IndexResult};
use crate::traits::{DataType, DistanceMetric};

/// Image resizing applied by the default preprocessing chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageResizeConfig {
    /// Register the resizer when building an ingestor.
    pub enabled: bool,
    /// Maximum output width in pixels.
    pub max_width: u32,
    /// Maximum output height in pixels.
    pub max_height: u32,
}

impl Default for ImageResizeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_width: 256,
            max_height: 256,
        }
    }
}

/// Tag-count and value-size caps applied to metadata before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataLimits {
    /// Maximum number of metadata entries kept.
    pub max_tags: usize,
    /// Maximum combined byte size of all values.
    pub max_value_bytes: usize,
    /// Caller keys kept first, in this order. Engine keys such as
    /// `pattern` and `__img_ref` are never capped.
    pub priority_tags: Vec<String>,
}

impl Default for MetadataLimits {
    fn default() -> Self {
        Self {
            max_tags: 10,
            max_value_bytes: 2048,
            priority_tags: Vec::new(),
        }
    }
}

fn default_index_name() -> String {
    "mm-index".to_string()
}

fn default_dimension() -> usize {
    384
}

fn default_chunk_size() -> usize {
    100
}

fn default_worker_count() -> usize {
    4
}

fn default_max_metadata_bytes() -> usize {
    100 * 1024
}

fn default_query_pattern() -> String {
    "full_embedding".to_string()
}

fn default_summarize_min_length() -> usize {
    1000
}

/// Main index configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Vector index name.
    #[serde(default = "default_index_name")]
    pub index_name: String,
    /// Vector dimension every embedding must have.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    /// Distance metric of the index.
    #[serde(default)]
    pub distance_metric: DistanceMetric,
    /// Element type of stored vectors.
    #[serde(default)]
    pub data_type: DataType,
    /// Items per batch chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Concurrent workers per batch chunk.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Ceiling for serialized metadata, in bytes.
    #[serde(default = "default_max_metadata_bytes")]
    pub max_metadata_bytes: usize,
    /// Pattern used to embed queries in `search`.
    #[serde(default = "default_query_pattern")]
    pub query_pattern: String,
    /// Minimum text length accepted by the summarize pattern.
    #[serde(default = "default_summarize_min_length")]
    pub summarize_min_length: usize,
    /// Default image resizing.
    #[serde(default)]
    pub image_resize: ImageResizeConfig,
    /// Optional metadata caps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_limits: Option<MetadataLimits>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_name: default_index_name(),
            dimension: default_dimension(),
            distance_metric: DistanceMetric::default(),
            data_type: DataType::default(),
            chunk_size: default_chunk_size(),
            worker_count: default_worker_count(),
            max_metadata_bytes: default_max_metadata_bytes(),
            query_pattern: default_query_pattern(),
            summarize_min_length: default_summarize_min_length(),
            image_resize: ImageResizeConfig::default(),
            metadata_limits: None,
        }
    }
}

impl IndexConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<Path>) -> IndexResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        let config: Self = match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| IndexError::Configuration(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| IndexError::Configuration(e.to_string()))?,
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| IndexError::Configuration(e.to_string()))?,
            _ => {
                return Err(IndexError::Configuration(
                    "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
                ))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `MMINDEX_*` environment variables.
    pub fn from_env() -> IndexResult<Self> {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("MMINDEX_INDEX_NAME") {
            config.index_name = name;
        }
        if let Some(dimension) = env_parse("MMINDEX_DIMENSION")? {
            config.dimension = dimension;
        }
        if let Ok(metric) = std::env::var("MMINDEX_DISTANCE_METRIC") {
            config.distance_metric = metric.parse().map_err(|_| {
                IndexError::Configuration(format!("Unknown distance metric '{}'", metric))
            })?;
        }
        if let Some(chunk_size) = env_parse("MMINDEX_CHUNK_SIZE")? {
            config.chunk_size = chunk_size;
        }
        if let Some(workers) = env_parse("MMINDEX_WORKER_COUNT")? {
            config.worker_count = workers;
        }
        if let Some(bytes) = env_parse("MMINDEX_MAX_METADATA_BYTES")? {
            config.max_metadata_bytes = bytes;
        }
        if let Ok(pattern) = std::env::var("MMINDEX_QUERY_PATTERN") {
            config.query_pattern = pattern;
        }

        config.validate()?;
        Ok(config)
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> IndexConfigBuilder {
        IndexConfigBuilder::default()
    }

    /// Check the configuration for values no ingestor can run with.
    pub fn validate(&self) -> IndexResult<()> {
        if self.index_name.trim().is_empty() {
            return Err(IndexError::Configuration("index_name must not be empty".to_string()));
        }
        if self.dimension == 0 {
            return Err(IndexError::Configuration("dimension must be greater than 0".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(IndexError::Configuration("chunk_size must be greater than 0".to_string()));
        }
        if self.worker_count == 0 {
            return Err(IndexError::Configuration(
                "worker_count must be greater than 0".to_string(),
            ));
        }
        if self.max_metadata_bytes == 0 {
            return Err(IndexError::Configuration(
                "max_metadata_bytes must be greater than 0".to_string(),
            ));
        }
        if self.image_resize.enabled
            && (self.image_resize.max_width == 0 || self.image_resize.max_height == 0)
        {
            return Err(IndexError::Configuration(
                "image_resize bounds must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_parse(name: &str) -> IndexResult<Option<usize>> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|_| {
            IndexError::Configuration(format!("{} must be a positive integer, got '{}'", name, raw))
        }),
        Err(_) => Ok(None),
    }
}

/// Builder for IndexConfig.
#[derive(Default)]
pub struct IndexConfigBuilder {
    config: IndexConfig,
}

impl IndexConfigBuilder {
    /// Set the index name.
    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.config.index_name = name.into();
        self
    }

    /// Set the vector dimension.
    pub fn dimension(mut self, dimension: usize) -> Self {
        self.config.dimension = dimension;
        self
    }

    /// Set the distance metric.
    pub fn distance_metric(mut self, metric: DistanceMetric) -> Self {
        self.config.distance_metric = metric;
        self
    }

    /// Set the batch chunk size.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = chunk_size;
        self
    }

    /// Set the batch worker count.
    pub fn worker_count(mut self, workers: usize) -> Self {
        self.config.worker_count = workers;
        self
    }

    /// Set the metadata size ceiling.
    pub fn max_metadata_bytes(mut self, bytes: usize) -> Self {
        self.config.max_metadata_bytes = bytes;
        self
    }

    /// Set the pattern used to embed queries.
    pub fn query_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.query_pattern = pattern.into();
        self
    }

    /// Set the minimum text length for summarization.
    pub fn summarize_min_length(mut self, length: usize) -> Self {
        self.config.summarize_min_length = length;
        self
    }

    /// Set image resizing.
    pub fn image_resize(mut self, resize: ImageResizeConfig) -> Self {
        self.config.image_resize = resize;
        self
    }

    /// Disable the default image resizer.
    pub fn without_image_resize(mut self) -> Self {
        self.config.image_resize.enabled = false;
        self
    }

    /// Enable metadata caps.
    pub fn metadata_limits(mut self, limits: MetadataLimits) -> Self {
        self.config.metadata_limits = Some(limits);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> IndexResult<IndexConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IndexConfig::default();
        assert_eq!(config.chunk_size, 100);
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.max_metadata_bytes, 102_400);
        assert_eq!(config.query_pattern, "full_embedding");
        assert_eq!(config.image_resize.max_width, 256);
        assert!(config.metadata_limits.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_env_parses_trimmed_numbers() {
        std::env::set_var("MMINDEX_DIMENSION", " 32 ");
        let config = IndexConfig::from_env().unwrap();
        assert_eq!(config.dimension, 32);

        std::env::set_var("MMINDEX_DIMENSION", "wide");
        let err = IndexConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("MMINDEX_DIMENSION"));
        std::env::remove_var("MMINDEX_DIMENSION");
    }

    #[test]
    fn test_builder_rejects_zero_workers() {
        let err = IndexConfig::builder().worker_count(0).build().unwrap_err();
        assert!(matches!(err, IndexError::Configuration(_)));
    }

    #[test]
    fn test_from_toml_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.toml");
        std::fs::write(
            &path,
            r#"
index_name = "vehicles"
dimension = 8
distance_metric = "euclidean"

[image_resize]
max_width = 128
"#,
        )
        .unwrap();

        let config = IndexConfig::from_file(&path).unwrap();
        assert_eq!(config.index_name, "vehicles");
        assert_eq!(config.dimension, 8);
        assert_eq!(config.distance_metric, DistanceMetric::Euclidean);
        assert_eq!(config.image_resize.max_width, 128);
        assert_eq!(config.image_resize.max_height, 256);
        assert_eq!(config.chunk_size, 100);
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.yaml");
        std::fs::write(&path, "dimension: 16\nmetadata_limits:\n  max_tags: 5\n").unwrap();

        let config = IndexConfig::from_file(&path).unwrap();
        assert_eq!(config.dimension, 16);
        let limits = config.metadata_limits.unwrap();
        assert_eq!(limits.max_tags, 5);
        assert_eq!(limits.max_value_bytes, 2048);
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.ini");
        std::fs::write(&path, "dimension=4").unwrap();
        assert!(matches!(
            IndexConfig::from_file(&path),
            Err(IndexError::Configuration(_))
        ));
    }
}
