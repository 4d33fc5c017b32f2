//! mmindex-demo - index a few sample documents and run a filtered search.
//!
//! Usage: `mmindex-demo [query]`
//!
//! Reads `.env`, `MMINDEX_CONFIG` (optional config file), `MMINDEX_*`
//! index settings, `MMINDEX_EMBEDDER*` provider settings and
//! `MMINDEX_DATA_DIR` (where the SQLite file and objects are kept).

use std::path::PathBuf;

use serde_json::json;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mmindex_core::{ContentBundle, IndexConfig, IngestRequest, Metadata, MetadataFilter, MmIngestor};
use mmindex_providers::{ProviderConfig, ProviderFactory};
use mmindex_stores::{
    ObjectStoreConfig, ObjectStoreProvider, StoreConfig, StoreFactory, VectorStoreConfig,
    VectorStoreProvider,
};

const SAMPLES: &[(&str, &str, &str, &str)] = &[
    ("civic-2019", "Honda", "Civic", "Red 2019 Honda Civic sedan, one owner, 40k miles"),
    ("civic-2021", "Honda", "Civic", "Blue 2021 Honda Civic hatchback with sport trim"),
    ("accord-2020", "Honda", "Accord", "Silver 2020 Honda Accord, leather seats"),
    ("corolla-2018", "Toyota", "Corolla", "White 2018 Toyota Corolla, great fuel economy"),
    ("camry-2022", "Toyota", "Camry", "Black 2022 Toyota Camry hybrid sedan"),
];

fn metadata(make: &str, model: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("make".to_string(), json!(make));
    metadata.insert("model".to_string(), json!(model));
    metadata
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let config = match std::env::var("MMINDEX_CONFIG") {
        Ok(path) => IndexConfig::from_file(path)?,
        Err(_) => IndexConfig::from_env()?,
    };
    let mut providers = ProviderConfig::from_env()?;
    providers.embedder.dimension = config.dimension;

    let data_dir = std::env::var("MMINDEX_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir().join("mmindex-demo"));
    std::fs::create_dir_all(&data_dir)?;

    let (vectors, objects) = StoreFactory::create(&StoreConfig {
        vector_store: VectorStoreConfig {
            provider: VectorStoreProvider::Sqlite,
            path: Some(data_dir.join("vectors.db")),
        },
        object_store: ObjectStoreConfig {
            provider: ObjectStoreProvider::Local,
            root: Some(data_dir.join("objects")),
            bucket: None,
        },
    })?;

    let mut builder = MmIngestor::builder()
        .config(config)
        .vector_store(vectors)
        .object_store(objects)
        .embedder(ProviderFactory::embedder(&providers.embedder)?);
    if let Some(llm) = &providers.llm {
        builder = builder
            .describer(ProviderFactory::describer(llm)?)
            .summarizer(ProviderFactory::summarizer(llm)?);
    }
    let ingestor = builder.build().await?;

    let requests: Vec<IngestRequest> = SAMPLES
        .iter()
        .map(|(id, make, model, text)| {
            IngestRequest::new(ContentBundle::text(*text))
                .with_id(*id)
                .with_metadata(metadata(make, model))
        })
        .collect();

    let result = ingestor.batch_ingest(requests, "text", None).await?;
    info!(
        "Indexed {} of {} sample documents into {}",
        result.succeeded(),
        result.len(),
        data_dir.display()
    );
    for failure in result.errors() {
        tracing::warn!("{}", failure);
    }

    let query = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "red honda civic".to_string());
    let mut filters = MetadataFilter::new();
    filters.insert("make".to_string(), json!("Honda"));

    let hits = ingestor
        .search_with_pattern(ContentBundle::text(query.as_str()), "text", Some(filters), 5)
        .await?;

    println!("Results for '{}' (make = Honda):", query);
    for hit in hits {
        println!(
            "  {:<14} {:>7.4}  {}",
            hit.id,
            hit.score,
            hit.metadata.get("model").and_then(|v| v.as_str()).unwrap_or("-")
        );
    }

    Ok(())
}
