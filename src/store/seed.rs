/// Built-in document set for bootstrapping an empty catalog.
///
/// 5 categories x 10 topics = 50 documents. Ids, text and embeddings are all
/// derived from the topic list, so every seeded catalog is identical.

use std::hash::Hasher;

use twox_hash::XxHash64;

use crate::errors::SignalError;
use crate::store::{Category, DocumentCatalog, DocumentRecord, Embedding, EMBEDDING_DIM};

const TOPICS: [(Category, [&str; 10]); 5] = [
    (
        Category::MachineLearning,
        [
            "neural networks", "deep learning", "supervised learning",
            "unsupervised learning", "reinforcement learning", "gradient descent",
            "backpropagation", "convolutional networks", "transformers", "model training",
        ],
    ),
    (
        Category::DataScience,
        [
            "data analysis", "statistical modeling", "data visualization",
            "pandas", "numpy", "exploratory analysis", "hypothesis testing",
            "regression analysis", "time series", "feature engineering",
        ],
    ),
    (
        Category::WebDevelopment,
        [
            "javascript frameworks", "react", "vue", "angular", "REST APIs",
            "GraphQL", "web security", "responsive design", "progressive web apps",
            "server-side rendering",
        ],
    ),
    (
        Category::CloudComputing,
        [
            "AWS services", "Azure cloud", "Google Cloud Platform", "kubernetes",
            "docker containers", "serverless architecture", "cloud storage",
            "load balancing", "auto scaling", "cloud security",
        ],
    ),
    (
        Category::Cybersecurity,
        [
            "network security", "encryption", "authentication", "authorization",
            "penetration testing", "vulnerability assessment", "security protocols",
            "firewalls", "intrusion detection", "security compliance",
        ],
    ),
];

/// Generate the seed documents in catalog order.
pub fn seed_documents() -> Vec<DocumentRecord> {
    let mut documents = Vec::with_capacity(50);
    let mut counter = 1;

    for (category, topics) in TOPICS {
        let name = category.as_str();
        let prefix = name[..3].to_uppercase();
        let readable = name.replace('_', " ");

        for (i, topic) in topics.iter().enumerate() {
            let full_text = format!(
                "This document covers {topic} in the context of {readable}. \
                 It provides comprehensive information about {topic} concepts, \
                 best practices, and real-world applications. \
                 Key aspects include implementation details, common patterns, and expert insights."
            );
            documents.push(DocumentRecord {
                doc_id: format!("{}{:03}", prefix, counter),
                title: title_case(topic),
                full_text,
                category,
                embedding: seed_embedding(&format!("{}_{}_{}", name, topic, i)),
            });
            counter += 1;
        }
    }

    documents
}

/// Insert the seed documents. Without `reset`, a non-empty catalog is left alone.
///
/// Returns the number of documents inserted.
pub async fn seed_catalog(
    catalog: &dyn DocumentCatalog,
    reset: bool,
) -> Result<usize, SignalError> {
    if reset {
        catalog.clear().await?;
    } else if catalog.count().await? > 0 {
        tracing::debug!("Catalog already populated, skipping seed");
        return Ok(0);
    }

    let documents = seed_documents();
    for doc in &documents {
        catalog.insert(doc).await?;
    }
    tracing::info!(count = documents.len(), reset, "Seeded document catalog");
    Ok(documents.len())
}

/// Eight bytes of a 64-bit hash, each mapped from [0, 255] to [-1, 1].
fn seed_embedding(seed: &str) -> Embedding {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(seed.as_bytes());
    let h = hasher.finish();
    let mut embedding = [0.0; EMBEDDING_DIM];
    for (i, slot) in embedding.iter_mut().enumerate() {
        let byte = (h >> (i * 8)) & 0xFF;
        *slot = byte as f64 / 255.0 * 2.0 - 1.0;
    }
    embedding
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
