use std::fs;
use std::path::{Path, PathBuf};

use chromadb::client::{ChromaAuthMethod, ChromaClient, ChromaClientOptions};
use chromadb::collection::{CollectionEntries, QueryOptions};
use clap::Args;
use serde_json::{json, Map};

use crate::chunk::chunk_text;
use crate::llm::embeddings::WatsonxEmbeddings;

#[derive(Debug, Args, Clone)]
pub struct IndexArgs {
    /// File or directory of .txt/.md documents.
    path: PathBuf,
    /// Target collection name.
    #[arg(long, default_value = "documents")]
    collection: String,
    /// Chunk budget in whitespace tokens.
    #[arg(long, default_value_t = 512)]
    chunk_tokens: usize,
    /// Chroma server URL.
    #[arg(long, default_value = "http://localhost:8000")]
    db_url: String,
    /// Embedding model id.
    #[arg(long, default_value = "ibm/slate-125m-english-rtrvr")]
    embedding_model: String,
    /// Query to run against the collection after indexing.
    #[arg(long)]
    query: Option<String>,
    /// Number of documents to retrieve for the query.
    #[arg(long, default_value_t = 3)]
    limit: usize,
    /// Report what would be indexed without touching the network.
    #[arg(long)]
    dry_run: bool,
}

pub async fn run(args: IndexArgs) -> Result<(), String> {
    let files = collect_files(&args.path)?;
    if files.is_empty() {
        return Err(format!(
            "No .txt or .md files found under '{}'.",
            args.path.display()
        ));
    }

    let mut ids = Vec::new();
    let mut documents = Vec::new();
    let mut metadatas = Vec::new();
    for file in &files {
        let raw = fs::read_to_string(file)
            .map_err(|err| format!("Failed to read '{}': {err}", file.display()))?;
        let name = file
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("document")
            .to_string();
        for chunk in chunk_text(&raw, args.chunk_tokens) {
            ids.push(format!("{name}:{}", chunk.index));
            let mut metadata = Map::new();
            metadata.insert("source".to_string(), json!(name));
            metadata.insert("chunk".to_string(), json!(chunk.index));
            metadatas.push(metadata);
            documents.push(chunk.text);
        }
    }

    if args.dry_run {
        let body = json!({
            "dry_run": true,
            "collection": args.collection,
            "files": files.len(),
            "chunks": documents.len(),
            "chunk_tokens": args.chunk_tokens,
        });
        let rendered = serde_json::to_string(&body)
            .map_err(|err| format!("Failed to render output JSON: {err}"))?;
        println!("{rendered}");
        return Ok(());
    }

    let embedder = WatsonxEmbeddings::new(&args.embedding_model).map_err(|err| err.to_string())?;
    let embeddings = embedder
        .embed_texts(&documents)
        .await
        .map_err(|err| err.to_string())?;

    let client = ChromaClient::new(ChromaClientOptions {
        url: Some(args.db_url.clone()),
        database: "default_database".to_string(),
        auth: ChromaAuthMethod::None,
    })
    .await
    .map_err(|err| format!("Failed to connect to Chroma at '{}': {err}", args.db_url))?;
    let collection = client
        .get_or_create_collection(&args.collection, None)
        .await
        .map_err(|err| format!("Failed to open collection '{}': {err}", args.collection))?;

    let entries = CollectionEntries {
        ids: ids.iter().map(String::as_str).collect(),
        embeddings: Some(embeddings),
        metadatas: Some(metadatas),
        documents: Some(documents.iter().map(String::as_str).collect()),
    };
    collection
        .upsert(entries, None)
        .await
        .map_err(|err| format!("Failed to upsert into '{}': {err}", args.collection))?;
    println!(
        "indexed {} chunks from {} files into '{}'",
        documents.len(),
        files.len(),
        args.collection
    );

    if let Some(query) = &args.query {
        let query_embedding = embedder
            .embed_query(query.clone())
            .await
            .map_err(|err| err.to_string())?;
        let result = collection
            .query(
                QueryOptions {
                    query_texts: None,
                    query_embeddings: Some(vec![query_embedding]),
                    where_metadata: None,
                    where_document: None,
                    n_results: Some(args.limit),
                    include: Some(vec!["documents"]),
                },
                None,
            )
            .await
            .map_err(|err| format!("Query against '{}' failed: {err}", args.collection))?;

        for group in result.documents.into_iter().flatten() {
            for document in group {
                println!("{document}");
            }
        }
    }
    Ok(())
}

fn collect_files(path: &Path) -> Result<Vec<PathBuf>, String> {
    let metadata = fs::metadata(path)
        .map_err(|err| format!("Failed to read '{}': {err}", path.display()))?;
    if metadata.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    let entries = fs::read_dir(path)
        .map_err(|err| format!("Failed to read directory '{}': {err}", path.display()))?;
    for entry in entries {
        let entry =
            entry.map_err(|err| format!("Failed to read directory '{}': {err}", path.display()))?;
        let entry_path = entry.path();
        if !entry_path.is_file() {
            continue;
        }
        match entry_path.extension().and_then(|ext| ext.to_str()) {
            Some("txt") | Some("md") => files.push(entry_path),
            _ => eprintln!("skipping '{}': unsupported extension", entry_path.display()),
        }
    }
    files.sort();
    Ok(files)
}
