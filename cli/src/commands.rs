//! Subcommand implementations.

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use resumebot_chat::{ChatHandler, ChatRequest};
use resumebot_retrieval::{Retriever, VectorIndex, split_markdown};
use tracing::{error, info, warn};

use crate::args::{AskArgs, BuildArgs, ChatArgs, CommonArgs, ServeArgs};
use crate::server;

/// Chunk and embed the knowledge file, then write the index.
pub async fn build(common: &CommonArgs, args: &BuildArgs) -> Result<()> {
    let config = common.retrieval_config();
    let source = config
        .knowledge_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| config.knowledge_path.display().to_string());
    let config = config
        .with_chunker(args.chunker_config(source))
        .with_batch_size(args.batch_size);

    let document = tokio::fs::read_to_string(&config.knowledge_path)
        .await
        .with_context(|| {
            format!(
                "failed to read knowledge file {}",
                config.knowledge_path.display()
            )
        })?;

    let chunks = split_markdown(&document, &config.chunker)?;
    info!(
        "Split {} into {} chunks",
        config.knowledge_path.display(),
        chunks.len()
    );

    let provider = common.embedding_provider(None)?;
    let index = VectorIndex::build(chunks, provider.as_ref(), config.batch_size).await?;
    index.save(&config.index_path).await?;

    println!(
        "Indexed {} passages (dimension {}) into {}",
        index.len(),
        index.dimension(),
        config.index_path.display()
    );
    Ok(())
}

/// Answer one question and print the reply with its sources.
pub async fn ask(common: &CommonArgs, args: &AskArgs) -> Result<()> {
    let handler = chat_handler(common, &args.chat, None).await?;

    if args.context_only {
        let context = handler.context(&args.question).await?;
        if context.is_empty() {
            println!("(no passages retrieved)");
        } else {
            println!("{}", context.block);
        }
        return Ok(());
    }

    let response = handler.answer(ChatRequest::new(args.question.as_str())).await?;
    println!("{}", response.reply);
    if !response.sources.is_empty() {
        println!("\nSources:");
        for citation in &response.sources {
            println!(
                "  [{}] {} ({}, score {:.3})",
                citation.tag, citation.section_title, citation.source, citation.score
            );
        }
    }
    Ok(())
}

/// Load the index once and serve the chat API until Ctrl-C.
pub async fn serve(common: &CommonArgs, args: &ServeArgs) -> Result<()> {
    let cache_size = NonZeroUsize::new(args.embedding_cache_size);
    let handler = chat_handler(common, &args.chat, cache_size).await?;
    let app = server::router(Arc::new(handler));

    let addr: SocketAddr = args
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", args.bind))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("resumebot listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server shutdown")?;
    Ok(())
}

async fn chat_handler(
    common: &CommonArgs,
    chat: &ChatArgs,
    cache_size: Option<NonZeroUsize>,
) -> Result<ChatHandler> {
    let config = common.retrieval_config();
    let index = load_index(&config.index_path).await?;

    let embedder = common.embedding_provider(cache_size)?;
    if let Some(model) = index.model().filter(|model| *model != embedder.model()) {
        warn!(
            "Index was built with {model} but queries use {}; scores will be meaningless",
            embedder.model()
        );
    }

    let retriever = Retriever::new(Arc::new(index), embedder);
    let generator = chat.chat_provider(&common.ollama_base_url)?;
    Ok(ChatHandler::new(retriever, Arc::new(generator), chat.persona()).with_top_k(chat.top_k))
}

async fn load_index(path: &Path) -> Result<VectorIndex> {
    let index = VectorIndex::load(path).await?;
    if index.is_empty() {
        warn!("Index at {} has no passages", path.display());
    }
    Ok(index)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {err}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
