//! Command-line arguments.
//!
//! Every flag that has a deployment-level meaning also reads an environment
//! variable, so a `.env` file next to the binary is enough to configure it.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use resumebot_chat::{OllamaChatProvider, PersonaConfig};
use resumebot_embeddings::{
    CachedProvider, EmbeddingProvider, OllamaEndpoint, OllamaProvider, OpenAIProvider, RetryPolicy,
};
use resumebot_retrieval::{ChunkerConfig, OverlapMode, RetrievalConfig};

#[derive(Debug, Parser)]
#[command(
    name = "resumebot",
    version,
    about = "Answer questions about one person from their Markdown knowledge file"
)]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Chunk and embed the knowledge file, then write the index.
    Build(BuildArgs),

    /// Answer one question from the command line.
    Ask(AskArgs),

    /// Serve the HTTP chat API.
    Serve(ServeArgs),
}

/// Which embedding backend to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbedBackend {
    Ollama,
    Openai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OllamaRoute {
    /// `/api/embed`, one request per batch.
    Batch,
    /// `/api/embeddings`, one request per text.
    Legacy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Overlap {
    /// Windows are laid end to end.
    Literal,
    /// Each window starts `overlap` characters before the previous end.
    BackStep,
}

impl From<Overlap> for OverlapMode {
    fn from(value: Overlap) -> Self {
        match value {
            Overlap::Literal => OverlapMode::Literal,
            Overlap::BackStep => OverlapMode::BackStep,
        }
    }
}

impl From<OllamaRoute> for OllamaEndpoint {
    fn from(value: OllamaRoute) -> Self {
        match value {
            OllamaRoute::Batch => OllamaEndpoint::Batch,
            OllamaRoute::Legacy => OllamaEndpoint::Legacy,
        }
    }
}

/// Paths and embedding settings shared by every subcommand.
#[derive(Debug, Args)]
pub struct CommonArgs {
    /// Directory holding `knowledge.md` and `index.json`.
    #[arg(long, global = true, env = "RESUMEBOT_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Knowledge file, overriding `<data-dir>/knowledge.md`.
    #[arg(long, global = true, env = "KNOWLEDGE_PATH")]
    pub knowledge: Option<PathBuf>,

    /// Index artifact, overriding `<data-dir>/index.json`.
    #[arg(long, global = true, env = "INDEX_PATH")]
    pub index: Option<PathBuf>,

    /// Embedding backend.
    #[arg(long, global = true, env = "EMBED_PROVIDER", value_enum, default_value_t = EmbedBackend::Ollama)]
    pub embed_provider: EmbedBackend,

    /// Embedding model; defaults to the backend's default model.
    #[arg(long, global = true, env = "EMBED_MODEL")]
    pub embed_model: Option<String>,

    /// Ollama server address.
    #[arg(long, global = true, env = "OLLAMA_BASE_URL", default_value = OllamaProvider::DEFAULT_BASE_URL)]
    pub ollama_base_url: String,

    /// Ollama embedding route.
    #[arg(long, global = true, env = "OLLAMA_EMBED_ROUTE", value_enum, default_value_t = OllamaRoute::Batch)]
    pub ollama_route: OllamaRoute,

    /// API key for the OpenAI backend.
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Base URL for OpenAI-compatible endpoints.
    #[arg(long, global = true, env = "OPENAI_BASE_URL")]
    pub openai_base_url: Option<String>,

    /// Seconds before an embedding request times out.
    #[arg(long, global = true, env = "EMBED_TIMEOUT_SECS", default_value_t = resumebot_embeddings::DEFAULT_TIMEOUT_SECS)]
    pub embed_timeout_secs: u64,

    /// Retries for transient embedding failures.
    #[arg(long, global = true, env = "EMBED_MAX_RETRIES", default_value_t = 2)]
    pub embed_max_retries: u32,
}

impl CommonArgs {
    /// Resolve knowledge and index paths.
    pub fn retrieval_config(&self) -> RetrievalConfig {
        let mut config = RetrievalConfig::new(&self.data_dir);
        if let Some(path) = &self.knowledge {
            config = config.with_knowledge_path(path);
        }
        if let Some(path) = &self.index {
            config = config.with_index_path(path);
        }
        config
    }

    /// Construct the configured embedding provider, optionally behind an LRU cache.
    pub fn embedding_provider(
        &self,
        cache_size: Option<NonZeroUsize>,
    ) -> Result<Arc<dyn EmbeddingProvider>> {
        let timeout = Duration::from_secs(self.embed_timeout_secs.max(1));
        let retry = RetryPolicy::default().with_max_retries(self.embed_max_retries);

        match self.embed_provider {
            EmbedBackend::Ollama => {
                let mut provider = OllamaProvider::with_timeout(&self.ollama_base_url, timeout)?
                    .with_endpoint(self.ollama_route.into())
                    .with_retry(retry);
                if let Some(model) = &self.embed_model {
                    provider = provider.with_model(model);
                }
                Ok(with_cache(provider, cache_size))
            }
            EmbedBackend::Openai => {
                let mut provider = OpenAIProvider::with_timeout(timeout)?.with_retry(retry);
                if let Some(key) = &self.openai_api_key {
                    provider = provider.with_api_key(key);
                }
                if let Some(url) = &self.openai_base_url {
                    provider = provider.with_base_url(url);
                }
                if let Some(model) = &self.embed_model {
                    provider = provider.with_model(model);
                }
                Ok(with_cache(provider, cache_size))
            }
        }
    }
}

fn with_cache<P>(provider: P, cache_size: Option<NonZeroUsize>) -> Arc<dyn EmbeddingProvider>
where
    P: EmbeddingProvider + 'static,
{
    match cache_size {
        Some(capacity) => Arc::new(CachedProvider::new(provider, capacity)),
        None => Arc::new(provider),
    }
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Target window size in characters.
    #[arg(long, default_value_t = ChunkerConfig::DEFAULT_TARGET_SIZE)]
    pub chunk_size: usize,

    /// Overlap between windows in characters.
    #[arg(long, default_value_t = ChunkerConfig::DEFAULT_OVERLAP)]
    pub overlap: usize,

    /// How `--overlap` is applied.
    #[arg(long, value_enum, default_value_t = Overlap::Literal)]
    pub overlap_mode: Overlap,

    /// Passages per embedding request.
    #[arg(long, default_value_t = RetrievalConfig::DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
}

impl BuildArgs {
    pub fn chunker_config(&self, source: impl Into<String>) -> ChunkerConfig {
        ChunkerConfig::new(self.chunk_size, self.overlap)
            .with_overlap_mode(self.overlap_mode.into())
            .with_source(source)
    }
}

/// Persona and generator settings for commands that answer questions.
#[derive(Debug, Args)]
pub struct ChatArgs {
    /// Person the knowledge file describes.
    #[arg(long, env = "BOT_OWNER_NAME", default_value = PersonaConfig::DEFAULT_OWNER_NAME)]
    pub owner_name: String,

    /// Tone of the assistant.
    #[arg(long, env = "BOT_TONE", default_value = PersonaConfig::DEFAULT_TONE)]
    pub tone: String,

    /// Generation model served by Ollama.
    #[arg(long, env = "GEN_MODEL", default_value = OllamaChatProvider::DEFAULT_MODEL)]
    pub gen_model: String,

    /// Sampling temperature.
    #[arg(long, env = "GEN_TEMPERATURE", default_value_t = OllamaChatProvider::DEFAULT_TEMPERATURE)]
    pub temperature: f32,

    /// Seconds before a generation request times out.
    #[arg(long, env = "GEN_TIMEOUT_SECS", default_value_t = resumebot_chat::DEFAULT_TIMEOUT_SECS)]
    pub gen_timeout_secs: u64,

    /// Passages retrieved per question.
    #[arg(long, default_value_t = RetrievalConfig::DEFAULT_TOP_K)]
    pub top_k: usize,
}

impl ChatArgs {
    pub fn persona(&self) -> PersonaConfig {
        PersonaConfig::default()
            .with_owner_name(&self.owner_name)
            .with_tone(&self.tone)
    }

    pub fn chat_provider(&self, base_url: &str) -> Result<OllamaChatProvider> {
        let timeout = Duration::from_secs(self.gen_timeout_secs.max(1));
        Ok(OllamaChatProvider::with_timeout(base_url, timeout)?
            .with_model(&self.gen_model)
            .with_temperature(self.temperature))
    }
}

#[derive(Debug, Args)]
pub struct AskArgs {
    /// The question to answer.
    pub question: String,

    /// Print the retrieved context instead of calling the generator.
    #[arg(long)]
    pub context_only: bool,

    #[command(flatten)]
    pub chat: ChatArgs,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to bind the HTTP server to (host:port).
    #[arg(long, env = "RESUMEBOT_BIND", default_value = "127.0.0.1:8000")]
    pub bind: String,

    /// Query embeddings kept in memory (0 disables caching).
    #[arg(long, default_value_t = 1024)]
    pub embedding_cache_size: usize,

    #[command(flatten)]
    pub chat: ChatArgs,
}
