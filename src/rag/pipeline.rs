//! Retrieve, stuff, generate

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use tracing::info;

use super::ContextAssembler;
use super::DocumentRetriever;
use super::ProgramRetriever;
use super::RagSource;
use super::SearchService;
use crate::errors::CarmsError;
use crate::errors::Result;
use crate::llm::prompts;
use crate::llm::LanguageModel;

pub const DEFAULT_RAG_TOP_K: usize = 8;
pub const MAX_RAG_TOP_K: usize = 30;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagResponse {
    pub question: String,
    pub answer: String,
    pub sources: Vec<RagSource>,
}

pub struct RagService {
    search: Arc<SearchService>,
    llm: Arc<dyn LanguageModel>,
    context_assembler: ContextAssembler,
}

impl RagService {
    pub fn new(search: Arc<SearchService>, llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            search,
            llm,
            context_assembler: ContextAssembler::default(),
        }
    }

    #[must_use]
    pub fn with_context_assembler(mut self, assembler: ContextAssembler) -> Self {
        self.context_assembler = assembler;
        self
    }

    /// Answer `question` from the `top_k` most similar chunks
    ///
    /// # Errors
    /// - `InvalidInput` when the question or `top_k` is out of range
    /// - Embedding, database and model failures propagate unchanged
    pub async fn ask(&self, question: &str, top_k: usize) -> Result<RagResponse> {
        super::retriever::validate_search(question, top_k, MAX_RAG_TOP_K)?;
        let retriever = ProgramRetriever::new(Arc::clone(&self.search), top_k);
        self.ask_with(&retriever, question).await
    }

    /// Same flow against any retriever
    pub async fn ask_with(
        &self,
        retriever: &dyn DocumentRetriever,
        question: &str,
    ) -> Result<RagResponse> {
        info!("RAG question: {}", question);

        let documents = retriever.fetch(question).await?;
        debug!("Retrieved {} documents", documents.len());

        let (context, sources) = self.context_assembler.assemble(&documents);
        let prompt = prompts::rag_answer().render(&[
            ("context", context.as_str()),
            ("question", question),
        ])?;

        let answer = self.llm.complete(&prompt).await.map_err(|e| match e {
            CarmsError::LlmError(_) | CarmsError::HttpError(_) => e,
            other => CarmsError::LlmError(other.to_string()),
        })?;

        Ok(RagResponse {
            question: question.to_string(),
            answer: answer.trim().to_string(),
            sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::llm::ChatRequest;
    use crate::llm::ChatResponse;
    use crate::llm::ContentBlock;
    use crate::llm::StopReason;
    use crate::rag::RetrievedDocument;
    use crate::rag::SourceMetadata;

    struct FixedRetriever(Vec<RetrievedDocument>);

    #[async_trait]
    impl DocumentRetriever for FixedRetriever {
        async fn fetch(&self, _query: &str) -> Result<Vec<RetrievedDocument>> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct RecordingModel {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
            let prompt = request.messages[0]
                .content
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.clone()),
                    _ => None,
                })
                .collect::<String>();
            self.prompts.lock().unwrap().push(prompt);
            Ok(ChatResponse {
                content: vec![ContentBlock::text("  Prince George offers rural training.  ")],
                stop_reason: Some(StopReason::EndTurn),
            })
        }
    }

    fn service(model: Arc<RecordingModel>) -> RagService {
        let db = crate::database::Database::connect_lazy(&crate::config::AppConfig::default())
            .unwrap();
        let embedder = Arc::new(crate::embeddings::hash_embedder::HashEmbedder::new(64));
        RagService::new(Arc::new(SearchService::new(db, embedder)), model)
    }

    fn doc(id: i64, text: &str) -> RetrievedDocument {
        RetrievedDocument {
            text: text.to_string(),
            metadata: SourceMetadata {
                program_id: id,
                program_name: format!("Family Medicine - Site {id}"),
                discipline: "Family Medicine".to_string(),
                school: "UBC".to_string(),
                site: "Prince George".to_string(),
                similarity: 0.8,
            },
        }
    }

    #[tokio::test]
    async fn test_ask_with_stuffs_context_and_returns_sources() {
        let model = Arc::new(RecordingModel::default());
        let rag = service(Arc::clone(&model));
        let retriever = FixedRetriever(vec![doc(1, "Rural rotations."), doc(2, "Northern sites.")]);

        let response = rag
            .ask_with(&retriever, "Which programs are rural?")
            .await
            .unwrap();

        assert_eq!(response.question, "Which programs are rural?");
        assert_eq!(response.answer, "Prince George offers rural training.");
        assert_eq!(response.sources.len(), 2);
        assert_eq!(response.sources[1].program_id, 2);

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains("Rural rotations.\n\nNorthern sites."));
        assert!(prompts[0].contains("Question: Which programs are rural?"));
    }

    #[tokio::test]
    async fn test_empty_retrieval_still_answers() {
        let model = Arc::new(RecordingModel::default());
        let rag = service(model);
        let response = rag
            .ask_with(&FixedRetriever(Vec::new()), "Anything about Mars?")
            .await
            .unwrap();
        assert!(response.sources.is_empty());
    }

    #[tokio::test]
    async fn test_ask_validates_bounds() {
        let rag = service(Arc::new(RecordingModel::default()));
        assert!(matches!(
            rag.ask("", DEFAULT_RAG_TOP_K).await,
            Err(CarmsError::InvalidInput(_))
        ));
        assert!(matches!(
            rag.ask("rural", MAX_RAG_TOP_K + 1).await,
            Err(CarmsError::InvalidInput(_))
        ));
    }
}
