//! Building pipelines and stores from on-disk configuration.

use std::sync::Arc;

use coderag_core::pipeline::{BuildError, StoreFetcher};
use coderag_core::{CodePipeline, DocumentStore, InMemoryStore};
use coderag_config::LlmProviderKind;
use coderag_test_utils::{TestConfigBuilder, TestWorkspace};
use coderag_test_utils::tracing_setup::init_test_tracing;

fn empty_fetcher() -> Arc<StoreFetcher> {
    Arc::new(StoreFetcher::new(Arc::new(InMemoryStore::new(4))))
}

#[tokio::test]
async fn test_from_config_with_defaults() {
    init_test_tracing();
    let ws = TestWorkspace::default_config().await;

    let pipeline = CodePipeline::from_config(&ws.config, empty_fetcher())
        .await
        .unwrap();
    assert_eq!(pipeline.options().code_language, "python");
    assert_eq!(pipeline.options().max_context_tokens, None);
}

#[tokio::test]
async fn test_from_config_applies_pipeline_section() {
    let ws = TestWorkspace::with_toml(
        r#"
[llm]
provider = "anthropic"
model = "claude-sonnet-4-20250514"
critic_model = "claude-haiku-4-20250514"

[pipeline]
max_context_tokens = 3000
include_source_documents = true
code_language = "rust"
history_format = "plain"
"#,
    )
    .await;

    let pipeline = CodePipeline::from_config(&ws.config, empty_fetcher())
        .await
        .unwrap();
    let options = pipeline.options();
    assert_eq!(options.max_context_tokens, Some(3000));
    assert!(options.include_source_documents);
    assert_eq!(options.code_language, "rust");
}

#[tokio::test]
async fn test_from_config_built_in_code() {
    let config = TestConfigBuilder::new()
        .provider(LlmProviderKind::Anthropic)
        .model("claude-sonnet-4-20250514")
        .api_key("test-key")
        .max_context_tokens(500)
        .include_source_documents(false)
        .include_generated_question(true)
        .include_safety_verdict(false)
        .require_context(true)
        .build();

    let pipeline = CodePipeline::from_config(&config, empty_fetcher())
        .await
        .unwrap();
    let options = pipeline.options();
    assert_eq!(options.max_context_tokens, Some(500));
    assert!(!options.include_source_documents);
    assert!(options.include_generated_question);
    assert!(!options.include_safety_verdict);
    assert!(options.require_context);
}

#[tokio::test]
async fn test_prompt_override_is_loaded_and_validated() {
    let mut ws = TestWorkspace::default_config().await;
    let good = ws
        .write_file(
            "prompts/critique.txt",
            "Reply SAFE or UNSAFE for this code:\n{code}\n",
        )
        .await;
    ws.config.prompts.critique = Some(good.display().to_string());
    assert!(
        CodePipeline::from_config(&ws.config, empty_fetcher())
            .await
            .is_ok()
    );

    let bad = ws.write_file("prompts/answer.txt", "Write code.").await;
    ws.config.prompts.answer = Some(bad.display().to_string());
    let err = CodePipeline::from_config(&ws.config, empty_fetcher())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, BuildError::Prompt(_)));
    assert!(err.to_string().contains("{context}"));
}

#[tokio::test]
async fn test_missing_prompt_override_fails_build() {
    let mut ws = TestWorkspace::default_config().await;
    ws.config.prompts.condense = Some(ws.root().join("nope.txt").display().to_string());

    let result = CodePipeline::from_config(&ws.config, empty_fetcher()).await;
    assert!(matches!(result, Err(BuildError::Prompt(_))));
}

#[tokio::test]
async fn test_store_from_knowledge_dir() {
    let mut ws = TestWorkspace::default_config().await;
    ws.write_file("knowledge/widgets/checkbox.md", "st.checkbox toggles a todo item")
        .await;
    ws.write_file("knowledge/state.md", "st.session_state keeps todo items")
        .await;
    ws.write_file("knowledge/.cache/skip.md", "todo todo todo").await;
    ws.config.store.knowledge_dir = ws.root().join("knowledge").display().to_string();
    ws.config
        .store
        .metadata
        .insert("library".to_string(), "streamlit".to_string());

    let store = InMemoryStore::from_config(&ws.config.store).unwrap();
    assert_eq!(store.len(), 2);

    let hits = store.search("checkbox todo").unwrap();
    assert_eq!(hits[0].source(), Some("widgets/checkbox.md"));
    assert_eq!(hits[0].metadata.get("library").map(String::as_str), Some("streamlit"));
}

#[tokio::test]
async fn test_store_top_k_from_built_config() {
    let ws = TestWorkspace::default_config().await;
    for name in ["a", "b", "c"] {
        ws.write_file(&format!("knowledge/{name}.md"), "todo list widgets")
            .await;
    }
    let knowledge = ws.root().join("knowledge").display().to_string();
    let config = TestConfigBuilder::new()
        .knowledge_dir(&knowledge)
        .top_k(2)
        .build();

    let store = InMemoryStore::from_config(&config.store).unwrap();
    assert_eq!(store.len(), 3);
    assert_eq!(store.search("todo").unwrap().len(), 2);
}
