//! End-to-end pipeline scenarios driven by scripted models and canned stores.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use coderag_core::llm::LlmError;
use coderag_core::pipeline::UpstreamError;
use coderag_core::{
    ChatTurn, CodePipeline, Document, PipelineError, PipelineOptions, PipelineRequest,
    SafetyVerdict, Stage, StoreError,
};
use coderag_test_utils::{FailingStore, ScriptedModel, StaticStore};

const TODO_ANSWER: &str = "Here you go:\n```python\nimport streamlit as st\n\nst.checkbox('buy milk')\n```\nOne checkbox per todo item.";
const TODO_CODE: &str = "\nimport streamlit as st\n\nst.checkbox('buy milk')\n";
const TODO_EXPLANATION: &str = "\nOne checkbox per todo item.";

fn docs() -> Vec<Document> {
    vec![
        Document::new("st.checkbox renders a checkbox").with_metadata("source", "checkbox.md"),
        Document::new("st.session_state keeps values across reruns")
            .with_metadata("source", "state.md"),
    ]
}

fn build(
    model: &Arc<ScriptedModel>,
    store: &Arc<StaticStore>,
    options: PipelineOptions,
) -> CodePipeline {
    CodePipeline::builder()
        .answer_model(model.clone())
        .store(store.clone())
        .options(options)
        .build()
        .expect("pipeline builds")
}

fn todo_model() -> Arc<ScriptedModel> {
    Arc::new(ScriptedModel::with_replies(
        "scripted",
        &["a todo list app", TODO_ANSWER, "SAFE"],
    ))
}

// ── Scenarios ─────────────────────────────────────────────────────

#[test_log::test]
fn test_todo_app_end_to_end() {
    let model = todo_model();
    let store = Arc::new(StaticStore::new(docs()));
    let pipeline = build(&model, &store, PipelineOptions::default());

    let result = pipeline
        .run(&PipelineRequest::new("build me a todo list app"))
        .unwrap();

    assert_eq!(result.code(), Some(TODO_CODE));
    assert_eq!(result.explanation(), Some(TODO_EXPLANATION));
    assert_eq!(result.safety_verdict(), Some(SafetyVerdict::Safe));
    assert!(result.is_approved());

    assert_eq!(model.calls(), 3);
    assert_eq!(store.queries(), vec!["a todo list app".to_string()]);

    let prompts = model.prompts();
    assert!(prompts[1].contains("Source: checkbox.md\nst.checkbox renders a checkbox"));
    assert!(prompts[1].contains("Request: a todo list app"));
    assert!(prompts[2].contains(TODO_CODE));
}

#[test]
fn test_answer_without_fence_skips_critic() {
    let model = Arc::new(ScriptedModel::with_replies(
        "scripted",
        &["a todo list app", "I would build it with a list and some buttons.", "SAFE"],
    ));
    let store = Arc::new(StaticStore::new(docs()));
    let pipeline = build(&model, &store, PipelineOptions::default());

    let result = pipeline
        .run(&PipelineRequest::new("build me a todo list app"))
        .unwrap();

    assert_eq!(result.code(), None);
    assert_eq!(result.explanation(), None);
    assert_eq!(result.safety_verdict(), Some(SafetyVerdict::Unsafe));
    assert!(!result.is_approved());
    assert_eq!(model.calls(), 2);
    assert_eq!(model.remaining(), 1);
}

#[test]
fn test_sentinel_answer_skips_critic() {
    let model = Arc::new(ScriptedModel::with_replies(
        "scripted",
        &["upload a file", "```pythonNone``` Uploading files is not allowed."],
    ));
    let store = Arc::new(StaticStore::new(docs()));
    let pipeline = build(&model, &store, PipelineOptions::default());

    let result = pipeline.run(&PipelineRequest::new("upload a file")).unwrap();
    assert_eq!(result.code(), None);
    assert_eq!(result.safety_verdict(), Some(SafetyVerdict::Unsafe));
    assert_eq!(model.calls(), 2);
}

#[test_log::test]
fn test_budget_drops_third_document() {
    let documents: Vec<Document> = ["first", "second", "third"]
        .iter()
        .map(|name| Document::new(format!("{name} passage")).with_metadata("source", *name))
        .collect();
    let mut model = ScriptedModel::with_replies("scripted", &["todo app", TODO_ANSWER, "SAFE"]);
    for doc in &documents {
        model = model.with_token_cost(&doc.content, 40);
    }
    let model = Arc::new(model);
    let store = Arc::new(StaticStore::new(documents));
    let options = PipelineOptions {
        max_context_tokens: Some(100),
        include_source_documents: true,
        ..PipelineOptions::default()
    };
    let pipeline = build(&model, &store, options);

    let result = pipeline.run(&PipelineRequest::new("todo app")).unwrap();

    let kept: Vec<_> = result
        .source_documents()
        .unwrap()
        .iter()
        .filter_map(Document::source)
        .collect();
    assert_eq!(kept, vec!["first", "second"]);

    let synthesis_prompt = &model.prompts()[1];
    assert!(synthesis_prompt.contains("second passage"));
    assert!(!synthesis_prompt.contains("third passage"));
}

// ── Output flags ──────────────────────────────────────────────────

#[test]
fn test_disabled_fields_never_appear() {
    let model = todo_model();
    let store = Arc::new(StaticStore::new(docs()));
    let options = PipelineOptions {
        include_source_documents: false,
        include_generated_question: false,
        include_safety_verdict: false,
        ..PipelineOptions::default()
    };
    let pipeline = build(&model, &store, options);

    let result = pipeline
        .run(&PipelineRequest::new("build me a todo list app"))
        .unwrap();

    assert_eq!(result.source_documents(), None);
    assert_eq!(result.generated_question(), None);
    assert_eq!(result.safety_verdict(), None);
    // The verdict still gates approval when it is not reported
    assert!(result.is_approved());

    let json = serde_json::to_value(&result).unwrap();
    let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys.len(), 2);
    assert!(keys.contains(&"code"));
    assert!(keys.contains(&"explanation"));
}

#[test]
fn test_generated_question_is_sanitized() {
    let model = Arc::new(ScriptedModel::with_replies(
        "scripted",
        &["streamlit todo app in python", TODO_ANSWER, "SAFE"],
    ));
    let store = Arc::new(StaticStore::new(docs()));
    let options = PipelineOptions {
        include_generated_question: true,
        ..PipelineOptions::default()
    };
    let pipeline = build(&model, &store, options);

    let result = pipeline.run(&PipelineRequest::new("todo app")).unwrap();

    assert_eq!(result.generated_question(), Some(" todo app in "));
    // Retrieval and synthesis use the raw query
    assert_eq!(store.queries(), vec!["streamlit todo app in python".to_string()]);
    assert!(model.prompts()[1].contains("Request: streamlit todo app in python"));
}

// ── History ───────────────────────────────────────────────────────

#[test]
fn test_history_reaches_condense_and_synthesis() {
    let model = todo_model();
    let store = Arc::new(StaticStore::new(docs()));
    let pipeline = build(&model, &store, PipelineOptions::default());

    let request = PipelineRequest::new("add a delete button").with_history(vec![
        ChatTurn::user("build me a todo list app"),
        ChatTurn::assistant("Here is a todo app."),
    ]);
    pipeline.run(&request).unwrap();

    let transcript = "\nHuman: build me a todo list app\nAssistant: Here is a todo app.";
    let prompts = model.prompts();
    assert!(prompts[0].contains(transcript));
    assert!(prompts[0].contains("add a delete button"));
    assert!(prompts[1].contains(transcript));
}

#[test]
fn test_custom_history_formatter() {
    let model = todo_model();
    let store = Arc::new(StaticStore::new(docs()));
    let options = PipelineOptions::default().with_history_formatter(Arc::new(|turns| {
        format!("<{} turns>", turns.len())
    }));
    let pipeline = build(&model, &store, options);

    let request = PipelineRequest::new("and now?").with_history(vec![ChatTurn::user("hi")]);
    pipeline.run(&request).unwrap();

    let prompts = model.prompts();
    assert!(prompts[0].contains("<1 turns>"));
    assert!(prompts[1].contains("<1 turns>"));
}

// ── Blocking and async equivalence ────────────────────────────────

#[tokio::test]
async fn test_async_matches_blocking() {
    let options = PipelineOptions {
        include_source_documents: true,
        include_generated_question: true,
        ..PipelineOptions::default()
    };
    let request = PipelineRequest::new("build me a todo list app")
        .with_history(vec![ChatTurn::user("hello"), ChatTurn::assistant("hi")]);

    let blocking_model = todo_model();
    let blocking_store = Arc::new(StaticStore::new(docs()));
    let blocking = build(&blocking_model, &blocking_store, options.clone())
        .run(&request)
        .unwrap();

    let async_model = todo_model();
    let async_store = Arc::new(StaticStore::new(docs()));
    let suspended = build(&async_model, &async_store, options)
        .run_async(&request)
        .await
        .unwrap();

    assert_eq!(blocking, suspended);
    assert_eq!(blocking_model.prompts(), async_model.prompts());
    assert_eq!(blocking_store.queries(), async_store.queries());
}

// ── Failures ──────────────────────────────────────────────────────

#[test]
fn test_blank_question_makes_no_calls() {
    let model = todo_model();
    let store = Arc::new(StaticStore::new(docs()));
    let pipeline = build(&model, &store, PipelineOptions::default());

    let err = pipeline.run(&PipelineRequest::new("  \n")).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidRequest(_)));
    assert_eq!(model.calls(), 0);
    assert!(store.queries().is_empty());
}

#[tokio::test]
async fn test_condense_failure_is_attributed() {
    let model = Arc::new(ScriptedModel::new("scripted"));
    model.push_error(LlmError::RateLimited {
        retry_after_secs: 30,
    });
    let store = Arc::new(StaticStore::new(docs()));
    let pipeline = build(&model, &store, PipelineOptions::default());

    let err = pipeline
        .run_async(&PipelineRequest::new("todo app"))
        .await
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Condense));
    assert!(matches!(
        err,
        PipelineError::Upstream {
            source: UpstreamError::Llm(LlmError::RateLimited {
                retry_after_secs: 30
            }),
            ..
        }
    ));
    assert!(store.queries().is_empty());
}

#[test]
fn test_store_failure_is_attributed() {
    let model = todo_model();
    let pipeline = CodePipeline::builder()
        .answer_model(model.clone())
        .store(Arc::new(FailingStore::new("index offline")))
        .build()
        .unwrap();

    let err = pipeline.run(&PipelineRequest::new("todo app")).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Retrieve));
    assert!(matches!(
        err,
        PipelineError::Upstream {
            source: UpstreamError::Store(StoreError::Unavailable(_)),
            ..
        }
    ));
    assert_eq!(model.calls(), 1);
}

#[test]
fn test_synthesis_and_critique_failures_are_attributed() {
    let store = Arc::new(StaticStore::new(docs()));

    let model = Arc::new(ScriptedModel::with_replies("scripted", &["todo app"]));
    model.push_error(LlmError::Timeout);
    let err = build(&model, &store, PipelineOptions::default())
        .run(&PipelineRequest::new("todo app"))
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Synthesize));

    let model = Arc::new(ScriptedModel::with_replies("scripted", &["todo app", TODO_ANSWER]));
    model.push_error(LlmError::Network("reset".to_string()));
    let err = build(&model, &store, PipelineOptions::default())
        .run(&PipelineRequest::new("todo app"))
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Critique));
    assert_eq!(model.calls(), 3);
}

#[test]
fn test_chatty_critic_is_not_approval() {
    let model = Arc::new(ScriptedModel::with_replies(
        "scripted",
        &["todo app", TODO_ANSWER, "I think this is SAFE overall."],
    ));
    let store = Arc::new(StaticStore::new(docs()));
    let result = build(&model, &store, PipelineOptions::default())
        .run(&PipelineRequest::new("todo app"))
        .unwrap();

    assert_eq!(result.safety_verdict(), Some(SafetyVerdict::Unsafe));
    assert!(!result.is_approved());
    // The code is still reported; callers gate on the verdict
    assert_eq!(result.code(), Some(TODO_CODE));
}

// ── Empty context ─────────────────────────────────────────────────

#[test]
fn test_empty_context_proceeds_by_default() {
    let model = todo_model();
    let store = Arc::new(StaticStore::empty());
    let result = build(&model, &store, PipelineOptions::default())
        .run(&PipelineRequest::new("todo app"))
        .unwrap();

    assert!(result.is_approved());
    assert!(!model.prompts()[1].contains("Source:"));
}

#[test]
fn test_require_context_fails_before_synthesis() {
    let model = todo_model();
    let store = Arc::new(StaticStore::empty());
    let options = PipelineOptions {
        require_context: true,
        ..PipelineOptions::default()
    };
    let err = build(&model, &store, options)
        .run(&PipelineRequest::new("todo app"))
        .unwrap_err();

    assert!(matches!(err, PipelineError::NoContext { retrieved: 0 }));
    assert_eq!(model.calls(), 1);
}

#[test]
fn test_require_context_counts_trimmed_documents() {
    let documents = docs();
    let mut model = ScriptedModel::with_replies("scripted", &["todo app"]);
    for doc in &documents {
        model = model.with_token_cost(&doc.content, 500);
    }
    let model = Arc::new(model);
    let store = Arc::new(StaticStore::new(documents));
    let options = PipelineOptions {
        max_context_tokens: Some(100),
        require_context: true,
        ..PipelineOptions::default()
    };
    let err = build(&model, &store, options)
        .run(&PipelineRequest::new("todo app"))
        .unwrap_err();

    assert!(matches!(err, PipelineError::NoContext { retrieved: 2 }));
}

// ── Cancellation ──────────────────────────────────────────────────

#[tokio::test]
async fn test_timeout_cancels_without_result() {
    let model = Arc::new(
        ScriptedModel::with_replies("slow", &["todo app", TODO_ANSWER, "SAFE"])
            .with_delay(Duration::from_secs(10)),
    );
    let store = Arc::new(StaticStore::new(docs()));
    let pipeline = build(&model, &store, PipelineOptions::default());

    let request = PipelineRequest::new("todo app");
    let outcome =
        tokio::time::timeout(Duration::from_millis(50), pipeline.run_async(&request)).await;

    assert!(outcome.is_err(), "invocation should have timed out");
    // Cancelled while waiting on the condense call
    assert_eq!(model.calls(), 0);
    assert!(store.queries().is_empty());
}

// ── Per-stage models ──────────────────────────────────────────────

#[tokio::test]
async fn test_stage_models_receive_their_own_prompts() {
    let condense = Arc::new(ScriptedModel::with_replies("condense", &["todo app"]));
    let answer = Arc::new(ScriptedModel::with_replies("answer", &[TODO_ANSWER]));
    let critic = Arc::new(ScriptedModel::with_replies("critic", &["safe."]));
    let pipeline = CodePipeline::builder()
        .answer_model(answer.clone())
        .condense_model(condense.clone())
        .critic_model(critic.clone())
        .store(Arc::new(StaticStore::new(docs())))
        .build()
        .unwrap();

    let result = pipeline
        .run_async(&PipelineRequest::new("build me a todo list app"))
        .await
        .unwrap();

    assert!(result.is_approved());
    assert_eq!((condense.calls(), answer.calls(), critic.calls()), (1, 1, 1));
    assert!(condense.prompts()[0].contains("build me a todo list app"));
    assert!(answer.prompts()[0].contains("Documentation:"));
    assert!(critic.prompts()[0].contains(TODO_CODE));
}
