//! Follow-up questions against sessions produced by the pipeline

use dossier_core::prelude::*;
use dossier_model::AnswerSource;
use dossier_retrieval::{RetrievalEngine, RetrievalError};
use dossier_store::SessionStore;
use dossier_test_utils::{memory_pipeline, CapabilitySet, FakeWriter};
use pretty_assertions::assert_eq;

const TOPIC: &str = "renewable energy storage";

async fn researched(set: &CapabilitySet) -> (Session, RetrievalEngine) {
    let (pipeline, store) = memory_pipeline(set);
    let session = pipeline.run(TOPIC, Expertise::Intermediate).await.unwrap();
    let engine = RetrievalEngine::new(store as Arc<dyn SessionStore>);
    (session, engine)
}

#[tokio::test]
async fn test_risk_question_is_answered_from_report() {
    let (session, engine) = researched(&CapabilitySet::happy(TOPIC)).await;

    let answer = engine
        .answer(&session.id.to_string(), "What are the risks?")
        .await
        .unwrap();

    assert_eq!(answer.source, AnswerSource::Report);
    assert!(answer.confidence > 0.0);
    assert!(answer.text.to_lowercase().contains("risk"));
}

#[tokio::test]
async fn test_templated_report_still_answers() {
    let set = CapabilitySet::happy(TOPIC).with_writer(FakeWriter::uncited());
    let (session, engine) = researched(&set).await;
    assert!(session.report.as_ref().unwrap().templated);

    let answer = engine
        .answer(&session.id.to_string(), "Which trends matter?")
        .await
        .unwrap();

    assert!(answer.is_match());
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let (pipeline, store) = memory_pipeline(&CapabilitySet::happy(TOPIC));
    drop(pipeline);
    let engine = RetrievalEngine::new(Arc::clone(&store) as Arc<dyn SessionStore>);

    let err = engine
        .answer("nonexistent-id", "What are the risks?")
        .await
        .unwrap_err();

    assert!(matches!(err, RetrievalError::SessionNotFound(id) if id == "nonexistent-id"));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_answering_does_not_modify_session() {
    let (pipeline, store) = memory_pipeline(&CapabilitySet::happy(TOPIC));
    let session = pipeline.run(TOPIC, Expertise::Intermediate).await.unwrap();
    let engine = RetrievalEngine::new(Arc::clone(&store) as Arc<dyn SessionStore>);

    let first = engine
        .answer(&session.id.to_string(), "How much does it cost?")
        .await
        .unwrap();
    let second = engine
        .answer(&session.id.to_string(), "How much does it cost?")
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(store.get(&session.id).await.unwrap(), session);
    assert_eq!(engine.history(&session.id).len(), 2);
}

#[tokio::test]
async fn test_failed_session_answers_with_zero_confidence() {
    let (pipeline, store) = memory_pipeline(&CapabilitySet::broken());
    let err = pipeline.run(TOPIC, Expertise::Beginner).await.unwrap_err();
    let session_id = err.session_id().unwrap();
    let engine = RetrievalEngine::new(store as Arc<dyn SessionStore>);

    let answer = engine
        .answer(&session_id.to_string(), "What are the risks?")
        .await
        .unwrap();

    assert!(!answer.is_match());
    assert_eq!(answer.confidence, 0.0);
}
