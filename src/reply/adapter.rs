//! Adapter between gateway requests and the reply-generation collaborator.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::generator::{GeneratedReply, ReplyGenerator};
use super::types::{EmailRequest, EmailResponse, ValidatedEmail};
use crate::error::GatewayError;
use crate::evaluation::evaluate;

/// Drives one reply generation per request and derives its evaluation.
#[derive(Clone)]
pub struct ReplyAdapter {
    generator: Arc<dyn ReplyGenerator>,
}

impl ReplyAdapter {
    pub fn new(generator: Arc<dyn ReplyGenerator>) -> Self {
        Self { generator }
    }

    pub fn is_ready(&self) -> bool {
        self.generator.is_ready()
    }

    /// Validate `request`, run the collaborator once, and build the response.
    pub async fn reply(&self, request: EmailRequest) -> Result<EmailResponse, GatewayError> {
        let validated = request.validate()?;
        self.reply_validated(validated).await
    }

    async fn reply_validated(&self, request: ValidatedEmail) -> Result<EmailResponse, GatewayError> {
        let metadata = (!request.metadata.is_empty()).then_some(&request.metadata);

        let generated = self
            .generator
            .generate(&request.email, metadata)
            .await
            .map_err(|e| {
                warn!(error = %e, "Reply generation failed");
                GatewayError::from(e)
            })?;

        let caller_keys = request.metadata.expected_keys();
        let response = build_response(generated, caller_keys);

        info!(
            keys = response.expected_keys.len(),
            matched = response.evaluation.matched.len(),
            score = response.evaluation.score,
            "Reply generated"
        );
        Ok(response)
    }
}

/// Shape collaborator output into a response whose evaluation is consistent
/// with its answers.
///
/// The effective key set is the caller's keys when supplied, otherwise the
/// collaborator's (deduplicated, order kept). Answers outside it are dropped.
fn build_response(generated: GeneratedReply, caller_keys: Option<&[String]>) -> EmailResponse {
    let GeneratedReply {
        reply,
        expected_keys: returned_keys,
        mut answers,
    } = generated;

    let expected_keys = match caller_keys {
        Some(keys) => keys.to_vec(),
        None => dedup_keys(returned_keys),
    };

    let allowed: HashSet<&str> = expected_keys.iter().map(String::as_str).collect();
    let before = answers.len();
    answers.retain(|key, _| allowed.contains(key.as_str()));
    if answers.len() != before {
        debug!(
            dropped = before - answers.len(),
            "Dropped answers outside the effective key set"
        );
    }

    let evaluation = evaluate(&answers, &expected_keys);
    EmailResponse {
        reply,
        expected_keys,
        answers,
        evaluation,
    }
}

fn dedup_keys(keys: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    keys.into_iter()
        .filter(|key| seen.insert(key.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::PipelineError;
    use crate::reply::types::ReplyMetadata;

    /// Records what it was called with and returns a fixed reply.
    struct StubGenerator {
        reply: GeneratedReply,
        calls: Mutex<Vec<(String, Option<ReplyMetadata>)>>,
    }

    impl StubGenerator {
        fn new(expected_keys: &[&str], answers: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                reply: GeneratedReply {
                    reply: "Thanks for reaching out.".to_string(),
                    expected_keys: expected_keys.iter().map(|s| s.to_string()).collect(),
                    answers: answers
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect::<BTreeMap<_, _>>(),
                },
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ReplyGenerator for StubGenerator {
        async fn generate(
            &self,
            email: &str,
            metadata: Option<&ReplyMetadata>,
        ) -> Result<GeneratedReply, PipelineError> {
            self.calls
                .lock()
                .unwrap()
                .push((email.to_string(), metadata.cloned()));
            Ok(self.reply.clone())
        }
    }

    struct FailingGenerator {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl ReplyGenerator for FailingGenerator {
        async fn generate(
            &self,
            _email: &str,
            _metadata: Option<&ReplyMetadata>,
        ) -> Result<GeneratedReply, PipelineError> {
            *self.calls.lock().unwrap() += 1;
            Err(PipelineError::Request("connection reset".into()))
        }
    }

    fn request(json: serde_json::Value) -> EmailRequest {
        serde_json::from_value(json).unwrap()
    }

    #[tokio::test]
    async fn caller_keys_drive_evaluation() {
        let stub = StubGenerator::new(&["refund_policy"], &[("refund_policy", "30 days")]);
        let adapter = ReplyAdapter::new(stub.clone());

        let response = adapter
            .reply(request(serde_json::json!({
                "email": "Hi, what is the refund policy?",
                "expected_keys": ["refund_policy"]
            })))
            .await
            .unwrap();

        assert_eq!(response.expected_keys, vec!["refund_policy".to_string()]);
        assert_eq!(response.evaluation.score, 1.0);
        assert_eq!(response.evaluation.matched, vec!["refund_policy".to_string()]);
        assert!(response.evaluation.missing.is_empty());

        let calls = stub.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let meta = calls[0].1.as_ref().unwrap();
        assert_eq!(meta.expected_keys().unwrap(), ["refund_policy"]);
    }

    #[tokio::test]
    async fn no_metadata_passes_none() {
        let stub = StubGenerator::new(&["intent"], &[("intent", "order_status")]);
        let adapter = ReplyAdapter::new(stub.clone());

        let response = adapter
            .reply(request(serde_json::json!({"email": "Where is my parcel?"})))
            .await
            .unwrap();

        // Collaborator defaults become the effective key set.
        assert_eq!(response.expected_keys, vec!["intent".to_string()]);
        assert_eq!(response.evaluation.matched, vec!["intent".to_string()]);
        assert!(stub.calls.lock().unwrap()[0].1.is_none());
    }

    #[tokio::test]
    async fn caller_keys_override_returned_keys() {
        let stub = StubGenerator::new(&["intent"], &[("intent", "refund"), ("order_id", "")]);
        let adapter = ReplyAdapter::new(stub);

        let response = adapter
            .reply(request(serde_json::json!({
                "email": "Refund please",
                "expected_keys": ["order_id", "amount"]
            })))
            .await
            .unwrap();

        assert_eq!(response.expected_keys, vec!["order_id".to_string(), "amount".to_string()]);
        assert!(response.evaluation.matched.is_empty());
        assert_eq!(
            response.evaluation.missing,
            vec!["order_id".to_string(), "amount".to_string()]
        );
        assert_eq!(response.evaluation.score, 0.0);
        // "intent" is outside the effective key set.
        assert!(!response.answers.contains_key("intent"));
    }

    #[tokio::test]
    async fn response_invariants_hold() {
        let stub = StubGenerator::new(
            &["a", "b", "a", "c"],
            &[("a", "1"), ("c", " "), ("z", "extra")],
        );
        let adapter = ReplyAdapter::new(stub);

        let response = adapter
            .reply(request(serde_json::json!({"email": "hello"})))
            .await
            .unwrap();

        assert_eq!(response.expected_keys, vec!["a", "b", "c"]);
        for key in response.answers.keys() {
            assert!(response.expected_keys.contains(key));
        }
        for key in &response.evaluation.matched {
            assert!(response.answers.contains_key(key));
        }
        assert_eq!(response.evaluation.matched, vec!["a"]);
        assert_eq!(response.evaluation.missing, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn empty_effective_keys_score_constant() {
        let stub = StubGenerator::new(&[], &[("anything", "value")]);
        let adapter = ReplyAdapter::new(stub);

        let response = adapter
            .reply(request(serde_json::json!({"email": "hello"})))
            .await
            .unwrap();

        assert!(response.expected_keys.is_empty());
        assert!(response.answers.is_empty());
        assert_eq!(response.evaluation.score, crate::evaluation::EMPTY_KEY_SET_SCORE);
    }

    #[tokio::test]
    async fn collaborator_failure_is_not_retried() {
        let failing = Arc::new(FailingGenerator {
            calls: Mutex::new(0),
        });
        let adapter = ReplyAdapter::new(failing.clone());

        let err = adapter
            .reply(request(serde_json::json!({"email": "hello"})))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::PipelineFailure(_)));
        assert_eq!(*failing.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn invalid_request_never_reaches_collaborator() {
        let stub = StubGenerator::new(&[], &[]);
        let adapter = ReplyAdapter::new(stub.clone());

        let err = adapter
            .reply(request(serde_json::json!({"email": "   "})))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::InvalidRequest(_)));
        assert!(stub.calls.lock().unwrap().is_empty());
    }
}
