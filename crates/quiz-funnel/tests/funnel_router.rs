//! HTTP scenarios for the funnel router, backed by fixture data and an in-memory session store.

mod common {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use quiz_funnel::funnel::{
        FlowSettings, FunnelService, FunnelSource, QuizSession, SessionId, SessionStore,
        SessionStoreError,
    };

    #[derive(Default)]
    pub(super) struct Sessions {
        records: Mutex<HashMap<SessionId, QuizSession>>,
    }

    impl SessionStore for Sessions {
        fn insert(&self, session: QuizSession) -> Result<QuizSession, SessionStoreError> {
            let mut guard = self.records.lock().expect("store mutex poisoned");
            if guard.contains_key(&session.id) {
                return Err(SessionStoreError::Conflict);
            }
            guard.insert(session.id.clone(), session.clone());
            Ok(session)
        }

        fn update_with<R, F>(&self, id: &SessionId, apply: F) -> Result<R, SessionStoreError>
        where
            F: FnOnce(&mut QuizSession) -> R,
        {
            let mut guard = self.records.lock().expect("store mutex poisoned");
            let session = guard.get_mut(id).ok_or(SessionStoreError::NotFound)?;
            Ok(apply(session))
        }

        fn remove(&self, id: &SessionId) -> Result<Option<QuizSession>, SessionStoreError> {
            let mut guard = self.records.lock().expect("store mutex poisoned");
            Ok(guard.remove(id))
        }
    }

    pub(super) fn service_with(dir: PathBuf) -> Arc<FunnelService<Sessions>> {
        service_with_delay(dir, Duration::ZERO)
    }

    pub(super) fn service_with_delay(
        dir: PathBuf,
        transition_delay: Duration,
    ) -> Arc<FunnelService<Sessions>> {
        Arc::new(FunnelService::new(
            Arc::new(Sessions::default()),
            Arc::new(FunnelSource::Fixture { dir }),
            FlowSettings {
                transition_delay,
                fallback_outcome: "マンジャロ".to_string(),
            },
        ))
    }

    pub(super) fn fixture_dir() -> PathBuf {
        PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../../public/json"))
    }
}

mod routes {
    use super::common::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use quiz_funnel::funnel::funnel_router;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    fn router() -> Router {
        funnel_router(service_with(fixture_dir()))
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(payload) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&payload).expect("serialize body"))
            }
            None => Body::empty(),
        };

        let response = router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("router dispatch");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, json)
    }

    async fn start(router: &Router) -> String {
        let (status, body) = send(router, "POST", "/api/v1/quiz/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "answering");
        assert_eq!(body["index"], 0);
        assert_eq!(body["total_questions"], 3);
        body["session_id"].as_str().expect("session id").to_string()
    }

    #[tokio::test]
    async fn catalog_lists_cards_sorted_by_id() {
        let (status, body) = send(&router(), "GET", "/api/v1/blogs", None).await;

        assert_eq!(status, StatusCode::OK);
        let cards = body["cards"].as_array().expect("cards");
        let ids: Vec<u64> = cards.iter().filter_map(|card| card["id"].as_u64()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(cards[0]["type"], "リベルサス");
        assert_eq!(body["rows"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["preload"].as_array().map(Vec::len), Some(12));
    }

    #[tokio::test]
    async fn full_pass_redirects_to_matched_result() {
        let router = router();
        let id = start(&router).await;
        let base = format!("/api/v1/quiz/sessions/{id}");

        for _ in 0..3 {
            let (status, _) = send(
                &router,
                "POST",
                &format!("{base}/select"),
                Some(json!({ "option": 2 })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);

            let (status, _) = send(&router, "POST", &format!("{base}/advance"), None).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, body) = send(&router, "GET", &base, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["outcome"], "サクセンダ/ビクトーザ");
        assert_eq!(body["redirect_path"], "/quiz/result/サクセンダ-ビクトーザ");

        let (status, result) = send(
            &router,
            "GET",
            "/api/v1/results/%E3%82%B5%E3%82%AF%E3%82%BB%E3%83%B3%E3%83%80-%E3%83%93%E3%82%AF%E3%83%88%E3%83%BC%E3%82%B6",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(result["title"], "サクセンダ/ビクトーザ");
        assert_eq!(result["images"].as_array().map(Vec::len), Some(3));
        assert!(result.get("tracking_script").is_none());
    }

    #[tokio::test]
    async fn advancing_without_answer_is_rejected() {
        let router = router();
        let id = start(&router).await;
        let base = format!("/api/v1/quiz/sessions/{id}");

        let (status, body) = send(&router, "POST", &format!("{base}/advance"), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "質問に答えてから次へ進んでください。");

        let (_, snapshot) = send(&router, "GET", &base, None).await;
        assert_eq!(snapshot["index"], 0);
        assert_eq!(
            snapshot["validation_error"],
            "質問に答えてから次へ進んでください。"
        );
    }

    #[tokio::test]
    async fn summary_reports_condition_table() {
        let router = router();
        let id = start(&router).await;
        let base = format!("/api/v1/quiz/sessions/{id}");

        send(
            &router,
            "POST",
            &format!("{base}/select"),
            Some(json!({ "option": 0 })),
        )
        .await;

        let (status, report) = send(&router, "GET", &format!("{base}/summary"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["loaded"], 4);
        assert_eq!(report["inert"], 1);
        assert_eq!(report["outcome"], "マンジャロ");
    }

    #[tokio::test]
    async fn disposed_sessions_are_gone() {
        let router = router();
        let id = start(&router).await;
        let base = format!("/api/v1/quiz/sessions/{id}");

        let (status, _) = send(&router, "DELETE", &base, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&router, "GET", &base, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_result_is_not_found() {
        let (status, body) = send(&router(), "GET", "/api/v1/results/unknown", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["title"], "unknown");
    }

    #[tokio::test]
    async fn missing_quiz_data_reports_errored_session() {
        let dir = std::env::temp_dir().join(format!("quiz-funnel-empty-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create empty fixture dir");
        let router = funnel_router(service_with(dir));

        let (status, body) = send(&router, "POST", "/api/v1/quiz/sessions", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["status"], "errored");

        let (status, _) = send(&router, "GET", "/api/v1/blogs", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn retreat_from_first_question_is_rejected() {
        let router = router();
        let id = start(&router).await;
        let base = format!("/api/v1/quiz/sessions/{id}");

        let (status, body) = send(&router, "POST", &format!("{base}/retreat"), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].is_string());

        let (_, snapshot) = send(&router, "GET", &base, None).await;
        assert_eq!(snapshot["index"], 0);
    }

    #[tokio::test]
    async fn input_is_rejected_while_a_transition_is_pending() {
        let router = funnel_router(service_with_delay(fixture_dir(), Duration::from_millis(150)));
        let id = start(&router).await;
        let base = format!("/api/v1/quiz/sessions/{id}");

        send(&router, "POST", &format!("{base}/select"), Some(json!({ "option": 0 }))).await;
        let (status, body) = send(&router, "POST", &format!("{base}/advance"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transitioning"], true);

        let (status, _) = send(&router, "POST", &format!("{base}/retreat"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = send(&router, "POST", &format!("{base}/select"), Some(json!({ "option": 1 }))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        tokio::time::sleep(Duration::from_millis(200)).await;

        let (status, snapshot) = send(&router, "GET", &base, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot["index"], 1);

        let (status, _) = send(&router, "POST", &format!("{base}/retreat"), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn completed_session_rejects_further_input() {
        let router = router();
        let id = start(&router).await;
        let base = format!("/api/v1/quiz/sessions/{id}");

        for _ in 0..3 {
            send(&router, "POST", &format!("{base}/select"), Some(json!({ "option": 0 }))).await;
            send(&router, "POST", &format!("{base}/advance"), None).await;
        }

        let (status, _) = send(&router, "POST", &format!("{base}/select"), Some(json!({ "option": 1 }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = send(&router, "POST", &format!("{base}/retreat"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, snapshot) = send(&router, "GET", &base, None).await;
        assert_eq!(snapshot["status"], "completed");
        assert_eq!(snapshot["outcome"], "リベルサス");
    }
}
