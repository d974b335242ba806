#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use sql_bench_evaluator::catalog::GoldTaskCatalog;
    use sql_bench_evaluator::execution::SqliteExecutionAdapter;
    use sql_bench_evaluator::orchestrator::Orchestrator;
    use sql_bench_evaluator::resilience::ResilientClient;
    use sql_bench_evaluator::types::{
        Difficulty, GoldTask, RawAssessmentConfig, TaskUpdateStatus,
    };

    /// A minimal HTTP/1.1 responder over a raw `TcpListener`: no framework,
    /// just enough of the protocol for `reqwest` to parse a response.
    /// `responses` is consumed in order, one entry per accepted connection;
    /// the last entry repeats for any further hits.
    struct MockCandidate {
        url: String,
        hits: Arc<AtomicUsize>,
    }

    impl MockCandidate {
        async fn spawn(responses: Vec<(u16, &'static str)>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let hits = Arc::new(AtomicUsize::new(0));
            let hits_for_task = hits.clone();

            tokio::spawn(async move {
                let mut served = 0usize;
                loop {
                    let (mut socket, _) = match listener.accept().await {
                        Ok(pair) => pair,
                        Err(_) => break,
                    };
                    hits_for_task.fetch_add(1, Ordering::SeqCst);
                    let (status, body) = responses[served.min(responses.len() - 1)];
                    served += 1;

                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;
                        let reason = match status {
                            200 => "OK",
                            503 => "Service Unavailable",
                            _ => "Error",
                        };
                        let response = format!(
                            "HTTP/1.1 {status} {reason}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
            });

            Self { url: format!("http://{addr}"), hits }
        }

        fn hit_count(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }
    }

    fn task(id: &str, gold_sql: &str, expected: Vec<HashMap<String, serde_json::Value>>) -> GoldTask {
        GoldTask {
            id: id.to_string(),
            question: format!("question for {id}"),
            gold_sql: Some(gold_sql.to_string()),
            expected_results: Some(expected),
            difficulty: Difficulty::Easy,
            tags: HashSet::new(),
        }
    }

    fn task_no_expected(id: &str, gold_sql: &str) -> GoldTask {
        GoldTask {
            id: id.to_string(),
            question: format!("question for {id}"),
            gold_sql: Some(gold_sql.to_string()),
            expected_results: None,
            difficulty: Difficulty::Easy,
            tags: HashSet::new(),
        }
    }

    fn write_catalog(name: &str, tasks: &[GoldTask]) -> std::path::PathBuf {
        let json = serde_json::to_string(tasks).unwrap();
        let path = std::env::temp_dir().join(format!("scenario_catalog_{name}_{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, json).unwrap();
        path
    }

    async fn collect(
        orchestrator: Arc<Orchestrator>,
        participants: HashMap<String, String>,
        config: RawAssessmentConfig,
    ) -> Vec<sql_bench_evaluator::types::TaskUpdate> {
        use tokio_stream::StreamExt;
        orchestrator.assess(participants, config).collect().await
    }

    #[tokio::test]
    async fn happy_path_scores_exact_match_highly() {
        let path = write_catalog(
            "happy",
            &[task("t1", "SELECT 1 AS x", vec![HashMap::from([("x".to_string(), serde_json::json!(1))])])],
        );
        let catalog = Arc::new(GoldTaskCatalog::load(&path).await.unwrap());
        std::fs::remove_file(&path).ok();

        let adapter = Arc::new(SqliteExecutionAdapter::open_in_memory("").await.unwrap());
        let client = Arc::new(ResilientClient::new());
        let orchestrator = Arc::new(Orchestrator::new(catalog, adapter, client));

        let candidate = MockCandidate::spawn(vec![(200, r#"{"sql": "SELECT 1 AS x"}"#)]).await;
        let participants = HashMap::from([("candidate-a".to_string(), candidate.url.clone())]);
        let updates = collect(orchestrator, participants, RawAssessmentConfig::default()).await;

        let last = updates.last().unwrap();
        assert_eq!(last.status, TaskUpdateStatus::Completed);
        let artifact = last.artifact.as_ref().unwrap();
        let summary = &artifact.participants["candidate-a"];
        assert_eq!(summary.total, 1);
        let result = &summary.task_results[0];
        assert_eq!(result.score.correctness, 1.0);
        assert!(result.score.overall >= 0.9);
        assert_eq!(result.classification.category, "no_error");
        assert_eq!(result.classification.subcategory, "no_error");
        assert_eq!(artifact.rankings[0].candidate_id, "candidate-a");
        assert_eq!(artifact.rankings[0].rank, 1);
    }

    #[tokio::test]
    async fn phantom_table_is_classified_as_schema_error() {
        let path = write_catalog(
            "phantom",
            &[task_no_expected("t1", "SELECT * FROM customers")],
        );
        let catalog = Arc::new(GoldTaskCatalog::load(&path).await.unwrap());
        std::fs::remove_file(&path).ok();

        let fixture = "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT);";
        let adapter = Arc::new(SqliteExecutionAdapter::open_in_memory(fixture).await.unwrap());
        let client = Arc::new(ResilientClient::new());
        let orchestrator = Arc::new(Orchestrator::new(catalog, adapter, client));

        let candidate = MockCandidate::spawn(vec![(200, r#"{"sql": "SELECT * FROM customerz"}"#)]).await;
        let participants = HashMap::from([("candidate-a".to_string(), candidate.url.clone())]);
        let updates = collect(orchestrator, participants, RawAssessmentConfig::default()).await;

        let artifact = updates.last().unwrap().artifact.as_ref().unwrap();
        let result = &artifact.participants["candidate-a"].task_results[0];
        assert!(!result.execution.success);
        assert!(result.execution.phantom_tables.contains(&"customerz".to_string()));
        assert_eq!(result.classification.category, "schema_error");
        assert_eq!(result.classification.subcategory, "wrong_table");
        assert!((result.classification.confidence - 0.95).abs() < 1e-9);
        assert_eq!(result.score.correctness, 0.0);
        assert!(result.score.safety <= 0.4);
    }

    #[tokio::test(start_paused = true)]
    async fn circuit_opens_after_repeated_failures_and_synthesizes_zero_score() {
        let path = write_catalog("circuit", &[task("t1", "SELECT 1", vec![])]);
        let catalog = Arc::new(GoldTaskCatalog::load(&path).await.unwrap());
        std::fs::remove_file(&path).ok();

        let adapter = Arc::new(SqliteExecutionAdapter::open_in_memory("").await.unwrap());
        let client = Arc::new(ResilientClient::new());

        let candidate = MockCandidate::spawn(vec![(503, ""), (503, ""), (503, "")]).await;

        let result = client
            .dispatch(
                &candidate.url,
                sql_bench_evaluator::resilience::OperationType::SqlGeneration,
                &sql_bench_evaluator::resilience::CandidateRequest {
                    task_id: "t1".to_string(),
                    question: "q".to_string(),
                    schema: serde_json::json!({}),
                    dialect: "sqlite".to_string(),
                },
            )
            .await;
        assert!(result.is_err());
        assert_eq!(candidate.hit_count(), 3);

        // Fourth dispatch must fail fast with CircuitOpen and issue no
        // further network call.
        let second = client
            .dispatch(
                &candidate.url,
                sql_bench_evaluator::resilience::OperationType::SqlGeneration,
                &sql_bench_evaluator::resilience::CandidateRequest {
                    task_id: "t1".to_string(),
                    question: "q".to_string(),
                    schema: serde_json::json!({}),
                    dialect: "sqlite".to_string(),
                },
            )
            .await;
        assert!(matches!(
            second,
            Err(sql_bench_evaluator::resilience::ResilientClientError::CircuitOpen(_))
        ));
        assert_eq!(candidate.hit_count(), 3);

        let orchestrator = Arc::new(Orchestrator::new(catalog, adapter, client));
        let participants = HashMap::from([("candidate-a".to_string(), candidate.url.clone())]);
        let updates = collect(orchestrator, participants, RawAssessmentConfig::default()).await;

        let artifact = updates.last().unwrap().artifact.as_ref().unwrap();
        let result = &artifact.participants["candidate-a"].task_results[0];
        assert!(!result.execution.success);
        assert_eq!(result.score.overall, 0.0);
    }

    #[tokio::test]
    async fn multi_candidate_ranking_orders_by_overall_descending() {
        let path = write_catalog(
            "ranking",
            &[
                task("t1", "SELECT 1 AS x", vec![HashMap::from([("x".to_string(), serde_json::json!(1))])]),
                task("t2", "SELECT 2 AS x", vec![HashMap::from([("x".to_string(), serde_json::json!(2))])]),
            ],
        );
        let catalog = Arc::new(GoldTaskCatalog::load(&path).await.unwrap());
        std::fs::remove_file(&path).ok();

        let adapter = Arc::new(SqliteExecutionAdapter::open_in_memory("").await.unwrap());
        let client = Arc::new(ResilientClient::new());
        let orchestrator = Arc::new(Orchestrator::new(catalog, adapter, client));

        let candidate_a = MockCandidate::spawn(vec![(200, r#"{"sql": "SELECT 1 AS x"}"#)]).await;
        let candidate_b = MockCandidate::spawn(vec![(200, r#"{"sql": "SELECT 999 AS x"}"#)]).await;

        let participants = HashMap::from([
            ("candidate-a".to_string(), candidate_a.url.clone()),
            ("candidate-b".to_string(), candidate_b.url.clone()),
        ]);
        let updates = collect(orchestrator, participants, RawAssessmentConfig::default()).await;

        let artifact = updates.last().unwrap().artifact.as_ref().unwrap();

        // Ranking totality: every participant appears exactly once, ordered
        // by overall descending.
        assert_eq!(artifact.rankings.len(), 2);
        assert!(artifact.rankings[0].overall >= artifact.rankings[1].overall);
        assert_eq!(artifact.rankings[0].candidate_id, "candidate-a");
        assert_eq!(artifact.rankings[0].rank, 1);
        assert_eq!(artifact.rankings[1].candidate_id, "candidate-b");
        assert_eq!(artifact.rankings[1].rank, 2);

        // Task-index alignment: both candidates saw the same task ids in the
        // same order.
        let comparison = artifact.task_comparison.as_ref().unwrap();
        assert_eq!(comparison.len(), 2);
        for row in comparison {
            assert!(row.agent_scores.contains_key("candidate-a"));
            assert!(row.agent_scores.contains_key("candidate-b"));
        }
    }

    #[tokio::test]
    async fn same_tasks_false_is_rejected_as_configuration_error() {
        let path = write_catalog("reject", &[task("t1", "SELECT 1", vec![])]);
        let catalog = Arc::new(GoldTaskCatalog::load(&path).await.unwrap());
        std::fs::remove_file(&path).ok();

        let adapter = Arc::new(SqliteExecutionAdapter::open_in_memory("").await.unwrap());
        let client = Arc::new(ResilientClient::new());
        let orchestrator = Arc::new(Orchestrator::new(catalog, adapter, client));

        let mut config = RawAssessmentConfig::default();
        config.same_tasks = Some(false);

        let participants = HashMap::from([("candidate-a".to_string(), "http://127.0.0.1:1".to_string())]);
        let updates = collect(orchestrator, participants, config).await;

        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].status, TaskUpdateStatus::Submitted);
        assert_eq!(updates[1].status, TaskUpdateStatus::Failed);
        assert!(updates[1].artifact.is_none());
    }
}
