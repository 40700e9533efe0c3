//! 端到端场景：AgentService + 确定性 Mock 后端 + 内置工具

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use wren::config::AppConfig;
    use wren::llm::{LlmClient, MockLlmClient};
    use wren::react::{dedup_tools, AgentResponse};
    use async_trait::async_trait;
    use wren::tools::{create_registry, Tool};
    use wren::AgentService;

    fn offline_config() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.tools.web_search.offline = true;
        cfg
    }

    async fn service_with(cfg: AppConfig, llm: impl LlmClient + 'static) -> AgentService {
        let registry = create_registry(&cfg.tools).unwrap();
        let service = AgentService::new(cfg);
        service.initialize_with(Arc::new(llm), registry).await.unwrap();
        service
    }

    async fn ask(service: &AgentService, query: &str) -> AgentResponse {
        service.process_query(query, None, None).await
    }

    fn assert_contiguous(resp: &AgentResponse) {
        let numbers: Vec<usize> = resp.steps.iter().map(|s| s.step_number).collect();
        let expected: Vec<usize> = (1..=resp.steps.len()).collect();
        assert_eq!(numbers, expected);
    }

    #[tokio::test]
    async fn test_arithmetic_uses_calculator_once() {
        let service = service_with(offline_config(), MockLlmClient::new()).await;
        let resp = ask(&service, "2+2").await;

        assert!(resp.success, "{:?}", resp.error_message);
        assert_eq!(resp.steps.len(), 2);
        assert_eq!(resp.tools_used, vec!["calculator"]);
        assert_eq!(resp.steps[0].action.as_deref(), Some("calculator"));
        assert_eq!(resp.steps[0].action_input.as_deref(), Some("2+2"));
        assert!(resp.steps[0].observation.as_deref().unwrap().contains("Result: 4"));
        assert!(resp.steps[1].action.is_none());
        assert!(resp.response.contains('4'));
        assert!(resp.error_message.is_none());
        assert_contiguous(&resp);

        let status = service.tools_status().await;
        assert_eq!(status["calculator"].usage_count, 1);
        assert!(status["calculator"].last_used.is_some());
    }

    #[tokio::test]
    async fn test_general_question_answers_directly() {
        let service = service_with(offline_config(), MockLlmClient::new()).await;
        let resp = ask(&service, "qué opinas del clima").await;

        assert!(resp.success);
        assert!(!resp.response.is_empty());
        assert!(resp.tools_used.is_empty());
        assert_eq!(resp.steps.len(), 1);
        assert!(resp.steps[0].action.is_none());
        assert!(resp.steps[0].observation.is_none());
    }

    #[tokio::test]
    async fn test_price_query_uses_web_search() {
        let service = service_with(offline_config(), MockLlmClient::new()).await;
        let resp = ask(&service, "precio del bitcoin").await;

        assert!(resp.success);
        assert_eq!(resp.tools_used, vec!["web_search"]);
        assert!(resp.response.contains("[OFFLINE]"));
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let mut cfg = offline_config();
        cfg.agent.timeout_secs = 1;
        let llm = MockLlmClient::new().with_delay(Duration::from_secs(3));
        let service = service_with(cfg, llm).await;
        let resp = ask(&service, "2+2").await;

        assert!(!resp.success);
        assert!(resp.steps.is_empty());
        let err = resp.error_message.unwrap();
        assert!(err.contains("time limit"));
        assert!(resp.processing_time < 2.5);
    }

    #[tokio::test]
    async fn test_backend_timeout_is_backend_failure() {
        let mut cfg = offline_config();
        cfg.agent.backend_timeout_secs = 1;
        let llm = MockLlmClient::new().with_delay(Duration::from_secs(3));
        let service = service_with(cfg, llm).await;
        let resp = ask(&service, "2+2").await;

        assert!(!resp.success);
        assert!(resp.error_message.unwrap().contains("Reasoning backend failed"));
    }

    #[tokio::test]
    async fn test_unknown_tool_exhausts_parse_retries() {
        let service = service_with(offline_config(), MockLlmClient::forced_action("fake_tool", "x")).await;
        let resp = ask(&service, "anything").await;

        assert!(!resp.success);
        assert!(resp.error_message.as_deref().unwrap().contains("fake_tool"));
        assert_eq!(resp.response, resp.error_message.clone().unwrap());
        assert_eq!(resp.steps.len(), 2);
        assert_contiguous(&resp);
        assert!(resp.steps.iter().all(|s| s.action.is_none()));
        assert_eq!(resp.steps[1].thought, "Necesito usar fake_tool otra vez.");
        assert!(resp.steps[1].observation.as_deref().unwrap().contains("fake_tool"));
        assert!(resp.tools_used.is_empty());
    }

    #[tokio::test]
    async fn test_correction_rounds_count_toward_iteration_limit() {
        let mut cfg = offline_config();
        cfg.agent.max_iterations = 3;
        cfg.agent.max_parse_retries = 5;
        let service = service_with(cfg, MockLlmClient::scripted(["I am not sure"])).await;
        let resp = ask(&service, "hola").await;

        assert!(!resp.success);
        assert_eq!(resp.steps.len(), 3);
        assert_contiguous(&resp);
        assert!(resp.error_message.unwrap().contains("iteration limit (3)"));
    }

    /// 执行时睡眠的工具，用于验证整体时限会打断进行中的工具调用
    struct SleepyTool;

    #[async_trait]
    impl Tool for SleepyTool {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn description(&self) -> &str {
            "Sleeps before answering"
        }

        async fn execute(&self, _input: &str) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok("awake".to_string())
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_deadline_cancels_in_flight_tool() {
        let mut cfg = offline_config();
        cfg.agent.timeout_secs = 1;
        cfg.agent.tool_timeout_secs = 30;
        let mut registry = create_registry(&cfg.tools).unwrap();
        registry.register(SleepyTool).unwrap();
        let llm = MockLlmClient::scripted([
            "Thought: add first\nAction: calculator\nAction Input: 1+1",
            "Thought: now wait\nAction: sleepy\nAction Input: x",
        ]);
        let service = AgentService::new(cfg);
        service.initialize_with(Arc::new(llm), registry).await.unwrap();

        let resp = ask(&service, "1+1 then wait").await;
        assert!(!resp.success);
        assert!(resp.error_message.unwrap().contains("time limit"));
        assert_eq!(resp.steps.len(), 1);
        assert_eq!(resp.steps[0].action.as_deref(), Some("calculator"));
        assert_eq!(resp.tools_used, vec!["calculator"]);
        assert!(resp.processing_time < 2.5);
    }

    #[tokio::test]
    async fn test_cycling_backend_stops_at_iteration_limit() {
        let service = service_with(offline_config(), MockLlmClient::forced_action("calculator", "1+1")).await;
        let resp = ask(&service, "1+1").await;

        assert!(!resp.success);
        assert_eq!(resp.steps.len(), 3);
        assert_contiguous(&resp);
        assert_eq!(resp.tools_used, vec!["calculator"]);
        let err = resp.error_message.unwrap();
        assert!(err.contains("iteration limit (3)"));
        assert_eq!(service.tools_status().await["calculator"].usage_count, 3);
    }

    #[tokio::test]
    async fn test_tools_filter_limits_dispatch() {
        let service = service_with(offline_config(), MockLlmClient::new()).await;
        let resp = service
            .process_query("2+2", None, Some(vec!["translator".to_string()]))
            .await;
        // 第一轮提议 calculator 被拒；纠正之后替身给出最终答案
        assert!(resp.success);
        assert!(resp.tools_used.is_empty());
        assert!(resp.steps[0]
            .observation
            .as_deref()
            .unwrap()
            .contains("is not a valid tool"));
    }

    #[tokio::test]
    async fn test_success_iff_final_answer() {
        let service = service_with(offline_config(), MockLlmClient::new()).await;
        for query in ["2+2", "traduce hello", "hola", "cuanto es 10 / 4"] {
            let resp = ask(&service, query).await;
            assert_eq!(resp.success, resp.error_message.is_none(), "{query}");
            if resp.success {
                assert!(!resp.response.is_empty());
            }
            assert_contiguous(&resp);
            assert!(resp.steps.len() <= 3);
            assert_eq!(dedup_tools(&resp.tools_used), resp.tools_used);
        }
    }

    #[tokio::test]
    async fn test_shutdown_then_query_is_rejected() {
        let service = service_with(offline_config(), MockLlmClient::new()).await;
        assert!(service.health_check().await.healthy);
        service.shutdown().await;

        let resp = ask(&service, "2+2").await;
        assert!(!resp.success);
        assert!(resp.error_message.unwrap().contains("not initialized"));
        assert!(!service.is_initialized().await);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_in_flight_query() {
        let llm = MockLlmClient::new().with_delay(Duration::from_secs(5));
        let service = Arc::new(service_with(offline_config(), llm).await);

        let running = Arc::clone(&service);
        let handle = tokio::spawn(async move { ask(&running, "2+2").await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        service.shutdown().await;

        let resp = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(!resp.success);
        assert!(resp.error_message.unwrap().contains("cancelled"));
    }

    #[tokio::test]
    async fn test_concurrent_queries_are_isolated() {
        let service = Arc::new(service_with(offline_config(), MockLlmClient::new()).await);
        let handles: Vec<_> = ["2+2", "qué opinas del clima", "3*3", "hola"]
            .into_iter()
            .map(|q| {
                let s = Arc::clone(&service);
                tokio::spawn(async move { ask(&s, q).await })
            })
            .collect();
        let mut calculator_runs = 0;
        for h in handles {
            let resp = h.await.unwrap();
            assert!(resp.success);
            assert_contiguous(&resp);
            calculator_runs += resp.tools_used.iter().filter(|t| *t == "calculator").count();
        }
        assert_eq!(calculator_runs, 2);
        assert_eq!(service.tools_status().await["calculator"].usage_count, 2);
    }
}
