// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT
use crate::sandbox::test::{CoordinatorState, MockCoordinator, MockObjectStore};

fn report_ctx() -> flownode_api::function_run::RunReportContext {
    flownode_api::function_run::RunReportContext {
        function_run_record_id: String::from("run-1"),
        trace_id: String::from("trace-1"),
        span_id: String::from("span-1"),
    }
}

#[tokio::test]
async fn outputs_are_persisted_and_annotated_before_reporting() {
    let state = std::sync::Arc::new(tokio::sync::Mutex::new(CoordinatorState::default()));
    let puts = std::sync::Arc::new(tokio::sync::Mutex::new(vec![]));
    let sink = super::RunEventSink::new(
        std::sync::Arc::new(MockCoordinator { state: state.clone() }),
        std::sync::Arc::new(MockObjectStore {
            values: std::collections::HashMap::new(),
            puts: puts.clone(),
        }),
        report_ctx(),
        super::FunctionRunLogger::new(&report_ctx()),
    );

    let (mut event_sender, event_receiver) = flownode_api::function_run::run_event_channel();
    let sink_handle = tokio::spawn(sink.run(event_receiver));

    event_sender
        .report_log(flownode_api::function_run::LogLevel::Info, "start")
        .await;
    event_sender.report_progress_milestone(0).await;
    event_sender
        .report_finished(flownode_api::function_run::FunctionRunOpt::suc_opt(
            "done",
            std::collections::HashMap::from([(String::from("result"), serde_json::json!(3))]),
        ))
        .await;
    sink_handle.await.unwrap();

    assert_eq!(1, puts.lock().await.len());
    let state = state.lock().await;
    assert_eq!(vec![(String::from("run-1"), 0)], state.progress_reports);
    assert_eq!(1, state.finished_reports.len());
    let (_, function_run_opt) = &state.finished_reports[0];
    assert_eq!(Some(&String::from("3")), function_run_opt.opt_key_map_brief_data.get("result"));
    assert_eq!(
        Some(&String::from("os-run-1-result")),
        function_run_opt.opt_key_map_object_storage_key.get("result")
    );
}

#[tokio::test]
async fn failed_result_is_reported_without_persistence() {
    let state = std::sync::Arc::new(tokio::sync::Mutex::new(CoordinatorState::default()));
    let puts = std::sync::Arc::new(tokio::sync::Mutex::new(vec![]));
    let sink = super::RunEventSink::new(
        std::sync::Arc::new(MockCoordinator { state: state.clone() }),
        std::sync::Arc::new(MockObjectStore {
            values: std::collections::HashMap::new(),
            puts: puts.clone(),
        }),
        report_ctx(),
        super::FunctionRunLogger::new(&report_ctx()),
    );

    let (mut event_sender, event_receiver) = flownode_api::function_run::run_event_channel();
    let sink_handle = tokio::spawn(sink.run(event_receiver));
    event_sender
        .report_finished(flownode_api::function_run::FunctionRunOpt::fail_intercept_opt("broken"))
        .await;
    sink_handle.await.unwrap();

    assert!(puts.lock().await.is_empty());
    let state = state.lock().await;
    assert_eq!(1, state.finished_reports.len());
    assert_eq!("broken", state.finished_reports[0].1.error_msg);
}
