// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT
use crate::queue::MessageQueueAPI;
use crate::sandbox::test::{brief_and_key, run_record, CoordinatorState, EchoFunction, MockCoordinator, MockObjectStore};

async fn started_dispatcher(
    state: std::sync::Arc<tokio::sync::Mutex<CoordinatorState>>,
    queue: &crate::queue::InMemoryMessageQueue,
) -> tokio::task::JoinHandle<()> {
    let coordinator = MockCoordinator { state };
    let mut catalog = crate::catalog::FunctionCatalog::new();
    catalog
        .register_function_group("util")
        .unwrap()
        .add_function("echo", "", std::sync::Arc::new(EchoFunction {}))
        .unwrap();
    let catalog = std::sync::Arc::new(tokio::sync::Mutex::new(catalog));
    crate::subscriber::register_catalog(&coordinator, &catalog, "agent-1").await.unwrap();

    let coordinator = std::sync::Arc::new(coordinator);
    let sandbox = crate::sandbox::ExecutionSandbox::new(
        coordinator,
        std::sync::Arc::new(MockObjectStore {
            values: std::collections::HashMap::from([(String::from("k1"), serde_json::json!("payload"))]),
            puts: std::sync::Arc::new(tokio::sync::Mutex::new(vec![])),
        }),
        catalog,
    );
    let consumer = queue.bind_queue(&crate::queue::run_consumer_queue_name("agent-1")).await.unwrap();
    let dispatcher = super::Dispatcher::new(String::from("agent-1"), consumer, sandbox, 2);
    tokio::spawn(dispatcher.run())
}

fn envelope_payload(client_name: &str, function_run_record_id: &str) -> Vec<u8> {
    serde_json::to_vec(&flownode_api::function_run::DispatchEnvelope {
        client_name: client_name.to_string(),
        function_run_record_id: function_run_record_id.to_string(),
    })
    .unwrap()
}

#[tokio::test]
async fn own_envelope_is_executed() {
    let state = std::sync::Arc::new(tokio::sync::Mutex::new(CoordinatorState::default()));
    state
        .lock()
        .await
        .run_records
        .insert(String::from("run-1"), run_record("run-1", "util-echo", vec![brief_and_key("k1")]));
    let queue = crate::queue::InMemoryMessageQueue::new();
    let dispatcher_handle = started_dispatcher(state.clone(), &queue).await;

    queue
        .publish(&crate::queue::run_consumer_queue_name("agent-1"), envelope_payload("agent-1", "run-1"))
        .await
        .unwrap();
    tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;

    let state = state.lock().await;
    assert_eq!(1, state.record_fetches);
    assert_eq!(1, state.finished_reports.len());
    dispatcher_handle.abort();
}

#[tokio::test]
async fn foreign_envelope_never_reaches_the_sandbox() {
    let state = std::sync::Arc::new(tokio::sync::Mutex::new(CoordinatorState::default()));
    state
        .lock()
        .await
        .run_records
        .insert(String::from("run-1"), run_record("run-1", "util-echo", vec![brief_and_key("k1")]));
    let queue = crate::queue::InMemoryMessageQueue::new();
    let dispatcher_handle = started_dispatcher(state.clone(), &queue).await;

    queue
        .publish(
            &crate::queue::run_consumer_queue_name("agent-1"),
            envelope_payload("somebody-else", "run-1"),
        )
        .await
        .unwrap();
    tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;

    let state = state.lock().await;
    assert_eq!(0, state.record_fetches);
    assert_eq!(0, state.finished_reports.len());
    dispatcher_handle.abort();
}

#[tokio::test]
async fn malformed_payload_is_dropped() {
    let state = std::sync::Arc::new(tokio::sync::Mutex::new(CoordinatorState::default()));
    let queue = crate::queue::InMemoryMessageQueue::new();
    let dispatcher_handle = started_dispatcher(state.clone(), &queue).await;

    let queue_name = crate::queue::run_consumer_queue_name("agent-1");
    queue.publish(&queue_name, b"not json".to_vec()).await.unwrap();
    state
        .lock()
        .await
        .run_records
        .insert(String::from("run-1"), run_record("run-1", "util-echo", vec![brief_and_key("k1")]));
    queue.publish(&queue_name, envelope_payload("agent-1", "run-1")).await.unwrap();
    tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;

    // the loop survives the malformed message and still serves the next one
    let state = state.lock().await;
    assert_eq!(1, state.finished_reports.len());
    dispatcher_handle.abort();
}
