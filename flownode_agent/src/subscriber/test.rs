// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT
use futures::SinkExt;

struct NopFunction {}

#[async_trait::async_trait]
impl flownode_api::function::FunctionInterface for NopFunction {
    fn ipt_config(&self) -> Vec<flownode_api::function::FunctionIpt> {
        vec![]
    }

    fn opt_config(&self) -> Vec<flownode_api::function::FunctionOpt> {
        vec![]
    }

    fn all_progress_milestones(&self) -> Vec<String> {
        vec![]
    }

    async fn run(&self, _ipts: Vec<flownode_api::function::FunctionIpt>, _event_sender: flownode_api::function_run::RunEventSender) {}
}

struct MockCoordinator {
    // functions without an entry here get no id in the response
    ids: std::collections::HashMap<String, String>,
    register_requests: std::sync::Arc<tokio::sync::Mutex<Vec<flownode_api::function::RegisterFunctionsRequest>>>,
}

#[async_trait::async_trait]
impl flownode_api::coordinator::CoordinatorAPI for MockCoordinator {
    async fn register_functions(
        &self,
        request: flownode_api::function::RegisterFunctionsRequest,
    ) -> anyhow::Result<flownode_api::function::RegisterFunctionsResponse> {
        self.register_requests.lock().await.push(request.clone());
        let mut group_name_map_functions = request.group_name_map_functions;
        for (group_name, functions) in group_name_map_functions.iter_mut() {
            for function in functions.iter_mut() {
                function.id = self.ids.get(&format!("{}-{}", group_name, function.name)).cloned();
            }
        }
        Ok(flownode_api::function::RegisterFunctionsResponse { group_name_map_functions })
    }

    async fn function_run_record(&self, _function_run_record_id: &str) -> anyhow::Result<flownode_api::function_run::FunctionRunRecord> {
        anyhow::bail!("not expected in this test");
    }

    async fn report_progress_milestone(
        &self,
        _report_ctx: &flownode_api::function_run::RunReportContext,
        _progress_milestone_index: usize,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn report_function_run_finished(
        &self,
        _report_ctx: &flownode_api::function_run::RunReportContext,
        _function_run_opt: flownode_api::function_run::FunctionRunOpt,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

fn catalog_with_calcu() -> crate::catalog::FunctionCatalog {
    let mut catalog = crate::catalog::FunctionCatalog::new();
    let group = catalog.register_function_group("math").unwrap();
    group.add_function("calcu", "demo", std::sync::Arc::new(NopFunction {})).unwrap();
    catalog
}

#[tokio::test]
async fn register_catalog_binds_every_id() {
    let coordinator = MockCoordinator {
        ids: std::collections::HashMap::from([(String::from("math-calcu"), String::from("id-1"))]),
        register_requests: std::sync::Arc::new(tokio::sync::Mutex::new(vec![])),
    };
    let catalog = tokio::sync::Mutex::new(catalog_with_calcu());

    super::register_catalog(&coordinator, &catalog, "agent-1").await.unwrap();

    let catalog = catalog.lock().await;
    assert_eq!(Some(String::from("id-1")), catalog.groups()[0].functions()[0].id);
}

#[tokio::test]
async fn register_catalog_fails_on_missing_id() {
    let coordinator = MockCoordinator {
        ids: std::collections::HashMap::new(),
        register_requests: std::sync::Arc::new(tokio::sync::Mutex::new(vec![])),
    };
    let catalog = tokio::sync::Mutex::new(catalog_with_calcu());

    assert!(super::register_catalog(&coordinator, &catalog, "agent-1").await.is_err());
}

#[tokio::test]
async fn heartbeat_refresh_keeps_ids_stable() {
    let register_requests = std::sync::Arc::new(tokio::sync::Mutex::new(vec![]));
    let coordinator: std::sync::Arc<dyn flownode_api::coordinator::CoordinatorAPI> = std::sync::Arc::new(MockCoordinator {
        ids: std::collections::HashMap::from([(String::from("math-calcu"), String::from("id-1"))]),
        register_requests: register_requests.clone(),
    });
    let catalog = std::sync::Arc::new(tokio::sync::Mutex::new(catalog_with_calcu()));

    super::register_catalog(coordinator.as_ref(), &catalog, "agent-1").await.unwrap();

    let (mut subscriber, main_task, _refresh_task) =
        super::CatalogSubscriber::new(coordinator.clone(), catalog.clone(), String::from("agent-1"), 10);
    let main_handle = tokio::spawn(main_task);

    let mut sender = subscriber.get_subscriber_sender();
    sender.send(super::CatalogSubscriberRequest::Refresh()).await.unwrap();
    sender.send(super::CatalogSubscriberRequest::Refresh()).await.unwrap();
    drop(sender);

    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

    assert_eq!(3, register_requests.lock().await.len());
    assert_eq!(Some(String::from("id-1")), catalog.lock().await.groups()[0].functions()[0].id);
    main_handle.abort();
}
