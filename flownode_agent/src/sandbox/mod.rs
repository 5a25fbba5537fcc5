// SPDX-FileCopyrightText: © 2023 Technical University of Munich, Chair of Connected Mobility
// SPDX-FileCopyrightText: © 2023 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT
use futures::StreamExt;


/// Executes one dispatched invocation: fetches the run record, resolves the
/// inputs of a private copy of the function definition, then runs the
/// function body and the event-stream reader as two concurrent tasks joined
/// by a single-producer/single-consumer channel. The reader finishing is the
/// authoritative end of the invocation.
#[derive(Clone)]
pub struct ExecutionSandbox {
    coordinator: std::sync::Arc<dyn flownode_api::coordinator::CoordinatorAPI>,
    object_store: std::sync::Arc<dyn flownode_api::coordinator::ObjectStoreAPI>,
    catalog: std::sync::Arc<tokio::sync::Mutex<crate::catalog::FunctionCatalog>>,
}

impl ExecutionSandbox {
    pub fn new(
        coordinator: std::sync::Arc<dyn flownode_api::coordinator::CoordinatorAPI>,
        object_store: std::sync::Arc<dyn flownode_api::coordinator::ObjectStoreAPI>,
        catalog: std::sync::Arc<tokio::sync::Mutex<crate::catalog::FunctionCatalog>>,
    ) -> Self {
        Self {
            coordinator,
            object_store,
            catalog,
        }
    }

    pub async fn execute(&self, envelope: flownode_api::function_run::DispatchEnvelope) {
        let function_run_record_id = envelope.function_run_record_id.clone();
        if let Err(err) = self.execute_inner(envelope).await {
            log::error!("function run '{}' aborted: {}", function_run_record_id, err);
        }
    }

    async fn execute_inner(&self, envelope: flownode_api::function_run::DispatchEnvelope) -> anyhow::Result<()> {
        let record = self.coordinator.function_run_record(&envelope.function_run_record_id).await?;
        let report_ctx = flownode_api::function_run::RunReportContext {
            function_run_record_id: record.id.clone(),
            trace_id: record.trace_id.clone(),
            span_id: uuid::Uuid::new_v4().to_string(),
        };
        let run_logger = crate::reporter::FunctionRunLogger::new(&report_ctx);

        if record.canceled {
            run_logger.info("run record canceled before execution, skipping function body");
            return self
                .coordinator
                .report_function_run_finished(&report_ctx, flownode_api::function_run::FunctionRunOpt::canceled_opt())
                .await;
        }

        let mut function = match self.catalog.lock().await.clone_for_invocation(&record.function_id) {
            Some(function) => function,
            None => anyhow::bail!("no function registered for id '{}'", record.function_id),
        };
        run_logger.info(&format!("executing function '{}-{}'", function.group_name, function.name));

        self.resolve_ipt_values(&record, &mut function, &run_logger).await;

        let (event_sender, event_receiver) = flownode_api::function_run::run_event_channel();
        let sink = crate::reporter::RunEventSink::new(self.coordinator.clone(), self.object_store.clone(), report_ctx, run_logger);
        let reader_handle = tokio::spawn(sink.run(event_receiver));

        let exe_func = function.exe_func.clone();
        let ipts = function.ipts;
        let body_sender = event_sender.clone();
        let mut runner_handle = tokio::spawn(async move {
            exe_func.run(ipts, body_sender).await;
        });

        let mut event_sender = event_sender;
        let join_result = match Self::remaining_run_time(record.should_be_canceled_at) {
            Some(remaining) => match tokio::time::timeout(remaining, &mut runner_handle).await {
                Ok(join_result) => join_result,
                Err(_) => {
                    runner_handle.abort();
                    event_sender
                        .report_finished(flownode_api::function_run::FunctionRunOpt::timeout_canceled_opt())
                        .await;
                    Ok(())
                }
            },
            None => (&mut runner_handle).await,
        };
        if let Err(join_err) = join_result {
            if join_err.is_panic() {
                event_sender
                    .report_finished(flownode_api::function_run::FunctionRunOpt::fail_intercept_opt("function body panicked"))
                    .await;
            }
        }

        // close our producer end so the reader terminates even if the body
        // returned without a terminal result
        drop(event_sender);
        let _ = reader_handle.await;
        Ok(())
    }

    fn remaining_run_time(should_be_canceled_at: Option<chrono::DateTime<chrono::Utc>>) -> Option<std::time::Duration> {
        should_be_canceled_at.map(|deadline| (deadline - chrono::Utc::now()).to_std().unwrap_or(std::time::Duration::ZERO))
    }

    /// Fill the invocation's input components from the object store, typed by
    /// each component's declared value type. A failed fetch is logged and
    /// leaves the component unresolved.
    async fn resolve_ipt_values(
        &self,
        record: &flownode_api::function_run::FunctionRunRecord,
        function: &mut crate::catalog::FunctionDefinition,
        run_logger: &crate::reporter::FunctionRunLogger,
    ) {
        for (ipt_index, components) in record.ipt.iter().enumerate() {
            for (component_index, brief_and_key) in components.iter().enumerate() {
                let component = match function
                    .ipts
                    .get_mut(ipt_index)
                    .and_then(|ipt| ipt.components.get_mut(component_index))
                {
                    Some(component) => component,
                    None => {
                        run_logger.warning(&format!(
                            "run record carries input ({}, {}) unknown to function '{}'",
                            ipt_index, component_index, function.name
                        ));
                        continue;
                    }
                };
                if brief_and_key.object_storage_key.is_empty() {
                    continue;
                }
                match self
                    .object_store
                    .get(&brief_and_key.object_storage_key, component.value_type, component.allow_multi)
                    .await
                {
                    Ok(value) => component.value = Some(value),
                    Err(err) => run_logger.error(&format!(
                        "fetch input value failed, ipt_index: {}, component_index: {}, key: {}: {}",
                        ipt_index, component_index, brief_and_key.object_storage_key, err
                    )),
                }
            }
        }
    }
}

/// Local harness: run a function body against literal component values and
/// return its terminal result, without a coordinator or object store.
pub async fn test_run_function(
    exe_func: std::sync::Arc<dyn flownode_api::function::FunctionInterface>,
    ipt_component_values: Vec<Vec<serde_json::Value>>,
) -> flownode_api::function_run::FunctionRunOpt {
    let mut ipts = exe_func.ipt_config();
    for (ipt_index, component_values) in ipt_component_values.into_iter().enumerate() {
        for (component_index, value) in component_values.into_iter().enumerate() {
            if let Some(component) = ipts.get_mut(ipt_index).and_then(|ipt| ipt.components.get_mut(component_index)) {
                component.value = Some(value);
            }
        }
    }

    let (event_sender, mut event_receiver) = flownode_api::function_run::run_event_channel();
    let runner_handle = tokio::spawn(async move {
        exe_func.run(ipts, event_sender).await;
    });

    let mut finished = None;
    while let Some(event) = event_receiver.next().await {
        if let flownode_api::function_run::RunEvent::Finished(function_run_opt) = event {
            finished = Some(function_run_opt);
            break;
        }
    }
    let _ = runner_handle.await;
    finished.unwrap_or_else(|| flownode_api::function_run::FunctionRunOpt::fail_intercept_opt("function finished without reporting a result"))
}
