// SPDX-FileCopyrightText: © 2023 Technical University of Munich, Chair of Connected Mobility
// SPDX-FileCopyrightText: © 2023 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT
use futures::StreamExt;

#[cfg(test)]
pub mod test;

/// Structured logger bound to one invocation's trace/span/run ids.
#[derive(Clone)]
pub struct FunctionRunLogger {
    function_run_record_id: String,
    trace_id: String,
    span_id: String,
}

impl FunctionRunLogger {
    pub fn new(report_ctx: &flownode_api::function_run::RunReportContext) -> Self {
        Self {
            function_run_record_id: report_ctx.function_run_record_id.clone(),
            trace_id: report_ctx.trace_id.clone(),
            span_id: report_ctx.span_id.clone(),
        }
    }

    pub fn info(&self, msg: &str) {
        log::info!("[trace {} span {} run {}] {}", self.trace_id, self.span_id, self.function_run_record_id, msg);
    }

    pub fn warning(&self, msg: &str) {
        log::warn!("[trace {} span {} run {}] {}", self.trace_id, self.span_id, self.function_run_record_id, msg);
    }

    pub fn error(&self, msg: &str) {
        log::error!("[trace {} span {} run {}] {}", self.trace_id, self.span_id, self.function_run_record_id, msg);
    }

    pub fn append(&self, msg: &flownode_api::function_run::FunctionRunMsg) {
        match msg.level {
            flownode_api::function_run::LogLevel::Info => self.info(&msg.msg),
            flownode_api::function_run::LogLevel::Warning => self.warning(&msg.msg),
            flownode_api::function_run::LogLevel::Error => self.error(&msg.msg),
        }
    }
}

/// Consumes one invocation's event stream: logs are appended to the bound
/// logger, progress milestones are reported to the coordinator as they
/// occur, and the terminal result ends the loop after output persistence
/// and the completion report. The sink finishing is the authoritative end
/// of the invocation.
pub struct RunEventSink {
    coordinator: std::sync::Arc<dyn flownode_api::coordinator::CoordinatorAPI>,
    object_store: std::sync::Arc<dyn flownode_api::coordinator::ObjectStoreAPI>,
    report_ctx: flownode_api::function_run::RunReportContext,
    run_logger: FunctionRunLogger,
}

impl RunEventSink {
    pub fn new(
        coordinator: std::sync::Arc<dyn flownode_api::coordinator::CoordinatorAPI>,
        object_store: std::sync::Arc<dyn flownode_api::coordinator::ObjectStoreAPI>,
        report_ctx: flownode_api::function_run::RunReportContext,
        run_logger: FunctionRunLogger,
    ) -> Self {
        Self {
            coordinator,
            object_store,
            report_ctx,
            run_logger,
        }
    }

    pub async fn run(self, receiver: futures::channel::mpsc::UnboundedReceiver<flownode_api::function_run::RunEvent>) {
        let mut receiver = receiver;
        while let Some(event) = receiver.next().await {
            match event {
                flownode_api::function_run::RunEvent::Log(msg) => {
                    self.run_logger.append(&msg);
                }
                flownode_api::function_run::RunEvent::ProgressMilestone(milestone_index) => {
                    if let Err(err) = self.coordinator.report_progress_milestone(&self.report_ctx, milestone_index).await {
                        self.run_logger.error(&format!("report progress milestone {} failed: {}", milestone_index, err));
                    }
                }
                flownode_api::function_run::RunEvent::Finished(function_run_opt) => {
                    self.finish(function_run_opt).await;
                    break;
                }
            }
        }
    }

    /// Persist the outputs of a successful run one key at a time, recording
    /// brief and storage key on the result, then report completion. The
    /// report goes out regardless of the run's success flag.
    async fn finish(&self, function_run_opt: flownode_api::function_run::FunctionRunOpt) {
        let mut function_run_opt = function_run_opt;
        if function_run_opt.suc {
            let opt_values: Vec<(String, serde_json::Value)> = function_run_opt
                .opt_key_map_data
                .iter()
                .map(|(opt_key, value)| (opt_key.clone(), value.clone()))
                .collect();
            for (opt_key, value) in opt_values {
                match self.object_store.put(&self.report_ctx.function_run_record_id, &opt_key, &value).await {
                    Ok(persisted) => {
                        function_run_opt.opt_key_map_brief_data.insert(opt_key.clone(), persisted.brief);
                        function_run_opt.opt_key_map_object_storage_key.insert(opt_key, persisted.object_storage_key);
                    }
                    Err(err) => {
                        self.run_logger.error(&format!("persist output '{}' failed: {}", opt_key, err));
                    }
                }
            }
        }
        if let Err(err) = self.coordinator.report_function_run_finished(&self.report_ctx, function_run_opt).await {
            self.run_logger.error(&format!("report function run finished failed: {}", err));
        }
    }
}
