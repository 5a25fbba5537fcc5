// SPDX-FileCopyrightText: © 2023 Technical University of Munich, Chair of Connected Mobility
// SPDX-FileCopyrightText: © 2023 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

/// Summary and storage key returned for one persisted output value.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PersistedOpt {
    pub brief: String,
    pub object_storage_key: String,
}

/// Request/response calls towards the coordinator.
#[async_trait::async_trait]
pub trait CoordinatorAPI: Send + Sync {
    /// Publish the agent's function catalog; the response carries a
    /// server-assigned id for every accepted function.
    async fn register_functions(
        &self,
        request: crate::function::RegisterFunctionsRequest,
    ) -> anyhow::Result<crate::function::RegisterFunctionsResponse>;

    async fn function_run_record(&self, function_run_record_id: &str) -> anyhow::Result<crate::function_run::FunctionRunRecord>;

    async fn report_progress_milestone(
        &self,
        report_ctx: &crate::function_run::RunReportContext,
        progress_milestone_index: usize,
    ) -> anyhow::Result<()>;

    async fn report_function_run_finished(
        &self,
        report_ctx: &crate::function_run::RunReportContext,
        function_run_opt: crate::function_run::FunctionRunOpt,
    ) -> anyhow::Result<()>;
}

/// Get/put-by-key access to the content-addressed object store.
#[async_trait::async_trait]
pub trait ObjectStoreAPI: Send + Sync {
    /// Fetch a stored value, validated against the declared type of the
    /// component requesting it.
    async fn get(
        &self,
        object_storage_key: &str,
        expected_type: crate::function::ValueType,
        allow_multi: bool,
    ) -> anyhow::Result<serde_json::Value>;

    /// Persist one output value of a run; returns its brief and storage key.
    async fn put(&self, function_run_record_id: &str, opt_key: &str, value: &serde_json::Value) -> anyhow::Result<PersistedOpt>;
}
