// SPDX-FileCopyrightText: © 2023 Technical University of Munich, Chair of Connected Mobility
// SPDX-FileCopyrightText: © 2023 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT
/// HTTP implementation of the coordinator and object-store APIs. Every call
/// decodes the uniform response envelope and is retried a bounded number of
/// times with exponential backoff before the error reaches the caller.

const REGISTER_FUNCTIONS_PATH: &str = "register_functions";
const FUNCTION_RUN_RECORD_PATH: &str = "get_function_run_record_by_id";
const FUNCTION_RUN_FINISHED_PATH: &str = "function_run_finished";
const REPORT_PROGRESS_PATH: &str = "report_progress";
const OBJECT_GET_PATH: &str = "get_data_by_object_storage_key";
const OBJECT_PUT_PATH: &str = "persist_opt_data";

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(20);
const RETRY_BASE_DELAY: std::time::Duration = std::time::Duration::from_millis(500);
const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct PersistOptRequest {
    function_run_record_id: String,
    opt_key: String,
    data: serde_json::Value,
}

#[derive(Clone)]
pub struct CoordinatorAPIClient {
    client: reqwest::Client,
    base_url: String,
}

impl CoordinatorAPIClient {
    pub fn new(server_url: &str) -> anyhow::Result<Self> {
        anyhow::ensure!(!server_url.is_empty(), "coordinator address must not be empty");
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: Self::complete_url(server_url),
        })
    }

    fn complete_url(server_url: &str) -> String {
        let with_scheme = if server_url.starts_with("http") {
            server_url.to_string()
        } else {
            format!("http://{}", server_url)
        };
        with_scheme.trim_end_matches('/').to_string()
    }

    fn endpoint(&self, sub_path: &str) -> String {
        format!("{}{}{}", self.base_url, crate::common::SERVER_BASIC_PATH_PREFIX, sub_path)
    }

    /// Issue the request built by `build_request` until it yields a decodable
    /// envelope, retrying transport errors and 5xx replies with backoff.
    async fn send_with_retry<DataType: serde::de::DeserializeOwned>(
        &self,
        build_request: impl Fn() -> reqwest::RequestBuilder,
    ) -> anyhow::Result<crate::common::ServerResponse<DataType>> {
        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(RETRY_BASE_DELAY * 2u32.pow(attempt - 1)).await;
            }
            match build_request().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_server_error() {
                        last_err = Some(anyhow::anyhow!("request failed with HTTP status {}", status));
                        continue;
                    }
                    if !status.is_success() {
                        anyhow::bail!("request failed with HTTP status {}", status);
                    }
                    return response
                        .json::<crate::common::ServerResponse<DataType>>()
                        .await
                        .map_err(|err| anyhow::anyhow!("cannot decode server response: {}", err));
                }
                Err(err) => {
                    last_err = Some(err.into());
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("request failed after {} attempts", MAX_ATTEMPTS)))
    }
}

#[async_trait::async_trait]
impl crate::coordinator::CoordinatorAPI for CoordinatorAPIClient {
    async fn register_functions(
        &self,
        request: crate::function::RegisterFunctionsRequest,
    ) -> anyhow::Result<crate::function::RegisterFunctionsResponse> {
        let url = self.endpoint(REGISTER_FUNCTIONS_PATH);
        let response = self
            .send_with_retry::<crate::function::RegisterFunctionsResponse>(|| self.client.post(&url).json(&request))
            .await?;
        response.into_data()
    }

    async fn function_run_record(&self, function_run_record_id: &str) -> anyhow::Result<crate::function_run::FunctionRunRecord> {
        let url = format!("{}/{}", self.endpoint(FUNCTION_RUN_RECORD_PATH), function_run_record_id);
        let response = self
            .send_with_retry::<crate::function_run::FunctionRunRecord>(|| self.client.get(&url))
            .await?;
        response.into_data()
    }

    async fn report_progress_milestone(
        &self,
        report_ctx: &crate::function_run::RunReportContext,
        progress_milestone_index: usize,
    ) -> anyhow::Result<()> {
        let url = self.endpoint(REPORT_PROGRESS_PATH);
        let request = crate::function_run::ProgressReportRequest {
            function_run_record_id: report_ctx.function_run_record_id.clone(),
            trace_id: report_ctx.trace_id.clone(),
            span_id: report_ctx.span_id.clone(),
            progress_milestone_index,
        };
        let response = self
            .send_with_retry::<serde_json::Value>(|| self.client.post(&url).json(&request))
            .await?;
        response.into_ack()
    }

    async fn report_function_run_finished(
        &self,
        report_ctx: &crate::function_run::RunReportContext,
        function_run_opt: crate::function_run::FunctionRunOpt,
    ) -> anyhow::Result<()> {
        let url = self.endpoint(FUNCTION_RUN_FINISHED_PATH);
        let request = crate::function_run::FunctionRunFinishedRequest {
            function_run_record_id: report_ctx.function_run_record_id.clone(),
            trace_id: report_ctx.trace_id.clone(),
            span_id: report_ctx.span_id.clone(),
            function_run_opt,
        };
        let response = self
            .send_with_retry::<serde_json::Value>(|| self.client.post(&url).json(&request))
            .await?;
        response.into_ack()
    }
}

#[async_trait::async_trait]
impl crate::coordinator::ObjectStoreAPI for CoordinatorAPIClient {
    async fn get(
        &self,
        object_storage_key: &str,
        expected_type: crate::function::ValueType,
        allow_multi: bool,
    ) -> anyhow::Result<serde_json::Value> {
        let url = format!("{}/{}", self.endpoint(OBJECT_GET_PATH), object_storage_key);
        let response = self.send_with_retry::<serde_json::Value>(|| self.client.get(&url)).await?;
        let value = response.into_data()?;
        let conforms = if allow_multi {
            match value.as_array() {
                Some(elements) => elements.iter().all(|element| expected_type.conforms(element)),
                None => false,
            }
        } else {
            expected_type.conforms(&value)
        };
        anyhow::ensure!(
            conforms,
            "object storage value for key '{}' does not match expected type {:?} (allow_multi: {})",
            object_storage_key,
            expected_type,
            allow_multi
        );
        Ok(value)
    }

    async fn put(&self, function_run_record_id: &str, opt_key: &str, value: &serde_json::Value) -> anyhow::Result<crate::coordinator::PersistedOpt> {
        let url = self.endpoint(OBJECT_PUT_PATH);
        let request = PersistOptRequest {
            function_run_record_id: function_run_record_id.to_string(),
            opt_key: opt_key.to_string(),
            data: value.clone(),
        };
        let response = self
            .send_with_retry::<crate::coordinator::PersistedOpt>(|| self.client.post(&url).json(&request))
            .await?;
        response.into_data()
    }
}
