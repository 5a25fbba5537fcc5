// SPDX-FileCopyrightText: © 2023 Technical University of Munich, Chair of Connected Mobility
// SPDX-FileCopyrightText: © 2023 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT
use futures::SinkExt;

/// Message delivered through the broker to trigger one function run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DispatchEnvelope {
    #[serde(rename = "ClientName")]
    pub client_name: String,
    #[serde(rename = "FunctionRunRecordID")]
    pub function_run_record_id: String,
}

/// Reference to one stored input value: a short human-readable summary plus
/// the object-store key holding the full content.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BriefAndKey {
    #[serde(default)]
    pub brief: String,
    #[serde(default)]
    pub object_storage_key: String,
}

/// Coordinator-held description of one triggered invocation. Fetched
/// read-only by the agent at execution time.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FunctionRunRecord {
    pub id: String,
    #[serde(default)]
    pub flow_id: String,
    pub function_id: String,
    #[serde(default, rename = "flow_function_id")]
    pub flow_run_record_id: String,
    #[serde(default)]
    pub trace_id: String,
    #[serde(default)]
    pub canceled: bool,
    #[serde(default)]
    pub ipt: Vec<Vec<BriefAndKey>>,
    #[serde(default)]
    pub should_be_canceled_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Outcome of one invocation, produced by the function body. The brief and
/// object-store key maps are filled in by the reporter after persisting the
/// output values.
///
/// `suc` and `intercept_below_function_run` are independent: a failed run
/// may still let the surrounding flow continue.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FunctionRunOpt {
    pub suc: bool,
    #[serde(default)]
    pub canceled: bool,
    #[serde(default)]
    pub timeout_canceled: bool,
    #[serde(default)]
    pub intercept_below_function_run: bool,
    #[serde(default)]
    pub error_msg: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "optKey_map_data")]
    pub opt_key_map_data: std::collections::HashMap<String, serde_json::Value>,
    #[serde(default, rename = "optKey_map_briefData")]
    pub opt_key_map_brief_data: std::collections::HashMap<String, String>,
    #[serde(default, rename = "optKey_map_objectStorageKey")]
    pub opt_key_map_object_storage_key: std::collections::HashMap<String, String>,
}

impl FunctionRunOpt {
    pub fn suc_opt(description: &str, opt_key_map_data: std::collections::HashMap<String, serde_json::Value>) -> Self {
        Self {
            suc: true,
            description: description.to_string(),
            opt_key_map_data,
            ..Default::default()
        }
    }

    /// Failed run that does not stop downstream steps of the flow.
    pub fn fail_opt(error_msg: &str) -> Self {
        Self {
            suc: false,
            error_msg: error_msg.to_string(),
            ..Default::default()
        }
    }

    /// Failed run that stops downstream steps of the flow.
    pub fn fail_intercept_opt(error_msg: &str) -> Self {
        Self {
            suc: false,
            intercept_below_function_run: true,
            error_msg: error_msg.to_string(),
            ..Default::default()
        }
    }

    pub fn canceled_opt() -> Self {
        Self {
            suc: false,
            canceled: true,
            description: String::from("run record was canceled before execution"),
            ..Default::default()
        }
    }

    pub fn timeout_canceled_opt() -> Self {
        Self {
            suc: false,
            timeout_canceled: true,
            error_msg: String::from("canceled due to elapsed deadline"),
            ..Default::default()
        }
    }
}

/// Identifiers tagging all log/progress/completion traffic of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RunReportContext {
    pub function_run_record_id: String,
    pub trace_id: String,
    pub span_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FunctionRunMsg {
    pub level: LogLevel,
    pub msg: String,
}

/// One item in the execution event stream, consumed exactly once by the
/// reporter. `Finished` is terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Log(FunctionRunMsg),
    ProgressMilestone(usize),
    Finished(FunctionRunOpt),
}

/// Producer end of the event stream handed to a function body.
#[derive(Clone)]
pub struct RunEventSender {
    sender: futures::channel::mpsc::UnboundedSender<RunEvent>,
}

pub fn run_event_channel() -> (RunEventSender, futures::channel::mpsc::UnboundedReceiver<RunEvent>) {
    let (sender, receiver) = futures::channel::mpsc::unbounded();
    (RunEventSender { sender }, receiver)
}

impl RunEventSender {
    pub async fn report_log(&mut self, level: LogLevel, msg: &str) {
        let _ = self
            .sender
            .send(RunEvent::Log(FunctionRunMsg {
                level,
                msg: msg.to_string(),
            }))
            .await;
    }

    pub async fn report_progress_milestone(&mut self, milestone_index: usize) {
        let _ = self.sender.send(RunEvent::ProgressMilestone(milestone_index)).await;
    }

    pub async fn report_finished(&mut self, function_run_opt: FunctionRunOpt) {
        let _ = self.sender.send(RunEvent::Finished(function_run_opt)).await;
    }
}

/// Body of the completion report sent to the coordinator.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FunctionRunFinishedRequest {
    pub function_run_record_id: String,
    pub trace_id: String,
    pub span_id: String,
    #[serde(flatten)]
    pub function_run_opt: FunctionRunOpt,
}

/// Body of the live progress report sent to the coordinator.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProgressReportRequest {
    pub function_run_record_id: String,
    pub trace_id: String,
    pub span_id: String,
    pub progress_milestone_index: usize,
}
