// SPDX-FileCopyrightText: © 2023 Technical University of Munich, Chair of Connected Mobility
// SPDX-FileCopyrightText: © 2023 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

#[cfg(test)]
pub mod test;

const EMPTY_QUEUE_POLL_INTERVAL: tokio::time::Duration = tokio::time::Duration::from_millis(100);
const POLL_ERROR_BACKOFF: tokio::time::Duration = tokio::time::Duration::from_secs(1);

/// Pulls dispatch messages from the agent's queue and hands each to an
/// execution sandbox through a bounded pool, so a slow function body never
/// stalls message intake.
pub struct Dispatcher {
    client_name: String,
    consumer: Box<dyn crate::queue::QueueConsumerAPI>,
    sandbox: crate::sandbox::ExecutionSandbox,
    concurrent_runs: std::sync::Arc<tokio::sync::Semaphore>,
}

impl Dispatcher {
    pub fn new(
        client_name: String,
        consumer: Box<dyn crate::queue::QueueConsumerAPI>,
        sandbox: crate::sandbox::ExecutionSandbox,
        max_concurrent_runs: usize,
    ) -> Self {
        Self {
            client_name,
            consumer,
            sandbox,
            concurrent_runs: std::sync::Arc::new(tokio::sync::Semaphore::new(max_concurrent_runs.max(1))),
        }
    }

    pub async fn run(mut self) {
        log::info!("starting function run consumer for '{}'", self.client_name);
        loop {
            let payload = match self.consumer.poll().await {
                Ok(Some(payload)) => payload,
                Ok(None) => {
                    tokio::time::sleep(EMPTY_QUEUE_POLL_INTERVAL).await;
                    continue;
                }
                Err(err) => {
                    log::error!("queue poll for '{}' failed: {}", self.client_name, err);
                    tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                    continue;
                }
            };

            let envelope: flownode_api::function_run::DispatchEnvelope = match serde_json::from_slice(&payload) {
                Ok(envelope) => envelope,
                Err(err) => {
                    log::error!("cannot decode dispatch message: {}", err);
                    continue;
                }
            };

            // the routing layer guarantees delivery by identity; a foreign
            // message is a broker bug, not a recoverable condition
            if envelope.client_name != self.client_name {
                log::error!(
                    "protocol violation: message for client '{}' routed to '{}', dropping run record '{}'",
                    envelope.client_name,
                    self.client_name,
                    envelope.function_run_record_id
                );
                continue;
            }

            let permit = match self.concurrent_runs.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let sandbox = self.sandbox.clone();
            tokio::spawn(async move {
                sandbox.execute(envelope).await;
                drop(permit);
            });
        }
    }
}
