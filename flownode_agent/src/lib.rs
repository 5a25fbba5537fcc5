// SPDX-FileCopyrightText: © 2023 Technical University of Munich, Chair of Connected Mobility
// SPDX-FileCopyrightText: © 2023 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

pub mod catalog;
pub mod dispatcher;
pub mod queue;
pub mod reporter;
pub mod sandbox;
pub mod subscriber;

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct AgentSettings {
    /// Identity of this agent: seeds the queue name, the registration "who"
    /// field and the validation of inbound envelopes.
    pub name: String,
    pub coordinator_url: String,
    pub broker_url: String,
    #[serde(default = "default_heartbeat_interval_sec")]
    pub heartbeat_interval_sec: u64,
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,
}

fn default_heartbeat_interval_sec() -> u64 {
    10
}

fn default_max_concurrent_runs() -> usize {
    2
}

/// A worker agent: a function catalog plus the connections needed to
/// register it, receive run triggers and report outcomes.
pub struct Agent {
    settings: AgentSettings,
    catalog: catalog::FunctionCatalog,
}

impl Agent {
    pub fn new(settings: AgentSettings) -> Self {
        Self {
            settings,
            catalog: catalog::FunctionCatalog::new(),
        }
    }

    pub fn register_function_group(&mut self, group_name: &str) -> anyhow::Result<&mut catalog::FunctionGroup> {
        self.catalog.register_function_group(group_name)
    }

    /// Register the catalog and serve run triggers until the process stops.
    pub async fn run(self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.settings.name.is_empty(), "agent name must not be empty");
        anyhow::ensure!(!self.settings.coordinator_url.is_empty(), "coordinator address must be configured");
        anyhow::ensure!(!self.settings.broker_url.is_empty(), "broker address must be configured");

        let http_client = flownode_api::http_impl::CoordinatorAPIClient::new(&self.settings.coordinator_url)?;
        let coordinator: std::sync::Arc<dyn flownode_api::coordinator::CoordinatorAPI> = std::sync::Arc::new(http_client.clone());
        let object_store: std::sync::Arc<dyn flownode_api::coordinator::ObjectStoreAPI> = std::sync::Arc::new(http_client);
        let message_queue = queue::RedisMessageQueue::new(&self.settings.broker_url)?;
        self.run_with(coordinator, object_store, Box::new(message_queue)).await
    }

    /// Same as `run` with the external collaborators supplied by the caller.
    pub async fn run_with(
        self,
        coordinator: std::sync::Arc<dyn flownode_api::coordinator::CoordinatorAPI>,
        object_store: std::sync::Arc<dyn flownode_api::coordinator::ObjectStoreAPI>,
        message_queue: Box<dyn queue::MessageQueueAPI>,
    ) -> anyhow::Result<()> {
        log::info!("starting flownode agent '{}'", self.settings.name);
        let catalog = std::sync::Arc::new(tokio::sync::Mutex::new(self.catalog));

        // a catalog the coordinator cannot route to is unusable: abort
        // before consuming anything
        subscriber::register_catalog(coordinator.as_ref(), &catalog, &self.settings.name)
            .await
            .map_err(|err| anyhow::anyhow!("initial function registration failed: {}", err))?;
        log::info!("registered function catalog for '{}'", self.settings.name);

        let (_catalog_subscriber, subscriber_task, refresh_task) = subscriber::CatalogSubscriber::new(
            coordinator.clone(),
            catalog.clone(),
            self.settings.name.clone(),
            self.settings.heartbeat_interval_sec,
        );

        let consumer = message_queue.bind_queue(&queue::run_consumer_queue_name(&self.settings.name)).await?;
        let sandbox = sandbox::ExecutionSandbox::new(coordinator, object_store, catalog);
        let dispatcher = dispatcher::Dispatcher::new(self.settings.name.clone(), consumer, sandbox, self.settings.max_concurrent_runs);

        futures::join!(subscriber_task, refresh_task, dispatcher.run());
        Ok(())
    }
}

pub fn flownode_agent_default_conf() -> String {
    String::from(
        r##"name = "tryout-rust"
coordinator_url = "http://127.0.0.1:8080"
broker_url = "redis://127.0.0.1:6379"
heartbeat_interval_sec = 10
max_concurrent_runs = 2
"##,
    )
}
