// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT
use futures::{Future, SinkExt, StreamExt};

#[cfg(test)]
pub mod test;

/// Register the catalog snapshot with the coordinator and bind the returned
/// server-assigned ids onto the local definitions.
pub async fn register_catalog(
    coordinator: &dyn flownode_api::coordinator::CoordinatorAPI,
    catalog: &tokio::sync::Mutex<crate::catalog::FunctionCatalog>,
    who: &str,
) -> anyhow::Result<()> {
    let request = catalog.lock().await.to_register_request(who);
    let response = coordinator.register_functions(request).await?;
    catalog.lock().await.bind_server_ids(&response)
}

#[derive(Clone)]
pub struct CatalogSubscriber {
    sender: futures::channel::mpsc::UnboundedSender<CatalogSubscriberRequest>,
}

#[derive(Clone)]
pub enum CatalogSubscriberRequest {
    Refresh(),
}

/// Repeats the catalog registration on a fixed interval for the agent's
/// lifetime. Failures on these heartbeat ticks are logged and retried on the
/// next tick; the agent keeps its queue subscription.
impl CatalogSubscriber {
    pub fn new(
        coordinator: std::sync::Arc<dyn flownode_api::coordinator::CoordinatorAPI>,
        catalog: std::sync::Arc<tokio::sync::Mutex<crate::catalog::FunctionCatalog>>,
        who: String,
        refresh_interval_sec: u64,
    ) -> (
        Self,
        std::pin::Pin<Box<dyn Future<Output = ()> + Send>>,
        std::pin::Pin<Box<dyn Future<Output = ()> + Send>>,
    ) {
        let (sender, receiver) = futures::channel::mpsc::unbounded();
        let sender_cloned = sender.clone();

        let main_task = Box::pin(async move {
            Self::main_task(coordinator, catalog, who, receiver).await;
        });

        let refresh_task = Box::pin(async move {
            Self::refresh_task(sender_cloned, refresh_interval_sec).await;
        });

        (Self { sender }, main_task, refresh_task)
    }

    async fn refresh_task(sender: futures::channel::mpsc::UnboundedSender<CatalogSubscriberRequest>, refresh_interval_sec: u64) {
        let mut sender = sender;
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(refresh_interval_sec));
        // the immediate first tick is redundant with the startup registration
        interval.tick().await;
        loop {
            interval.tick().await;
            let _ = sender.send(CatalogSubscriberRequest::Refresh()).await;
        }
    }

    async fn main_task(
        coordinator: std::sync::Arc<dyn flownode_api::coordinator::CoordinatorAPI>,
        catalog: std::sync::Arc<tokio::sync::Mutex<crate::catalog::FunctionCatalog>>,
        who: String,
        receiver: futures::channel::mpsc::UnboundedReceiver<CatalogSubscriberRequest>,
    ) {
        let mut receiver = receiver;
        while let Some(req) = receiver.next().await {
            match req {
                CatalogSubscriberRequest::Refresh() => {
                    log::debug!("catalog registration refresh for '{}'", who);
                    if let Err(err) = register_catalog(coordinator.as_ref(), &catalog, &who).await {
                        log::error!("heartbeat registration of '{}' failed: {}", who, err);
                    }
                }
            }
        }
    }

    pub fn get_subscriber_sender(&mut self) -> futures::channel::mpsc::UnboundedSender<CatalogSubscriberRequest> {
        self.sender.clone()
    }
}
