// SPDX-FileCopyrightText: © 2023 Technical University of Munich, Chair of Connected Mobility
// SPDX-FileCopyrightText: © 2023 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT
/// Opaque binding to the message broker. The agent only needs a durable,
/// named queue it can poll without blocking; the broker's wire protocol and
/// delivery guarantees live behind these traits.

const RUN_CONSUMER_QUEUE_PREFIX: &str = "function_client_run_consumer";

/// Name of the queue routing run-trigger messages to the given agent.
pub fn run_consumer_queue_name(client_name: &str) -> String {
    format!("{}.{}", RUN_CONSUMER_QUEUE_PREFIX, client_name)
}

#[async_trait::async_trait]
pub trait MessageQueueAPI: Send + Sync {
    async fn bind_queue(&self, queue_name: &str) -> anyhow::Result<Box<dyn QueueConsumerAPI>>;
    async fn publish(&self, queue_name: &str, payload: Vec<u8>) -> anyhow::Result<()>;
}

#[async_trait::async_trait]
pub trait QueueConsumerAPI: Send {
    /// Take one message if available. The message is acknowledged at
    /// receipt: a returned payload will not be redelivered.
    async fn poll(&mut self) -> anyhow::Result<Option<Vec<u8>>>;
}

pub struct RedisMessageQueue {
    client: redis::Client,
}

impl RedisMessageQueue {
    pub fn new(redis_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
        })
    }
}

#[async_trait::async_trait]
impl MessageQueueAPI for RedisMessageQueue {
    async fn bind_queue(&self, queue_name: &str) -> anyhow::Result<Box<dyn QueueConsumerAPI>> {
        let connection = self.client.get_multiplexed_async_connection().await?;
        log::info!("bound queue '{}'", queue_name);
        Ok(Box::new(RedisQueueConsumer {
            connection,
            queue_name: queue_name.to_string(),
        }))
    }

    async fn publish(&self, queue_name: &str, payload: Vec<u8>) -> anyhow::Result<()> {
        let mut connection = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("LPUSH").arg(queue_name).arg(payload).query_async::<_, ()>(&mut connection).await?;
        Ok(())
    }
}

struct RedisQueueConsumer {
    connection: redis::aio::MultiplexedConnection,
    queue_name: String,
}

#[async_trait::async_trait]
impl QueueConsumerAPI for RedisQueueConsumer {
    async fn poll(&mut self) -> anyhow::Result<Option<Vec<u8>>> {
        let payload: Option<Vec<u8>> = redis::cmd("RPOP").arg(&self.queue_name).query_async(&mut self.connection).await?;
        Ok(payload)
    }
}

/// Broker stand-in used by tests.
#[derive(Clone, Default)]
pub struct InMemoryMessageQueue {
    queues: std::sync::Arc<tokio::sync::Mutex<std::collections::HashMap<String, std::collections::VecDeque<Vec<u8>>>>>,
}

impl InMemoryMessageQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl MessageQueueAPI for InMemoryMessageQueue {
    async fn bind_queue(&self, queue_name: &str) -> anyhow::Result<Box<dyn QueueConsumerAPI>> {
        self.queues.lock().await.entry(queue_name.to_string()).or_default();
        Ok(Box::new(InMemoryQueueConsumer {
            queues: self.queues.clone(),
            queue_name: queue_name.to_string(),
        }))
    }

    async fn publish(&self, queue_name: &str, payload: Vec<u8>) -> anyhow::Result<()> {
        self.queues.lock().await.entry(queue_name.to_string()).or_default().push_back(payload);
        Ok(())
    }
}

struct InMemoryQueueConsumer {
    queues: std::sync::Arc<tokio::sync::Mutex<std::collections::HashMap<String, std::collections::VecDeque<Vec<u8>>>>>,
    queue_name: String,
}

#[async_trait::async_trait]
impl QueueConsumerAPI for InMemoryQueueConsumer {
    async fn poll(&mut self) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.queues.lock().await.get_mut(&self.queue_name).and_then(|queue| queue.pop_front()))
    }
}
