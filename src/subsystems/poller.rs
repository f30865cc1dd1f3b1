use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use bon::Builder;
use tokio_graceful_shutdown::errors::CancelledByShutdown;
use tokio_graceful_shutdown::{FutureExt, SubsystemHandle};
use tracing::{error, info, warn};

use crate::models::errors::TransportError;
use crate::services::pipeline::Pipeline;
use crate::traits::chat_transport::ChatTransport;

/// Единственный цикл опроса: каждое сообщение обрабатывается до конца перед следующим запросом
#[derive(Builder)]
pub struct PollerSubsystem {
    pub(crate) transport: Arc<dyn ChatTransport>,
    pub(crate) pipeline: Arc<Pipeline>,
    #[builder(default = 30)]
    pub(crate) poll_timeout_secs: u64,
    #[builder(default = Duration::from_secs(1))]
    pub(crate) error_delay: Duration,
}

impl PollerSubsystem {
    pub async fn run(self, subsys: SubsystemHandle) -> std::io::Result<()> {
        info!("Starting poller subsystem");

        let fut = async {
            let mut offset = 0;
            while !subsys.is_shutdown_requested() {
                offset = self.poll_once(offset).await;
            }
        };

        match fut.cancel_on_shutdown(&subsys).await {
            Ok(()) => info!("Poller subsystem finished"),
            Err(CancelledByShutdown) => info!("Poller subsystem cancelled by shutdown"),
        }
        Ok(())
    }

    /// Один запрос обновлений; возвращает смещение для следующего запроса.
    ///
    /// A failed poll never stops the loop: after the retry budget is spent the
    /// same offset is returned and polling resumes.
    pub async fn poll_once(&self, offset: i64) -> i64 {
        let transport = &self.transport;
        let timeout = self.poll_timeout_secs;
        let res = (|| async move { transport.get_updates(offset, timeout).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(self.error_delay)
                    .with_max_delay(Duration::from_secs(30))
                    .with_max_times(5),
            )
            .sleep(tokio::time::sleep)
            .notify(|err: &TransportError, dur: Duration| {
                warn!(error = %err, retry_in = ?dur, "poller: getUpdates failed");
            })
            .await;

        match res {
            Ok((messages, next)) => {
                for msg in &messages {
                    self.pipeline.handle_message(msg).await;
                }
                next
            }
            Err(e) => {
                error!(error = %e, "poller: getUpdates keeps failing");
                offset
            }
        }
    }
}
