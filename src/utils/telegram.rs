use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::warn;

use crate::handlers::gateway::{ChatActivity, MessagingGateway};

const CHAT_ACTION_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(4);

/// Repeats a chat action until dropped.
pub struct ChatActionHeartbeat {
    task_handle: Option<JoinHandle<()>>,
}

impl Drop for ChatActionHeartbeat {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

pub fn start_chat_action_heartbeat(
    gateway: Arc<dyn MessagingGateway>,
    chat_id: i64,
    activity: ChatActivity,
) -> ChatActionHeartbeat {
    let task_handle = tokio::spawn(async move {
        loop {
            if let Err(err) = gateway.send_activity(chat_id, activity).await {
                warn!("send_chat_action failed: {err:#}");
            }
            tokio::time::sleep(CHAT_ACTION_HEARTBEAT_INTERVAL).await;
        }
    });

    ChatActionHeartbeat {
        task_handle: Some(task_handle),
    }
}
