//! Post-transition notification seam.
//!
//! Stands in for the email/notification collaborator. Invoked after a
//! transition has committed; failures are logged by the caller and
//! never surface on the request path.

use async_trait::async_trait;

use errors::EntregaResult;

use crate::orders::Order;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn order_updated(&self, order: &Order) -> EntregaResult<()>;
}

/// Default notifier: a structured log line per committed transition.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn order_updated(&self, order: &Order) -> EntregaResult<()> {
        tracing::info!(
            target: "notify",
            order_id = %order.id,
            status = order.status.as_str(),
            city = %order.city,
            "order notification"
        );
        Ok(())
    }
}
