use rust_decimal::Decimal;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Customer-facing events emitted after a business operation commits. The
/// actual delivery channel (email, push) is an external collaborator; this
/// sink only decouples emission from the transaction that produced the event.
#[derive(Debug, Clone)]
pub enum Notification {
    OrderConfirmed {
        order_id: Uuid,
        user_id: Uuid,
        total_amount: Decimal,
    },
    PaymentReceived {
        order_id: Uuid,
        transaction_id: String,
    },
    StatusChanged {
        order_id: Uuid,
        status: String,
    },
}

/// Fire-and-forget sink: `emit` never fails the caller. A full or closed
/// channel is logged and the event dropped, per the reconciliation contract
/// that a notification outage must not roll back a paid order.
#[derive(Clone)]
pub struct NotificationSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl NotificationSink {
    /// Spawn the consumer task and hand back the sender half.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                deliver(&event);
            }
            tracing::debug!("notification sink drained");
        });
        Self { tx }
    }

    pub fn emit(&self, event: Notification) {
        if let Err(err) = self.tx.send(event) {
            tracing::warn!(error = %err, "notification dropped: sink closed");
        }
    }
}

// Email delivery is disabled in this deployment; events are traced so the
// pipeline stays observable end to end.
fn deliver(event: &Notification) {
    match event {
        Notification::OrderConfirmed {
            order_id,
            user_id,
            total_amount,
        } => {
            tracing::info!(%order_id, %user_id, %total_amount, "notify: order confirmed");
        }
        Notification::PaymentReceived {
            order_id,
            transaction_id,
        } => {
            tracing::info!(%order_id, %transaction_id, "notify: payment received");
        }
        Notification::StatusChanged { order_id, status } => {
            tracing::info!(%order_id, %status, "notify: order status changed");
        }
    }
}
