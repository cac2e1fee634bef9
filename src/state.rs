use std::sync::Arc;

use crate::db::{DbPool, OrmConn};
use crate::notify::NotificationSink;
use crate::payment::GatewayRegistry;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub gateways: Arc<GatewayRegistry>,
    pub notifier: NotificationSink,
}
