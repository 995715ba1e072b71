use std::sync::Arc;

use tokio::sync::mpsc;

use crate::audit::{AuditSink, TracingAuditSink};
use crate::config::Config;
use crate::directory::{IdentityDirectory, InMemoryDirectory};
use crate::engine::dispatcher::CommittedMutation;
use crate::engine::otp::{OtpIssuer, RandomOtpIssuer};
use crate::engine::scoping::PageLimits;
use crate::events::EventBus;
use crate::observability::metrics::Metrics;
use crate::realtime::Gateway;
use crate::store::{InMemoryOrderStore, OrderStore};

/// External collaborators the core talks to.
pub struct Collaborators {
    pub orders: Arc<dyn OrderStore>,
    pub directory: Arc<dyn IdentityDirectory>,
    pub audit: Arc<dyn AuditSink>,
    pub otp: Arc<dyn OtpIssuer>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            orders: Arc::new(InMemoryOrderStore::new()),
            directory: Arc::new(InMemoryDirectory::new()),
            audit: Arc::new(TracingAuditSink),
            otp: Arc::new(RandomOtpIssuer),
        }
    }
}

pub struct AppState {
    pub orders: Arc<dyn OrderStore>,
    pub directory: Arc<dyn IdentityDirectory>,
    pub audit: Arc<dyn AuditSink>,
    pub otp: Arc<dyn OtpIssuer>,
    pub bus: EventBus,
    pub gateway: Gateway,
    pub side_effect_tx: mpsc::Sender<CommittedMutation>,
    pub paging: PageLimits,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        config: &Config,
        collaborators: Collaborators,
    ) -> (Self, mpsc::Receiver<CommittedMutation>) {
        let (side_effect_tx, side_effect_rx) = mpsc::channel(config.side_effect_queue_size.max(1));
        let metrics = Metrics::new();
        let gateway = Gateway::new(
            config.realtime_scope,
            config.session_buffer_size,
            metrics.realtime_sessions.clone(),
        );

        (
            Self {
                orders: collaborators.orders,
                directory: collaborators.directory,
                audit: collaborators.audit,
                otp: collaborators.otp,
                bus: EventBus::new(config.event_buffer_size),
                gateway,
                side_effect_tx,
                paging: PageLimits {
                    default_size: config.default_page_size,
                    max_size: config.max_page_size,
                },
                metrics,
            },
            side_effect_rx,
        )
    }
}
