//! Request dispatcher
//!
//! Walks a request tree depth-first. A node with a command is converted to an
//! [`Operation`] and executed by its family handler; a node without one is a
//! batch and each child is dispatched in order. Failures are written to the
//! session log and never stop the siblings that follow.

use crate::families::{self, Operation};
use crate::gateway::Gateways;
use crate::poller::FulfillmentPoller;
use crate::request::Request;
use crate::session::Session;
use futures::future::BoxFuture;
use futures::FutureExt;

#[derive(Clone)]
pub struct Dispatcher {
    gateways: Gateways,
    poller: FulfillmentPoller,
}

impl Dispatcher {
    pub fn new(gateways: Gateways, poller: FulfillmentPoller) -> Self {
        Self { gateways, poller }
    }

    pub fn gateways(&self) -> &Gateways {
        &self.gateways
    }

    /// Dispatch one node (and, for batches, its children)
    pub fn dispatch<'a>(
        &'a self,
        session: &'a mut Session,
        request: &'a Request,
    ) -> BoxFuture<'a, ()> {
        async move {
            if request.is_batch() {
                for child in &request.requests {
                    self.dispatch(session, child).await;
                }
                return;
            }

            let op = match Operation::from_request(request) {
                Ok(op) => op,
                Err(e) => {
                    tracing::warn!(command = %request.command, error = %e, "request rejected");
                    session.log(e.to_string());
                    return;
                }
            };
            tracing::debug!(command = %request.command, family = %op.family(), "dispatching");
            self.execute(session, op).await;
        }
        .boxed()
    }

    async fn execute(&self, session: &mut Session, op: Operation) {
        let g = &self.gateways;
        match op {
            Operation::Compute(op) => {
                families::compute::handle(session, &*g.compute, &self.poller, op).await
            }
            Operation::Tasks(op) => families::tasks::handle(session, &*g.tasks, op).await,
            Operation::Storage(op) => families::storage::handle(session, op).await,
            Operation::Functions(op) => {
                families::functions::handle(session, &*g.functions, op).await
            }
            Operation::Credentials(op) => {
                families::credentials::handle(session, &*g.credentials, op).await
            }
            Operation::Local(op) => families::local::handle(session, op).await,
        }
    }
}
