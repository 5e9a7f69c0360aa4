//! Turn processing. Each user gets a dedicated worker task fed by a
//! channel, so one user's messages are handled strictly in arrival order
//! while different users proceed concurrently. The rate limit is enforced
//! before a turn is queued.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use mercabot_agent::{ConversationContext, PacingPolicy, PolicyEngine, TurnInput};
use mercabot_channel::MessagingChannel;
use mercabot_core::{Direction, Message, UserId};
use mercabot_db::repositories::ConversationRepository;
use mercabot_db::CatalogCache;

use crate::leads::LeadCaptureService;
use crate::rate_limit::RateLimiter;

const WORKER_QUEUE_DEPTH: usize = 32;
const WORKER_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// One inbound customer turn, end to end: persist, decide, pace, reply.
/// Every collaborator failure degrades instead of aborting; the worst case
/// is a reply decided from an empty context.
pub struct TurnPipeline {
    conversations: Arc<dyn ConversationRepository>,
    catalog: Arc<CatalogCache>,
    engine: PolicyEngine,
    pacing: PacingPolicy,
    history_window: u32,
    leads: Arc<LeadCaptureService>,
    messenger: Arc<dyn MessagingChannel>,
}

impl TurnPipeline {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        catalog: Arc<CatalogCache>,
        engine: PolicyEngine,
        pacing: PacingPolicy,
        history_window: u32,
        leads: Arc<LeadCaptureService>,
        messenger: Arc<dyn MessagingChannel>,
    ) -> Self {
        Self { conversations, catalog, engine, pacing, history_window, leads, messenger }
    }

    pub async fn handle(&self, user_id: UserId, text: String) {
        let window = match self.conversations.fetch_recent(&user_id, self.history_window).await {
            Ok(window) => window,
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "history fetch failed; using empty context");
                Vec::new()
            }
        };

        if let Err(err) = self
            .conversations
            .append(Message {
                user_id: user_id.clone(),
                text: text.clone(),
                direction: Direction::Inbound,
                timestamp: Utc::now(),
            })
            .await
        {
            warn!(user_id = %user_id, error = %err, "inbound append failed; turn continues");
        }

        let catalog = match self.catalog.sellable().await {
            Ok(catalog) => catalog,
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "catalog read failed; using empty catalog");
                Arc::new(Vec::new())
            }
        };

        let context = ConversationContext::resolve(&window, catalog.as_slice());
        let input = TurnInput { text: &text, window: &window, catalog: catalog.as_slice() };
        let decision = self.engine.decide(&input, &context);
        info!(user_id = %user_id, intent = ?decision.intent, "turn decided");

        if let Some(captured) = decision.captured {
            self.leads.capture(&user_id, captured).await;
        }

        let prior_outbound = match self.conversations.count_outbound(&user_id).await {
            Ok(count) => count,
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "outbound count failed; skipping pacing");
                0
            }
        };
        if let Some(delay) = self.pacing.delay_for(prior_outbound) {
            debug!(user_id = %user_id, delay_ms = delay.as_millis() as u64, "pacing reply");
            tokio::time::sleep(delay).await;
        }

        if self.messenger.is_enabled() {
            if let Err(err) = self.messenger.send_typing_indicator(&user_id.0).await {
                debug!(user_id = %user_id, error = %err, "typing indicator failed");
            }
            if let Err(err) = self.messenger.send_text(&user_id.0, &decision.reply).await {
                warn!(user_id = %user_id, error = %err, "reply delivery failed");
            }
        } else {
            debug!(user_id = %user_id, "messenger disabled; reply not delivered");
        }

        if let Err(err) = self
            .conversations
            .append(Message {
                user_id: user_id.clone(),
                text: decision.reply,
                direction: Direction::Outbound,
                timestamp: Utc::now(),
            })
            .await
        {
            warn!(user_id = %user_id, error = %err, "outbound append failed");
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    RateLimited,
}

/// Routes turns onto per-user worker tasks. Workers are spawned lazily,
/// deregister themselves after sitting idle, and the bounded queue applies
/// backpressure to a single user without stalling others.
pub struct UserDispatcher {
    pipeline: Arc<TurnPipeline>,
    rate_limiter: RateLimiter,
    idle_timeout: Duration,
    workers: Arc<Mutex<HashMap<String, mpsc::Sender<String>>>>,
}

impl UserDispatcher {
    pub fn new(pipeline: Arc<TurnPipeline>, rate_limiter: RateLimiter) -> Self {
        Self::with_idle_timeout(pipeline, rate_limiter, WORKER_IDLE_TIMEOUT)
    }

    pub fn with_idle_timeout(
        pipeline: Arc<TurnPipeline>,
        rate_limiter: RateLimiter,
        idle_timeout: Duration,
    ) -> Self {
        Self { pipeline, rate_limiter, idle_timeout, workers: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub async fn submit(&self, user_id: UserId, text: String) -> SubmitOutcome {
        if !self.rate_limiter.allow(&user_id.0).await {
            warn!(user_id = %user_id, "rate limit exceeded; message dropped");
            return SubmitOutcome::RateLimited;
        }

        let sender = self.worker_for(&user_id).await;
        if let Err(returned) = sender.send(text).await {
            // worker died; replace it and retry once
            let mut workers = self.workers.lock().await;
            workers.remove(&user_id.0);
            drop(workers);
            let sender = self.worker_for(&user_id).await;
            if sender.send(returned.0).await.is_err() {
                warn!(user_id = %user_id, "worker unavailable; message dropped");
            }
        }
        SubmitOutcome::Accepted
    }

    async fn worker_for(&self, user_id: &UserId) -> mpsc::Sender<String> {
        let mut workers = self.workers.lock().await;
        if let Some(sender) = workers.get(&user_id.0) {
            return sender.clone();
        }

        let (sender, mut receiver) = mpsc::channel::<String>(WORKER_QUEUE_DEPTH);
        let pipeline = Arc::clone(&self.pipeline);
        let registry = Arc::clone(&self.workers);
        let worker_user = user_id.clone();
        let worker_sender = sender.clone();
        let idle_timeout = self.idle_timeout;
        tokio::spawn(async move {
            loop {
                match tokio::time::timeout(idle_timeout, receiver.recv()).await {
                    Ok(Some(text)) => pipeline.handle(worker_user.clone(), text).await,
                    Ok(None) => break,
                    Err(_) => {
                        // Deregister and close under the lock, so a racing
                        // submit either lands in this queue (and is drained
                        // below) or spawns a fresh worker.
                        let mut workers = registry.lock().await;
                        let still_ours = workers
                            .get(&worker_user.0)
                            .is_some_and(|current| current.same_channel(&worker_sender));
                        if still_ours {
                            workers.remove(&worker_user.0);
                        }
                        receiver.close();
                        drop(workers);

                        while let Some(text) = receiver.recv().await {
                            pipeline.handle(worker_user.clone(), text).await;
                        }
                        break;
                    }
                }
            }
        });

        workers.insert(user_id.0.clone(), sender.clone());
        sender
    }

    #[cfg(test)]
    async fn worker_count(&self) -> usize {
        self.workers.lock().await.len()
    }
}
