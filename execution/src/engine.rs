//! Public entry point: one [`Engine`] serves any number of chats.
//!
//! Mutations for a chat go through that chat's lane in the
//! [`OperationQueue`]; status reads go to the chat's last published
//! [`TableView`] and never wait behind mutations.
//!
//! A chat left with no round, no auto-play and nothing scheduled is dropped
//! along with its lane; the next `start_game` or `enable_auto` opens it again.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures::future::join_all;
use punto_types::{AutoGameAck, BetReceipt, GameStarted, GameStatus, PlaceBetRequest};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::capabilities::{CardSource, Clock, RecordSink};
use crate::config::{ConfigError, EngineConfig};
use crate::error::EngineError;
use crate::queue::OperationQueue;
use crate::status::{self, TableView};
use crate::table::{ChatTable, Context, TickOutcome};

#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

struct Inner {
    ctx: Arc<Context>,
    queue: OperationQueue<ChatTable>,
    views: RwLock<HashMap<String, watch::Receiver<TableView>>>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        cards: Arc<dyn CardSource>,
        sink: Arc<dyn RecordSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let queue = OperationQueue::new(config.max_pending_ops);
        Ok(Self {
            inner: Arc::new(Inner {
                ctx: Arc::new(Context::new(config, clock, cards, sink)),
                queue,
                views: RwLock::new(HashMap::new()),
            }),
        })
    }

    /// Chats the engine currently holds state for.
    pub fn chats(&self) -> Vec<String> {
        self.inner
            .views
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    fn is_known(&self, chat_id: &str) -> bool {
        self.inner
            .views
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(chat_id)
    }

    /// Create the chat's lane and view on first use.
    fn ensure_chat(&self, chat_id: &str) {
        let mut views = self
            .inner
            .views
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if views.contains_key(chat_id) {
            return;
        }
        let (publisher, view) = watch::channel(TableView::default());
        let table = ChatTable::new(chat_id, &self.inner.ctx.config, publisher);
        self.inner.queue.open(chat_id, move || table);
        views.insert(chat_id.to_string(), view);
    }

    /// Run `op` in the chat's lane and publish the resulting view. Yields
    /// `None` when the chat was dropped before `op` reached it.
    async fn submit<R, F>(
        &self,
        chat_id: &str,
        op: F,
    ) -> Result<Option<Result<R, EngineError>>, EngineError>
    where
        F: FnOnce(&mut ChatTable, &Context) -> Result<R, EngineError> + Send + 'static,
        R: Send + 'static,
    {
        let inner = self.inner.clone();
        let out = self
            .inner
            .queue
            .submit(chat_id, move |table: &mut ChatTable| {
                if table.is_closed() {
                    return None;
                }
                let out = op(table, &inner.ctx);
                table.publish();
                if table.is_dormant() {
                    inner.retire(table);
                }
                Some(out)
            })
            .await?;
        Ok(out)
    }

    /// Run `op` on a chat that must already exist.
    async fn run<R, F>(&self, chat_id: &str, op: F) -> Result<R, EngineError>
    where
        F: FnOnce(&mut ChatTable, &Context) -> Result<R, EngineError> + Send + 'static,
        R: Send + 'static,
    {
        self.submit(chat_id, op).await?.unwrap_or_else(|| {
            Err(EngineError::NotFound {
                chat_id: chat_id.to_string(),
            })
        })
    }

    /// Run `op`, opening the chat first when it is not held.
    async fn run_or_open<R, F>(&self, chat_id: &str, op: F) -> Result<R, EngineError>
    where
        F: FnOnce(&mut ChatTable, &Context) -> Result<R, EngineError> + Clone + Send + 'static,
        R: Send + 'static,
    {
        loop {
            self.ensure_chat(chat_id);
            match self.submit(chat_id, op.clone()).await {
                Ok(Some(out)) => return out,
                // Dropped between lookup and execution; open it again.
                Ok(None) | Err(EngineError::NotFound { .. }) => continue,
                Err(err) => return Err(err),
            }
        }
    }

    /// Open a betting round. Fails with `AlreadyActive` while a round is live.
    pub async fn start_game(&self, chat_id: &str) -> Result<GameStarted, EngineError> {
        self.run_or_open(chat_id, |table, ctx| table.start(ctx)).await
    }

    pub async fn place_bet(&self, request: PlaceBetRequest) -> Result<BetReceipt, EngineError> {
        let PlaceBetRequest {
            chat_id,
            user_id,
            user_name,
            bet_type,
            amount,
        } = request;
        if !self.is_known(&chat_id) {
            return Err(EngineError::NotFound { chat_id });
        }
        self.run(&chat_id, move |table, ctx| {
            table.place_bet(ctx, &user_id, &user_name, bet_type, amount)
        })
        .await
    }

    pub async fn enable_auto(&self, chat_id: &str) -> Result<AutoGameAck, EngineError> {
        self.run_or_open(chat_id, |table, ctx| Ok(table.enable_auto(ctx)))
            .await
    }

    pub async fn disable_auto(&self, chat_id: &str) -> Result<AutoGameAck, EngineError> {
        if !self.is_known(chat_id) {
            return Err(EngineError::NotFound {
                chat_id: chat_id.to_string(),
            });
        }
        self.run(chat_id, |table, _| Ok(table.disable_auto())).await
    }

    /// Current status, built from the last published view. Never waits on
    /// the chat's queue.
    pub fn status(&self, chat_id: &str) -> Result<GameStatus, EngineError> {
        let view = {
            let views = self
                .inner
                .views
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            let Some(view) = views.get(chat_id) else {
                return Err(EngineError::NotFound {
                    chat_id: chat_id.to_string(),
                });
            };
            let snapshot = view.borrow().clone();
            snapshot
        };
        let queue = self.inner.queue.stats(chat_id).unwrap_or_default();
        Ok(status::project(&view, queue, self.inner.ctx.clock.now_ms()))
    }

    /// Enqueue one timed-transition check for the chat.
    pub async fn tick(&self, chat_id: &str) -> Result<TickOutcome, EngineError> {
        self.run(chat_id, |table, ctx| Ok(table.tick(ctx))).await
    }

    /// Tick every chat with a round or a scheduled start, concurrently.
    pub async fn tick_all(&self) -> Vec<(String, Result<TickOutcome, EngineError>)> {
        let due: Vec<String> = {
            let views = self
                .inner
                .views
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            views
                .iter()
                .filter(|(_, view)| {
                    let view = view.borrow();
                    view.round.is_some() || view.next_game_at.is_some()
                })
                .map(|(chat_id, _)| chat_id.clone())
                .collect()
        };
        let ticks = due.into_iter().map(|chat_id| async move {
            let outcome = self.tick(&chat_id).await;
            (chat_id, outcome)
        });
        join_all(ticks).await
    }

    /// Drive timed transitions every `period` until the handle is aborted.
    pub fn spawn_ticker(&self, period: Duration) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                for (chat_id, outcome) in engine.tick_all().await {
                    match outcome {
                        Ok(_) => {}
                        Err(EngineError::Overloaded) => {
                            debug!(%chat_id, "tick skipped; lane full")
                        }
                        Err(err) => warn!(%chat_id, %err, "tick failed"),
                    }
                }
            }
        })
    }
}

impl Inner {
    /// Drop the chat's view and lane. Runs inside the chat's own lane, so no
    /// other operation on `table` can interleave.
    fn retire(&self, table: &mut ChatTable) {
        let mut views = self.views.write().unwrap_or_else(PoisonError::into_inner);
        views.remove(table.chat_id());
        self.queue.close(table.chat_id());
        table.close();
        debug!(chat_id = %table.chat_id(), "chat dropped");
    }
}
