//! One dispatch tick
//!
//! Refresh dynamic priorities, sort, select eligible items within the
//! concurrency budget, fan the batch out to the transmitter, wait for every
//! send to settle, then route the outcomes through the retry manager.

use std::{
    sync::{Arc, atomic::Ordering},
    time::SystemTime,
};

use missive_common::SendStatus;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::{
    error::{QueueError, SendError},
    persistence,
    service::MailQueue,
    types::{MessageId, MessagePayload, QueueItem, SendReceipt},
};

/// Run one dispatch tick. Returns the number of items dispatched.
pub(crate) async fn run_tick(mq: &MailQueue) -> Result<usize, QueueError> {
    let now = SystemTime::now();

    mq.queue.refresh_and_sort(&mq.config.priority_boost, now);

    let headroom = mq
        .config
        .max_concurrent
        .saturating_sub(mq.active.load(Ordering::SeqCst));
    let budget = mq.config.batch_size.min(headroom);
    if budget == 0 {
        return Ok(0);
    }

    // Claiming an item records its rate/interval/domain consumption in the
    // same pass that marks it processing.
    let batch = mq.queue.select_for_dispatch(now, budget, |item| {
        if !mq.limiter.check(item.priority) {
            return false;
        }
        if !mq.throttle.check(&item.recipient_domain) {
            return false;
        }

        mq.limiter.record(item.priority);
        mq.throttle.consume(&item.recipient_domain);
        true
    });

    if batch.is_empty() {
        return Ok(0);
    }

    debug!(
        count = batch.len(),
        max_concurrent = mq.config.max_concurrent,
        "Dispatching batch"
    );

    let dispatched = batch.len();
    mq.active.store(dispatched, Ordering::SeqCst);

    let mut join_set: JoinSet<(MessageId, Result<SendReceipt, SendError>)> = JoinSet::new();
    for item in batch {
        let transmitter = Arc::clone(&mq.transmitter);
        join_set.spawn(async move {
            let outcome = send_one(transmitter.as_ref(), &item).await;
            (item.id, outcome)
        });
    }

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((id, outcome)) => {
                settle(mq, &id, outcome);
            }
            Err(e) => {
                error!(error = %e, "Send task failed to complete");
            }
        }
        mq.active.fetch_sub(1, Ordering::SeqCst);
    }

    mq.active.store(0, Ordering::SeqCst);

    persistence::snapshot(&mq.queue, mq.store.as_ref(), &mq.config.persistence_key).await?;

    Ok(dispatched)
}

async fn send_one(
    transmitter: &dyn crate::transmitter::Transmitter,
    item: &QueueItem,
) -> Result<SendReceipt, SendError> {
    match &item.payload {
        MessagePayload::Raw {
            to,
            subject,
            html,
            text,
        } => {
            transmitter
                .send_raw(to, subject, html, text.as_deref())
                .await
        }
        MessagePayload::Templated { to, template, data } => {
            transmitter.send_templated(to, template, data).await
        }
    }
}

/// Route a settled outcome through the retry manager
fn settle(mq: &MailQueue, id: &MessageId, outcome: Result<SendReceipt, SendError>) {
    let now = SystemTime::now();

    match outcome {
        Ok(receipt) => {
            mq.queue.with_item_mut(id, |item| {
                item.status = SendStatus::Completed;
                item.result = Some(receipt);
                item.error = None;

                mq.limiter.mark_sent(item.priority);
                debug!(%id, attempts = item.attempts, "Message sent");
            });
        }
        Err(e) => {
            mq.queue.with_item_mut(id, |item| {
                item.error = Some(e.to_string());

                if mq.retry.should_retry(item.attempts, item.max_attempts) {
                    item.status = SendStatus::Pending;
                    item.next_attempt = mq.retry.next_attempt(item.attempts, now);
                    info!(
                        %id,
                        attempt = item.attempts,
                        max_attempts = item.max_attempts,
                        delay_ms = mq.retry.delay_for(item.attempts).as_millis() as u64,
                        error = %e,
                        "Send failed, retry scheduled"
                    );
                } else {
                    item.status = SendStatus::Failed;
                    warn!(
                        %id,
                        attempts = item.attempts,
                        error = %e,
                        "Send failed terminally, attempts exhausted"
                    );
                }
            });
        }
    }
}
