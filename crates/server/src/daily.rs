use std::{sync::Arc, time::Duration};

use bookbot_core::{ApplicationError, CatalogSource, Recommender};
use bookbot_slack::{
    blocks::{book_card_message, CardOrigin},
    web::MessageDelivery,
};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DailyOutcome {
    Posted { title: String },
    Skipped,
}

/// Posts a random pick with the daily heading to one channel on a fixed interval.
pub struct DailyPick<C> {
    recommender: Arc<Recommender<C>>,
    delivery: Arc<dyn MessageDelivery>,
    channel_id: String,
    interval: Duration,
}

impl<C> DailyPick<C>
where
    C: CatalogSource,
{
    pub fn new(
        recommender: Arc<Recommender<C>>,
        delivery: Arc<dyn MessageDelivery>,
        channel_id: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self { recommender, delivery, channel_id: channel_id.into(), interval }
    }

    /// Never returns; the first post happens immediately.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            if let Err(error) = self.post_once().await {
                warn!(
                    event_name = "daily.post.failed",
                    channel_id = %self.channel_id,
                    error = %error,
                    "daily pick could not be posted; will retry next interval"
                );
            }
        }
    }

    pub async fn post_once(&self) -> Result<DailyOutcome, ApplicationError> {
        let correlation_id = Uuid::new_v4().to_string();

        let Some(pick) = self.recommender.pick_random().await else {
            warn!(
                event_name = "daily.pick.empty",
                correlation_id = %correlation_id,
                channel_id = %self.channel_id,
                "no book found for daily pick"
            );
            return Ok(DailyOutcome::Skipped);
        };

        let message = book_card_message(&pick, CardOrigin::Daily);
        self.delivery
            .post_message(&self.channel_id, &message)
            .await
            .map_err(|error| ApplicationError::Delivery(error.to_string()))?;

        info!(
            event_name = "daily.post.sent",
            correlation_id = %correlation_id,
            channel_id = %self.channel_id,
            title = %pick.book.display_title(),
            attempts = pick.attempts,
            "daily pick posted"
        );
        Ok(DailyOutcome::Posted { title: pick.book.display_title().to_owned() })
    }
}
