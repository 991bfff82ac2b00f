use std::sync::Arc;

use async_trait::async_trait;
use bookbot_core::{CatalogSource, Genre, Recommender};
use tracing::info;

use crate::blocks::{self, CardOrigin, MessageTemplate};
use crate::commands::{
    BookCommandService, CommandRouteError, GENRE_NOT_FOUND, RANDOM_NOT_FOUND, SEARCH_NOT_FOUND,
};

/// Turns recommender picks into Slack messages; an empty pick becomes the
/// fixed ephemeral notice for that entrypoint.
pub struct RecommendationService<C> {
    recommender: Arc<Recommender<C>>,
}

impl<C> Clone for RecommendationService<C> {
    fn clone(&self) -> Self {
        Self { recommender: Arc::clone(&self.recommender) }
    }
}

impl<C> RecommendationService<C>
where
    C: CatalogSource,
{
    pub fn new(recommender: Arc<Recommender<C>>) -> Self {
        Self { recommender }
    }

    pub fn recommender(&self) -> &Arc<Recommender<C>> {
        &self.recommender
    }
}

#[async_trait]
impl<C> BookCommandService for RecommendationService<C>
where
    C: CatalogSource + 'static,
{
    async fn recommend_genre(
        &self,
        genre: &'static Genre,
        request_id: &str,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let message = match self.recommender.pick_from_genre(genre).await {
            Some(pick) => blocks::book_card_message(&pick, CardOrigin::Genre),
            None => blocks::notice_message(GENRE_NOT_FOUND),
        };
        info!(
            event_name = "slack.command.genre.completed",
            correlation_id = %request_id,
            genre = genre.label,
            "genre recommendation prepared"
        );
        Ok(message)
    }

    async fn random_book(&self, request_id: &str) -> Result<MessageTemplate, CommandRouteError> {
        let message = match self.recommender.pick_random().await {
            Some(pick) => blocks::book_card_message(&pick, CardOrigin::Random),
            None => blocks::notice_message(RANDOM_NOT_FOUND),
        };
        info!(
            event_name = "slack.command.random.completed",
            correlation_id = %request_id,
            "random recommendation prepared"
        );
        Ok(message)
    }

    async fn search_books(
        &self,
        keyword: &str,
        request_id: &str,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let message = match self.recommender.pick_from_search(keyword).await {
            Some(pick) => blocks::book_card_message(&pick, CardOrigin::Search),
            None => blocks::notice_message(SEARCH_NOT_FOUND),
        };
        info!(
            event_name = "slack.command.search.completed",
            correlation_id = %request_id,
            keyword = %keyword,
            "search recommendation prepared"
        );
        Ok(message)
    }
}
