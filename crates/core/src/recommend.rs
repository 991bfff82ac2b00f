//! Bounded random retry over the catalog.
//!
//! Deep catalog pages are frequently empty, so a pick draws a fresh random
//! page (and query type) per attempt until a page with items comes back or the
//! attempt budget runs out.

use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::catalog::{Book, CatalogSource, Genre, ListRequest, QueryType, SearchRequest, GENRES};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub max_start_page: u32,
    pub list_max_results: u32,
    pub search_max_results: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5, max_start_page: 100, list_max_results: 20, search_max_results: 10 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pick {
    pub book: Book,
    pub genre: Option<&'static Genre>,
    pub attempts: u32,
}

pub struct Recommender<C> {
    catalog: C,
    policy: RetryPolicy,
    rng: Mutex<StdRng>,
}

impl<C> Recommender<C>
where
    C: CatalogSource,
{
    pub fn new(catalog: C, policy: RetryPolicy) -> Self {
        Self::with_rng(catalog, policy, StdRng::from_entropy())
    }

    pub fn with_rng(catalog: C, policy: RetryPolicy, rng: StdRng) -> Self {
        Self { catalog, policy, rng: Mutex::new(rng) }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub async fn pick_from_genre(&self, genre: &'static Genre) -> Option<Pick> {
        self.pick_listed(Some(genre)).await
    }

    /// Every attempt draws a new genre as well as a new page.
    pub async fn pick_random(&self) -> Option<Pick> {
        self.pick_listed(None).await
    }

    pub async fn pick_from_search(&self, keyword: &str) -> Option<Pick> {
        let request = SearchRequest {
            keyword: keyword.trim().to_owned(),
            max_results: self.policy.search_max_results,
        };

        match self.catalog.search_items(&request).await {
            Ok(books) => {
                let total = books.len();
                let picked = self.choose(books);
                if picked.is_none() {
                    warn!(
                        event_name = "catalog.search.empty",
                        keyword = %request.keyword,
                        "keyword search returned no items"
                    );
                }
                picked.map(|book| {
                    info!(
                        event_name = "catalog.search.picked",
                        keyword = %request.keyword,
                        total,
                        "picked book from keyword search"
                    );
                    Pick { book, genre: None, attempts: 1 }
                })
            }
            Err(error) => {
                warn!(
                    event_name = "catalog.search.failed",
                    keyword = %request.keyword,
                    error = %error,
                    "keyword search failed"
                );
                None
            }
        }
    }

    async fn pick_listed(&self, fixed_genre: Option<&'static Genre>) -> Option<Pick> {
        for attempt in 1..=self.policy.max_attempts {
            let (genre, request) = self.next_list_request(fixed_genre);

            match self.catalog.list_items(&request).await {
                Ok(books) => {
                    if let Some(book) = self.choose(books) {
                        info!(
                            event_name = "catalog.list.picked",
                            attempt,
                            genre = genre.label,
                            query_type = %request.query_type,
                            start = request.start,
                            "picked book from genre listing"
                        );
                        return Some(Pick { book, genre: Some(genre), attempts: attempt });
                    }
                    debug!(
                        event_name = "catalog.list.empty",
                        attempt,
                        genre = genre.label,
                        query_type = %request.query_type,
                        start = request.start,
                        "genre listing page was empty; retrying"
                    );
                }
                Err(error) => {
                    warn!(
                        event_name = "catalog.list.failed",
                        attempt,
                        genre = genre.label,
                        start = request.start,
                        error = %error,
                        "genre listing request failed; retrying"
                    );
                }
            }
        }

        warn!(
            event_name = "catalog.list.exhausted",
            max_attempts = self.policy.max_attempts,
            genre = fixed_genre.map(|genre| genre.label).unwrap_or("random"),
            "no catalog page produced a book"
        );
        None
    }

    fn next_list_request(
        &self,
        fixed_genre: Option<&'static Genre>,
    ) -> (&'static Genre, ListRequest) {
        let mut rng = self.lock_rng();
        let genre = match fixed_genre {
            Some(genre) => genre,
            None => GENRES.choose(&mut *rng).unwrap_or(&GENRES[0]),
        };
        let query_type = QueryType::ALL.choose(&mut *rng).copied().unwrap_or(QueryType::ItemNewAll);
        let start = rng.gen_range(1..=self.policy.max_start_page.max(1));

        let request = ListRequest {
            query_type,
            category_id: genre.category_id,
            max_results: self.policy.list_max_results,
            start,
        };
        (genre, request)
    }

    fn choose(&self, mut books: Vec<Book>) -> Option<Book> {
        if books.is_empty() {
            return None;
        }
        let index = self.lock_rng().gen_range(0..books.len());
        Some(books.swap_remove(index))
    }

    fn lock_rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rand::{rngs::StdRng, SeedableRng};

    use super::{Recommender, RetryPolicy};
    use crate::catalog::{
        find_genre, Book, CatalogError, CatalogSource, ListRequest, SearchRequest, GENRES,
    };

    #[derive(Default)]
    pub(crate) struct ScriptedCatalog {
        list_results: Mutex<VecDeque<Result<Vec<Book>, CatalogError>>>,
        search_results: Mutex<VecDeque<Result<Vec<Book>, CatalogError>>>,
        list_requests: Mutex<Vec<ListRequest>>,
        search_requests: Mutex<Vec<SearchRequest>>,
    }

    impl ScriptedCatalog {
        pub(crate) fn with_lists(results: Vec<Result<Vec<Book>, CatalogError>>) -> Self {
            Self { list_results: Mutex::new(results.into()), ..Self::default() }
        }

        pub(crate) fn with_searches(results: Vec<Result<Vec<Book>, CatalogError>>) -> Self {
            Self { search_results: Mutex::new(results.into()), ..Self::default() }
        }

        pub(crate) fn list_requests(&self) -> Vec<ListRequest> {
            self.list_requests.lock().expect("lock").clone()
        }

        pub(crate) fn search_requests(&self) -> Vec<SearchRequest> {
            self.search_requests.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl CatalogSource for ScriptedCatalog {
        async fn list_items(&self, request: &ListRequest) -> Result<Vec<Book>, CatalogError> {
            self.list_requests.lock().expect("lock").push(request.clone());
            self.list_results.lock().expect("lock").pop_front().unwrap_or(Ok(Vec::new()))
        }

        async fn search_items(&self, request: &SearchRequest) -> Result<Vec<Book>, CatalogError> {
            self.search_requests.lock().expect("lock").push(request.clone());
            self.search_results.lock().expect("lock").pop_front().unwrap_or(Ok(Vec::new()))
        }
    }

    pub(crate) fn book(title: &str) -> Book {
        Book {
            title: title.to_owned(),
            author: "저자".to_owned(),
            publisher: "출판사".to_owned(),
            ..Book::default()
        }
    }

    fn recommender(catalog: ScriptedCatalog) -> Recommender<ScriptedCatalog> {
        Recommender::with_rng(catalog, RetryPolicy::default(), StdRng::seed_from_u64(7))
    }

    #[tokio::test]
    async fn genre_pick_retries_past_empty_pages_and_errors() {
        let genre = find_genre("과학").expect("genre");
        let recommender = recommender(ScriptedCatalog::with_lists(vec![
            Ok(Vec::new()),
            Err(CatalogError::Status(503)),
            Ok(vec![book("코스모스"), book("이기적 유전자")]),
        ]));

        let pick = recommender.pick_from_genre(genre).await.expect("pick");

        assert_eq!(pick.attempts, 3);
        assert_eq!(pick.genre, Some(genre));
        assert!(["코스모스", "이기적 유전자"].contains(&pick.book.title.as_str()));

        let requests = recommender.catalog().list_requests();
        assert_eq!(requests.len(), 3);
        for request in requests {
            assert_eq!(request.category_id, 987);
            assert_eq!(request.max_results, 20);
            assert!(
                (1..=100).contains(&request.start),
                "start page {} out of range",
                request.start
            );
        }
    }

    #[tokio::test]
    async fn genre_pick_gives_up_after_max_attempts() {
        let genre = find_genre("만화").expect("genre");
        let recommender = recommender(ScriptedCatalog::default());

        assert!(recommender.pick_from_genre(genre).await.is_none());
        assert_eq!(recommender.catalog().list_requests().len(), 5);
    }

    #[tokio::test]
    async fn random_pick_reports_the_genre_it_listed() {
        let recommender = recommender(ScriptedCatalog::with_lists(vec![
            Ok(Vec::new()),
            Ok(vec![book("랜덤 도서")]),
        ]));

        let pick = recommender.pick_random().await.expect("pick");
        let requests = recommender.catalog().list_requests();
        let last = requests.last().expect("request");

        assert_eq!(pick.attempts, 2);
        assert_eq!(pick.genre.map(|genre| genre.category_id), Some(last.category_id));
        assert!(requests
            .iter()
            .all(|request| GENRES.iter().any(|genre| genre.category_id == request.category_id)));
    }

    #[tokio::test]
    async fn start_page_respects_configured_ceiling() {
        let policy = RetryPolicy { max_start_page: 3, max_attempts: 8, ..RetryPolicy::default() };
        let recommender =
            Recommender::with_rng(ScriptedCatalog::default(), policy, StdRng::seed_from_u64(11));

        assert!(recommender.pick_random().await.is_none());
        let requests = recommender.catalog().list_requests();
        assert_eq!(requests.len(), 8);
        assert!(requests.iter().all(|request| (1..=3).contains(&request.start)));
    }

    #[tokio::test]
    async fn search_pick_makes_a_single_call() {
        let recommender = recommender(ScriptedCatalog::with_searches(vec![Ok(vec![book(
            "데미안",
        )])]));

        let pick = recommender.pick_from_search("  헤세 ").await.expect("pick");

        assert_eq!(pick.book.title, "데미안");
        assert_eq!(pick.genre, None);
        let requests = recommender.catalog().search_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].keyword, "헤세");
        assert_eq!(requests[0].max_results, 10);
    }

    #[tokio::test]
    async fn search_pick_is_empty_on_error_or_no_hits() {
        let recommender = recommender(ScriptedCatalog::with_searches(vec![
            Err(CatalogError::Decode("unexpected token".to_owned())),
            Ok(Vec::new()),
        ]));

        assert!(recommender.pick_from_search("없는책").await.is_none());
        assert!(recommender.pick_from_search("없는책").await.is_none());
        assert_eq!(recommender.catalog().search_requests().len(), 2);
    }
}
