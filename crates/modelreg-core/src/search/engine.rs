//! Search pipeline: validate, tokenize, build, execute, materialize.

use super::allow_list::AllowList;
use super::query::build_search_query;
use super::request::{SearchRequest, SearchResponse};
use super::tokenizer::SearchTerms;
use crate::config::SearchConfig;
use crate::storage::SearchBackend;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Runs searches against an allow-listed backend.
///
/// Holds only shared read-only state, so one engine serves every request
/// concurrently.
#[derive(Clone)]
pub struct SearchEngine {
    allow_list: Arc<AllowList>,
    backend: Arc<dyn SearchBackend>,
    deadline: Duration,
}

impl SearchEngine {
    pub fn new(allow_list: Arc<AllowList>, backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            allow_list,
            backend,
            deadline: SearchConfig::QUERY_TIMEOUT,
        }
    }

    /// Override the per-query deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Run one search.
    ///
    /// Validation failures return before the backend is touched. Past that
    /// point the result is all-or-nothing; zero matches is a success.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        request.check_required()?;
        let limit = request.effective_limit();

        let selection = self.allow_list.validate(&request.model, &request.fields)?;
        let terms = SearchTerms::parse(&request.query_text);
        if request.fuzzy {
            debug!("Fuzzy matching requested; using substring matching");
        }

        let query = build_search_query(&selection, &terms, limit);
        let records = self.backend.fetch(query, self.deadline).await?;

        debug!(
            model = %request.model,
            count = records.len(),
            "Search complete"
        );
        Ok(SearchResponse::new(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{BuiltQuery, FieldValue, Record};
    use crate::RegistryError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every query it is asked to run.
    #[derive(Default)]
    struct RecordingBackend {
        seen: Mutex<Vec<BuiltQuery>>,
    }

    #[async_trait]
    impl SearchBackend for RecordingBackend {
        async fn fetch(&self, query: BuiltQuery, _deadline: Duration) -> Result<Vec<Record>> {
            self.seen.lock().unwrap().push(query);
            let mut record = Record::default();
            record.insert("name", FieldValue::from("Laptop Stand"));
            Ok(vec![record])
        }
    }

    /// Fails the test if storage is ever reached.
    struct UnreachableBackend;

    #[async_trait]
    impl SearchBackend for UnreachableBackend {
        async fn fetch(&self, query: BuiltQuery, _deadline: Duration) -> Result<Vec<Record>> {
            panic!("storage must not be reached, got query: {}", query.sql);
        }
    }

    fn request(model: &str, fields: &[&str], text: &str) -> SearchRequest {
        SearchRequest {
            model: model.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            query_text: text.to_string(),
            max_results: None,
            fuzzy: false,
        }
    }

    fn engine(backend: Arc<dyn SearchBackend>) -> SearchEngine {
        SearchEngine::new(Arc::new(AllowList::default_catalog()), backend)
    }

    #[tokio::test]
    async fn test_search_builds_and_runs_query() {
        let backend = Arc::new(RecordingBackend::default());
        let engine = engine(backend.clone());

        let mut req = request("items", &["name"], "Laptop");
        req.max_results = Some(1000);
        let response = engine.search(&req).await.unwrap();
        assert_eq!(response.count, 1);

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].sql.starts_with("SELECT name FROM items"));
        assert_eq!(seen[0].args.last(), Some(&crate::search::SqlArg::Integer(10)));
    }

    #[tokio::test]
    async fn test_rejections_never_reach_storage() {
        let engine = engine(Arc::new(UnreachableBackend));

        let err = engine
            .search(&request("items", &["name", "secret"], "laptop"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::FieldNotAllowed { .. }));

        let err = engine
            .search(&request("vault", &["name"], "laptop"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownModel { .. }));

        let err = engine
            .search(&request("items", &[], "laptop"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::MissingField { .. }));

        let err = engine
            .search(&request("items", &["name"], ""))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::MissingField { .. }));
    }

    #[test]
    fn test_default_deadline() {
        let engine = engine(Arc::new(UnreachableBackend));
        assert_eq!(engine.deadline(), SearchConfig::QUERY_TIMEOUT);
        let engine = engine.with_deadline(Duration::from_millis(250));
        assert_eq!(engine.deadline(), Duration::from_millis(250));
    }
}
