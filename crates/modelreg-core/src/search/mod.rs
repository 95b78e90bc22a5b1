//! Allow-listed search.
//!
//! A request flows through the [`AllowList`] (which models and columns may be
//! touched), the tokenizer (which words of the query text matter), the query
//! builder (parameterized SQL) and finally a [`crate::storage::SearchBackend`]
//! that materializes rows into [`Record`]s.

mod allow_list;
mod engine;
pub mod materialize;
mod query;
mod record;
mod request;
mod tokenizer;

pub use allow_list::{AllowList, ModelColumns, SearchColumns, ValidatedSelection};
pub use engine::SearchEngine;
pub use query::{
    build_search_query, contains_pattern, escape_like, register_search_functions, BuiltQuery,
    SqlArg, CASEFOLD_FUNCTION,
};
pub use record::{FieldValue, Record};
pub use request::{clamp_max_results, SearchRequest, SearchResponse};
pub use tokenizer::{is_stop_word, tokenize, SearchTerms, Terms, MIN_TERM_CHARS};
