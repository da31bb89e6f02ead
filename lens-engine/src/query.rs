use md5::{Digest, Md5};
use tantivy::query::{BooleanQuery, BoostQuery, Occur, PhraseQuery, Query as TantivyQuery, TermQuery};
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::tokenizer::{TextAnalyzer, TokenStream};
use tantivy::Term;

use crate::document::Query;
use crate::error::{LensError, Result};
use crate::schema::Fields;

/// How much a matched required term outweighs ordinary relevance scoring.
/// Required terms are still a `Should`-free, `Must` conjunct of the overall
/// query (every required term is filtering), but the boost lets callers
/// rank documents that satisfy more of them above ones that satisfy fewer.
///
/// spec.md §9 leaves the choice between AND semantics and SHOULD-with-boost
/// open; this follows `original_source/engine/query.go`, the latest source
/// version, which boosts the required-terms clause by 100.
const REQUIRED_TERMS_BOOST: f32 = 100.0;

/// A query compiled to a Tantivy boolean query, plus a correlation hash for
/// logging (spec.md §4.D).
pub struct CompiledQuery {
    pub query: Box<dyn TantivyQuery>,
    pub hash: String,
}

/// Compiles a structured `Query` into a boolean conjunction over the Lens
/// schema, or `InvalidQuery` if every field is empty.
///
/// `text_tokenizer` must be the same analyzer registered for `content`
/// (`IndexStore::text_tokenizer`), so `text` is split into terms exactly
/// the way the indexed content was, rather than by a separate, looser
/// convention (spec.md §4.D).
///
/// Grounded directly on `original_source/engine/query.go::newBleveQuery`:
/// a phrase match on `content` if `text` is set, a boosted disjunction of
/// `required` terms against `content`, disjunctions of `tags`/`categories`/
/// `mime_types` against their respective fields, and a disjunction of exact
/// hash matches if `hashes` is set — all ANDed together.
pub fn compile(fields: &Fields, text_tokenizer: &TextAnalyzer, query: &Query) -> Result<CompiledQuery> {
    let mut clauses: Vec<(Occur, Box<dyn TantivyQuery>)> = Vec::new();

    if let Some(phrase) = phrase_or_term_query(fields.content, text_tokenizer, &query.text) {
        clauses.push((Occur::Must, phrase));
    }

    if let Some(required) = term_disjunction(fields.content, &query.required) {
        clauses.push((
            Occur::Must,
            Box::new(BoostQuery::new(required, REQUIRED_TERMS_BOOST)),
        ));
    }

    if let Some(tags) = term_disjunction(fields.tags, &query.tags) {
        clauses.push((Occur::Must, tags));
    }

    if let Some(categories) = term_disjunction(fields.category, &query.categories) {
        clauses.push((Occur::Must, categories));
    }

    if let Some(mime_types) = term_disjunction(fields.mime_type, &query.mime_types) {
        clauses.push((Occur::Must, mime_types));
    }

    if let Some(hashes) = hash_disjunction(fields.hash, &query.hashes) {
        clauses.push((Occur::Must, hashes));
    }

    if clauses.is_empty() {
        return Err(LensError::InvalidQuery);
    }

    Ok(CompiledQuery {
        query: Box::new(BooleanQuery::from(clauses)),
        hash: query_hash(query),
    })
}

/// A phrase match on `text` against `field`, or a single-term match when
/// `text` tokenizes to exactly one word (`PhraseQuery` requires at least
/// two). `None` if `text` is empty or whitespace-only.
///
/// Tokenizes `text` by running `analyzer`'s token stream rather than a
/// hand-rolled `split_whitespace`/`to_lowercase`, so punctuation is
/// stripped and terms are folded exactly the way `content` was indexed
/// (e.g. "brown, fox" yields the same two terms as the stored text,
/// instead of a dangling "brown," that can never match).
fn phrase_or_term_query(field: Field, analyzer: &TextAnalyzer, text: &str) -> Option<Box<dyn TantivyQuery>> {
    let terms: Vec<Term> = tokenize(analyzer, text)
        .into_iter()
        .map(|t| Term::from_field_text(field, &t))
        .collect();

    match terms.len() {
        0 => None,
        1 => Some(Box::new(TermQuery::new(
            terms.into_iter().next().unwrap(),
            IndexRecordOption::Basic,
        ))),
        _ => Some(Box::new(PhraseQuery::new(terms))),
    }
}

/// Runs `analyzer`'s token stream over `text` and collects the surviving
/// terms in order.
fn tokenize(analyzer: &TextAnalyzer, text: &str) -> Vec<String> {
    let mut stream = analyzer.token_stream(text);
    let mut terms = Vec::new();
    while stream.advance() {
        terms.push(stream.token().text.clone());
    }
    terms
}

/// Splits `text` on spaces into lowercased terms, discarding fragments
/// shorter than two characters.
///
/// Grounded on `original_source/engine/query.go::stringSplitter` and
/// `newFieldTermsQuery`, which splits each supplied string the same way
/// before turning every surviving fragment into a `Should` clause.
fn split_terms(text: &str) -> Vec<String> {
    text.split(' ')
        .map(|part| part.trim())
        .filter(|part| part.chars().count() >= 2)
        .map(|part| part.to_lowercase())
        .collect()
}

/// A disjunction of term matches against `field`, one clause per word
/// surviving `split_terms` across every value in `values`. `None` if no
/// word survives.
fn term_disjunction(field: Field, values: &[String]) -> Option<Box<dyn TantivyQuery>> {
    let clauses: Vec<(Occur, Box<dyn TantivyQuery>)> = values
        .iter()
        .flat_map(|value| split_terms(value))
        .map(|term| {
            let query: Box<dyn TantivyQuery> = Box::new(TermQuery::new(
                Term::from_field_text(field, &term),
                IndexRecordOption::Basic,
            ));
            (Occur::Should, query)
        })
        .collect();

    if clauses.is_empty() {
        None
    } else {
        Some(Box::new(BooleanQuery::from(clauses)))
    }
}

/// A disjunction of exact matches against `field`, one clause per value in
/// `hashes` (no splitting: hashes are opaque tokens, not free text).
fn hash_disjunction(field: Field, hashes: &[String]) -> Option<Box<dyn TantivyQuery>> {
    if hashes.is_empty() {
        return None;
    }

    let clauses: Vec<(Occur, Box<dyn TantivyQuery>)> = hashes
        .iter()
        .map(|hash| {
            let query: Box<dyn TantivyQuery> =
                Box::new(TermQuery::new(Term::from_field_text(field, hash), IndexRecordOption::Basic));
            (Occur::Should, query)
        })
        .collect();

    Some(Box::new(BooleanQuery::from(clauses)))
}

/// An MD5 hash of the query's canonical JSON form, used purely as a log
/// correlation id (spec.md §4.D). Grounded on
/// `original_source/engine/query.go::Query.Hash`.
fn query_hash(query: &Query) -> String {
    let canonical = serde_json::to_vec(query).unwrap_or_default();
    format!("{:x}", Md5::digest(&canonical))
}
