use tantivy::schema::{
    Field, IndexRecordOption, IntOptions, Schema as TantivySchema, SchemaBuilder,
    TextFieldIndexing, TextOptions, STORED, STRING,
};
use tantivy::tokenizer::{LowerCaser, RawTokenizer, RemoveLongFilter, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

/// Field names as they appear in stored documents and in the query compiler.
///
/// These are flattened, dot-qualified names standing in for the nested
/// `metadata`/`properties` sub-document mappings of the original bleve-based
/// schema (`examples/original_source/engine/index.go::newLensIndex`):
/// Tantivy schemas are flat, so the nesting becomes a naming convention.
pub mod fields {
    pub const HASH: &str = "hash";
    pub const CONTENT: &str = "content";
    pub const DISPLAY_NAME: &str = "metadata.display_name";
    pub const MIME_TYPE: &str = "metadata.mime_type";
    pub const CATEGORY: &str = "metadata.category";
    pub const TAGS: &str = "metadata.tags";
    pub const INDEXED: &str = "properties.indexed";
}

/// Name of the analyzed-text tokenizer used for `content`/`display_name`.
///
/// Tantivy's built-in `"default"` tokenizer only runs
/// `SimpleTokenizer -> RemoveLongFilter -> LowerCaser` — it does not strip
/// stop words. spec.md §3/§4.A call for "lowercasing, whitespace/
/// punctuation tokenization, [and a] standard stop-word filter", matching
/// the bleve `en` standard analyzer the Go original's empty text mapping
/// inherits, so Lens registers its own chain under this name with an
/// English stop-word filter appended.
pub const TEXT_TOKENIZER: &str = "lens_text";

/// Name of the case-insensitive keyword tokenizer used for the facet
/// fields (`mime_type`, `category`, `tags`).
///
/// The whole field value becomes one token (no splitting, like
/// Tantivy's built-in `"raw"`), but it is lowercased at index time. This
/// keeps facet lookups case-insensitive end to end: `query.rs::
/// split_terms` lowercases every facet query term, so without a matching
/// lowercase step on the index side a document tagged `"Finance"` could
/// never be found by `tags: ["Finance"]` (query term `"finance"` !=
/// stored term `"Finance"`) — exactly the failure spec.md §4.D rule 3
/// says the splitting/normalization is there to prevent.
pub const KEYWORD_CI_TOKENIZER: &str = "lens_keyword_ci";

/// Field handles resolved once at startup, passed around instead of
/// re-resolving field names by string on every operation.
#[derive(Debug, Clone, Copy)]
pub struct Fields {
    pub hash: Field,
    pub content: Field,
    pub display_name: Field,
    pub mime_type: Field,
    pub category: Field,
    pub tags: Field,
    pub indexed: Field,
}

/// The document mapping used by every Lens index (spec.md §4.C).
///
/// `content` and `display_name` use the `TEXT_TOKENIZER` analyzed-text
/// chain (tokenization, lowercasing, stop-word removal); `mime_type`,
/// `category`, and `tags` use the `KEYWORD_CI_TOKENIZER` chain (no
/// splitting, lowercased); `indexed` is a stored datetime. `hash` is a
/// raw, case-preserving keyword field doubling as the primary key used
/// for point lookups and the hash-filter query — unlike the facet
/// fields, caller-supplied hashes are opaque tokens, not compared
/// case-insensitively.
#[derive(Debug, Clone)]
pub struct IndexSchema {
    pub schema: TantivySchema,
    pub fields: Fields,
}

impl IndexSchema {
    pub fn build() -> Self {
        let mut builder: SchemaBuilder = TantivySchema::builder();

        let hash = builder.add_text_field(fields::HASH, STRING | STORED);

        let text_indexing = TextFieldIndexing::default()
            .set_tokenizer(TEXT_TOKENIZER)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);
        let text_options = TextOptions::default()
            .set_indexing_options(text_indexing)
            .set_stored();

        let content = builder.add_text_field(fields::CONTENT, text_options.clone());
        let display_name = builder.add_text_field(fields::DISPLAY_NAME, text_options);

        let keyword_ci_indexing = TextFieldIndexing::default()
            .set_tokenizer(KEYWORD_CI_TOKENIZER)
            .set_index_option(IndexRecordOption::Basic);
        let keyword_ci_options = TextOptions::default()
            .set_indexing_options(keyword_ci_indexing)
            .set_stored();

        let mime_type = builder.add_text_field(fields::MIME_TYPE, keyword_ci_options.clone());
        let category = builder.add_text_field(fields::CATEGORY, keyword_ci_options.clone());
        let tags = builder.add_text_field(fields::TAGS, keyword_ci_options);

        let indexed = builder.add_date_field(fields::INDEXED, IntOptions::default().set_stored());

        let schema = builder.build();

        Self {
            schema,
            fields: Fields {
                hash,
                content,
                display_name,
                mime_type,
                category,
                tags,
                indexed,
            },
        }
    }

    /// Confirms an existing on-disk schema structurally matches the one
    /// this build would produce. Subsequent opens of an existing index
    /// directory must reject structural mismatches (spec.md §4.A).
    pub fn validate(&self, existing: &TantivySchema) -> anyhow::Result<()> {
        if existing != &self.schema {
            anyhow::bail!(
                "on-disk index schema does not match the expected Lens document mapping"
            );
        }
        Ok(())
    }

    /// Registers this schema's custom tokenizers with `index`.
    ///
    /// Tokenizer registration lives on the `Index` instance, not on the
    /// persisted `Schema`, so this must run on every
    /// `Index::create_in_dir`/`Index::open_in_dir` before any indexing or
    /// searching happens — it does not persist across process restarts
    /// on its own.
    pub fn register_tokenizers(index: &Index) {
        index.tokenizers().register(TEXT_TOKENIZER, text_analyzer());
        index
            .tokenizers()
            .register(KEYWORD_CI_TOKENIZER, keyword_ci_analyzer());
    }
}

/// Builds the `content`/`display_name` analyzer: `SimpleTokenizer` splits
/// on whitespace/punctuation, `RemoveLongFilter` drops pathological
/// tokens, `LowerCaser` folds case, and `StopWordFilter` drops the
/// standard English stop words (matching the `"default"` tokenizer's
/// chain plus the stop-word step it omits).
pub fn text_analyzer() -> TextAnalyzer {
    TextAnalyzer::from(SimpleTokenizer)
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .filter(StopWordFilter::remove(english_stop_words()))
}

/// Builds the facet-field analyzer: `RawTokenizer` keeps the whole value
/// as one token, `LowerCaser` folds its case, so index-time case matches
/// `query.rs::split_terms`'s query-time lowercasing exactly.
pub fn keyword_ci_analyzer() -> TextAnalyzer {
    TextAnalyzer::from(RawTokenizer).filter(LowerCaser)
}

/// The classic Lucene `StopAnalyzer` English stop-word list (33 words),
/// used here as Lens's "standard stop-word filter" (spec.md §3).
fn english_stop_words() -> Vec<String> {
    const WORDS: &[&str] = &[
        "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is",
        "it", "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there",
        "these", "they", "this", "to", "was", "will", "with",
    ];
    WORDS.iter().map(|w| w.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tantivy::tokenizer::TokenStream;

    fn tokenize(analyzer: &TextAnalyzer, text: &str) -> Vec<String> {
        let mut stream = analyzer.token_stream(text);
        let mut tokens = Vec::new();
        while stream.advance() {
            tokens.push(stream.token().text.clone());
        }
        tokens
    }

    #[test]
    fn schema_is_stable_across_builds() {
        let a = IndexSchema::build();
        let b = IndexSchema::build();
        assert_eq!(a.schema, b.schema);
    }

    #[test]
    fn validate_accepts_matching_schema() {
        let schema = IndexSchema::build();
        assert!(schema.validate(&schema.schema).is_ok());
    }

    #[test]
    fn validate_rejects_foreign_schema() {
        let schema = IndexSchema::build();
        let mut builder = TantivySchema::builder();
        builder.add_text_field("unrelated", STORED);
        let foreign = builder.build();
        assert!(schema.validate(&foreign).is_err());
    }

    #[test]
    fn text_analyzer_lowercases_and_drops_stop_words() {
        let tokens = tokenize(&text_analyzer(), "The Quick Brown Fox");
        assert_eq!(tokens, vec!["quick", "brown", "fox"]);
    }

    #[test]
    fn text_analyzer_strips_punctuation() {
        let tokens = tokenize(&text_analyzer(), "brown, fox!");
        assert_eq!(tokens, vec!["brown", "fox"]);
    }

    #[test]
    fn keyword_ci_analyzer_lowercases_without_splitting() {
        let tokens = tokenize(&keyword_ci_analyzer(), "Finance Team");
        assert_eq!(tokens, vec!["finance team"]);
    }
}
