// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as token budgets that must nest and weights that must not all be zero.

use crate::diagnostic::ConfigError;
use crate::model::MemdexConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &MemdexConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.sources.memory_dirs.iter().any(|d| d.trim().is_empty()) {
        fail("sources.memory_dirs must not contain empty paths".to_string());
    }

    if config.sources.include_sessions && config.sources.sessions_dir.trim().is_empty() {
        fail("sources.sessions_dir must not be empty when include_sessions is set".to_string());
    }

    let chunking = &config.chunking;
    if chunking.max_tokens == 0 {
        fail("chunking.max_tokens must be at least 1".to_string());
    }
    if chunking.overlap_tokens >= chunking.max_tokens {
        fail(format!(
            "chunking.overlap_tokens ({}) must be smaller than chunking.max_tokens ({})",
            chunking.overlap_tokens, chunking.max_tokens
        ));
    }
    if chunking.min_tokens > chunking.max_tokens {
        fail(format!(
            "chunking.min_tokens ({}) must not exceed chunking.max_tokens ({})",
            chunking.min_tokens, chunking.max_tokens
        ));
    }

    let search = &config.search;
    if search.vector_weight < 0.0 || search.text_weight < 0.0 {
        fail(format!(
            "search weights must be non-negative, got vector_weight={} text_weight={}",
            search.vector_weight, search.text_weight
        ));
    }
    if search.vector_weight == 0.0 && search.text_weight == 0.0 {
        fail("search.vector_weight and search.text_weight must not both be zero".to_string());
    }
    if !(0.0..=1.0).contains(&search.min_score) {
        fail(format!(
            "search.min_score must be within 0.0-1.0, got {}",
            search.min_score
        ));
    }
    if !(0.0..=1.0).contains(&search.missing_score) {
        fail(format!(
            "search.missing_score must be within 0.0-1.0, got {}",
            search.missing_score
        ));
    }
    if search.max_results == 0 {
        fail("search.max_results must be at least 1".to_string());
    }
    if search.snippet_max_chars < 16 {
        fail(format!(
            "search.snippet_max_chars must be at least 16, got {}",
            search.snippet_max_chars
        ));
    }

    if !(0.0..=1.0).contains(&config.sync.full_reload_fraction) {
        fail(format!(
            "sync.full_reload_fraction must be within 0.0-1.0, got {}",
            config.sync.full_reload_fraction
        ));
    }
    if config.sync.embedding_batch_size == 0 {
        fail("sync.embedding_batch_size must be at least 1".to_string());
    }

    if config.embedding.model.trim().is_empty() {
        fail("embedding.model must not be empty".to_string());
    }
    if config.embedding.provider.trim().is_empty() {
        fail("embedding.provider must not be empty".to_string());
    }
    if config.embedding.dimensions == 0 {
        fail("embedding.dimensions must be at least 1".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_error(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        let config = MemdexConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = MemdexConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "database_path"));
    }

    #[test]
    fn overlap_must_be_smaller_than_max() {
        let mut config = MemdexConfig::default();
        config.chunking.max_tokens = 100;
        config.chunking.overlap_tokens = 100;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "overlap_tokens"));
    }

    #[test]
    fn zero_weights_fail_validation() {
        let mut config = MemdexConfig::default();
        config.search.vector_weight = 0.0;
        config.search.text_weight = 0.0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "must not both be zero"));
    }

    #[test]
    fn collects_every_error() {
        let mut config = MemdexConfig::default();
        config.sync.embedding_batch_size = 0;
        config.sync.full_reload_fraction = 1.5;
        config.embedding.model = " ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(has_error(&errors, "embedding_batch_size"));
        assert!(has_error(&errors, "full_reload_fraction"));
        assert!(has_error(&errors, "embedding.model"));
    }

    #[test]
    fn single_weight_is_enough() {
        let mut config = MemdexConfig::default();
        config.search.vector_weight = 0.0;
        config.search.text_weight = 1.0;
        assert!(validate_config(&config).is_ok());
    }
}
