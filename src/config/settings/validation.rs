// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{AssistError, Result};

use super::Settings;

impl Settings {
    /// Get the API key for OpenAI, checking env var first.
    pub fn get_openai_api_key(&self) -> Option<String> {
        // Priority: env var > config file.
        non_blank(std::env::var(&self.providers.openai.api_key_env).ok())
            .or_else(|| non_blank(self.providers.openai.api_key.clone()))
    }

    /// Get the API key for Anthropic, checking env var first.
    pub fn get_anthropic_api_key(&self) -> Option<String> {
        // Priority: env var > config file.
        non_blank(std::env::var(&self.providers.anthropic.api_key_env).ok())
            .or_else(|| non_blank(self.providers.anthropic.api_key.clone()))
    }

    /// Check the numeric settings a hand edit could break.
    pub fn validate(&self) -> Result<()> {
        if self.composer.max_attempts == 0 {
            return Err(AssistError::Config(
                "composer.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.autocomplete.inactivity_delay_ms < self.autocomplete.suggest_delay_ms {
            return Err(AssistError::Config(
                "autocomplete.inactivity_delay_ms must not be shorter than suggest_delay_ms"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_openai_api_key_from_config() {
        let mut settings = Settings::default();
        settings.providers.openai.api_key_env = "CODEASSIST_TEST_UNSET_OPENAI_KEY".to_string();
        settings.providers.openai.api_key = Some("sk-file".to_string());
        assert_eq!(settings.get_openai_api_key().as_deref(), Some("sk-file"));
    }

    #[test]
    fn test_get_anthropic_api_key_none() {
        let mut settings = Settings::default();
        settings.providers.anthropic.api_key_env =
            "CODEASSIST_TEST_UNSET_ANTHROPIC_KEY".to_string();
        settings.providers.anthropic.api_key = Some("  ".to_string());
        assert!(settings.get_anthropic_api_key().is_none());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut settings = Settings::default();
        assert!(settings.validate().is_ok());
        settings.composer.max_attempts = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_delays() {
        let mut settings = Settings::default();
        settings.autocomplete.inactivity_delay_ms = 100;
        assert!(settings.validate().is_err());
    }
}
