//! Configuration validation.

use super::Config;

/// Whether the process is running in production mode (`CODEDUEL_ENV=production`).
pub fn is_production_mode() -> bool {
    std::env::var("CODEDUEL_ENV")
        .map(|v| v.eq_ignore_ascii_case("production"))
        .unwrap_or(false)
}

/// Validate settings that would make the server unsafe or inert.
///
/// In production mode a missing token secret is a hard error; in development
/// it is tolerated so the binary can run against the static test verifier.
pub fn validate_config(config: &Config) -> Result<(), String> {
    let mut problems = Vec::new();

    if config.security.token_secret.trim().is_empty() {
        if is_production_mode() {
            problems.push(
                "security.token_secret is required in production (set CODEDUEL__SECURITY__TOKEN_SECRET)"
                    .to_string(),
            );
        } else {
            eprintln!("Warning: security.token_secret is empty; tokens from the identity service will not verify");
        }
    }

    if config.judge.api_url.trim().is_empty() {
        problems.push("judge.api_url must not be empty".to_string());
    } else if !config.judge.api_url.starts_with("http://")
        && !config.judge.api_url.starts_with("https://")
    {
        problems.push(format!(
            "judge.api_url must be an http(s) URL, got '{}'",
            config.judge.api_url
        ));
    }

    if config.server.time_update_tick_secs == 0 || config.server.time_update_tick_secs > 10 {
        problems.push(format!(
            "server.time_update_tick_secs must be within 1..=10, got {}",
            config.server.time_update_tick_secs
        ));
    }

    if config.server.join_code_length < 4 {
        problems.push(format!(
            "server.join_code_length must be at least 4, got {}",
            config.server.join_code_length
        ));
    }

    if config.server.chat_history_limit == 0 {
        problems.push("server.chat_history_limit must be positive".to_string());
    }

    for language in ["python", "cpp", "java", "javascript", "go"] {
        if !config.judge.language_ids.contains_key(language) {
            problems.push(format!(
                "judge.language_ids is missing an id for '{language}'"
            ));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn rejects_bad_judge_url() {
        let mut cfg = Config::default();
        cfg.judge.api_url = "not-a-url".to_string();
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn rejects_slow_battle_clock() {
        let mut cfg = Config::default();
        cfg.server.time_update_tick_secs = 30;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn rejects_missing_language_id() {
        let mut cfg = Config::default();
        cfg.judge.language_ids.remove("go");
        assert!(validate_config(&cfg).is_err());
    }
}
