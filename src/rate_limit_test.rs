use super::*;

fn small_config() -> RateLimitConfig {
    RateLimitConfig {
        per_user_limit: 3,
        per_user_window: Duration::from_secs(60),
        global_limit: 5,
        global_window: Duration::from_secs(60),
        token_budget: 1_000,
        token_window: Duration::from_secs(3600),
    }
}

#[test]
fn per_user_allows_up_to_limit() {
    let rl = RateLimiter::new(small_config());
    let now = Instant::now();

    for i in 0..3 {
        assert!(rl.check_and_record_at("student-1", now).is_ok(), "request {i} should succeed");
    }
    assert!(matches!(
        rl.check_and_record_at("student-1", now),
        Err(RateLimitError::PerUserExceeded { limit: 3, window_secs: 60 })
    ));
}

#[test]
fn global_allows_up_to_limit() {
    let rl = RateLimiter::new(small_config());
    let now = Instant::now();

    // Distinct users so the per-user limit never trips first.
    for i in 0..5 {
        assert!(rl.check_and_record_at(&format!("student-{i}"), now).is_ok());
    }
    assert!(matches!(
        rl.check_and_record_at("student-99", now),
        Err(RateLimitError::GlobalExceeded { limit: 5, .. })
    ));
}

#[test]
fn rejected_request_is_not_recorded() {
    let rl = RateLimiter::new(small_config());
    let now = Instant::now();
    for _ in 0..3 {
        rl.check_and_record_at("a", now).unwrap();
    }
    assert!(rl.check_and_record_at("a", now).is_err());
    // Only 3 global slots used; 2 more users still fit.
    assert!(rl.check_and_record_at("b", now).is_ok());
    assert!(rl.check_and_record_at("c", now).is_ok());
    assert!(rl.check_and_record_at("d", now).is_err());
}

#[test]
fn token_budget_exceeded() {
    let rl = RateLimiter::new(small_config());
    let now = Instant::now();

    rl.record_tokens_at("parent-1", 1_000, now);

    assert!(matches!(
        rl.check_and_record_at("parent-1", now),
        Err(RateLimitError::TokenBudgetExceeded { budget: 1_000, .. })
    ));
    assert!(rl.check_and_record_at("parent-2", now).is_ok());
}

#[test]
fn token_budget_recovers_after_window() {
    let rl = RateLimiter::new(small_config());
    let start = Instant::now();
    rl.record_tokens_at("u", 5_000, start);
    assert!(rl.check_and_record_at("u", start).is_err());

    let later = start + Duration::from_secs(3601);
    assert!(rl.check_and_record_at("u", later).is_ok());
}

#[test]
fn window_expiry_allows_new_requests() {
    let rl = RateLimiter::new(small_config());
    let start = Instant::now();

    for _ in 0..3 {
        rl.check_and_record_at("u", start).unwrap();
    }
    assert!(rl.check_and_record_at("u", start).is_err());

    let after_window = start + Duration::from_secs(60) + Duration::from_millis(1);
    assert!(rl.check_and_record_at("u", after_window).is_ok());
}

#[test]
fn zero_tokens_are_not_recorded() {
    let rl = RateLimiter::new(RateLimitConfig { token_budget: 0, ..small_config() });
    rl.record_tokens("u", 0);
    // No usage entry exists, so the budget check is skipped entirely.
    assert!(rl.check_and_record("u").is_ok());
}

#[test]
fn default_config_matches_constants() {
    let cfg = RateLimitConfig::default();
    assert_eq!(cfg.per_user_limit, DEFAULT_PER_USER_LIMIT);
    assert_eq!(cfg.global_limit, DEFAULT_GLOBAL_LIMIT);
    assert_eq!(cfg.token_budget, DEFAULT_TOKEN_BUDGET);
}
