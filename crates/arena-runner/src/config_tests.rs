use super::*;

#[test]
fn test_defaults() {
    let config = TournamentConfig::default();
    assert_eq!(config.concurrency, 2);
    assert_eq!(config.total_pairs, 10);
    assert_eq!(config.clocks(), vec![Clock::new(60_000, 1000)]);
    assert!(config.start_positions().is_empty());
    assert_eq!(config.opening_mode, OpeningMode::Sequential);
    assert!(config.validate().is_ok());

    let settings = config.game_settings();
    assert_eq!(settings.max_moves, 500);
    assert_eq!(settings.move_overhead, Duration::from_millis(50));
    assert_eq!(settings.poll_interval, Duration::from_secs(1));
}

#[test]
fn test_from_toml_fills_missing_keys() {
    let config = TournamentConfig::from_toml_str(
        r#"
        concurrency = 4
        total_pairs = 20
        opening_mode = "random"
        openings = ["rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"]
        seed = 7

        [[time_controls]]
        base_ms = 10000
        increment_ms = 100

        [[time_controls]]
        base_ms = 180000
        "#,
    )
    .expect("valid config");

    assert_eq!(config.concurrency, 4);
    assert_eq!(config.total_pairs, 20);
    assert_eq!(config.opening_mode, OpeningMode::Random);
    assert_eq!(config.seed, Some(7));
    assert_eq!(
        config.clocks(),
        vec![Clock::new(10_000, 100), Clock::new(180_000, 0)]
    );
    assert_eq!(config.start_positions().len(), 1);
    assert_eq!(config.max_moves, 500, "unspecified keys keep defaults");
}

#[test]
fn test_validation_errors() {
    let err = TournamentConfig::from_toml_str("concurrency = 0").unwrap_err();
    assert!(matches!(err, TournamentConfigError::ZeroConcurrency));

    let err = TournamentConfig::from_toml_str("time_controls = []").unwrap_err();
    assert!(matches!(err, TournamentConfigError::NoTimeControls));

    let err = TournamentConfig::from_toml_str("concurrency = \"many\"").unwrap_err();
    assert!(matches!(err, TournamentConfigError::Parse(_)));
}

#[test]
fn test_poll_interval_never_zero() {
    let config = TournamentConfig {
        poll_interval_ms: 0,
        ..Default::default()
    };
    assert_eq!(config.game_settings().poll_interval, Duration::from_millis(1));
}
