use repodiff::config::{Config, DEFAULT_CAP_FILE, DEFAULT_CAP_TOTAL};

#[test]
fn defaults_validate() {
    let cfg = Config::new("https://example.com/repo.git", "aaa", "bbb")
        .validated()
        .unwrap();
    assert_eq!(cfg.cap_total, DEFAULT_CAP_TOTAL);
    assert_eq!(cfg.cap_file, DEFAULT_CAP_FILE);
}

#[test]
fn cap_total_below_cap_file_is_invalid() {
    let mut cfg = Config::new("u", "a", "b");
    cfg.cap_total = 10;
    cfg.cap_file = 20;
    let err = cfg.validated().unwrap_err();
    assert_eq!(err.code(), "CAPS_INVALID");
}

#[test]
fn threshold_out_of_range_is_invalid() {
    let mut cfg = Config::new("u", "a", "b");
    cfg.find_renames_threshold = 101;
    let err = cfg.validated().unwrap_err();
    assert_eq!(err.code(), "CAPS_INVALID");
}

#[test]
fn equal_caps_are_valid() {
    let mut cfg = Config::new("u", "a", "b");
    cfg.cap_total = 100;
    cfg.cap_file = 100;
    assert!(cfg.validated().is_ok());
}
