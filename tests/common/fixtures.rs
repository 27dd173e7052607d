use std::path::{Path, PathBuf};

use aidb_export::config::HttpConfig;

pub fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

pub fn load_fixture(relative: &str) -> String {
    std::fs::read_to_string(fixture_path(relative))
        .unwrap_or_else(|_| panic!("Failed to load fixture: {}", relative))
}

/// First listing page: three valid companies and one row with broken JSON.
pub fn listing_page() -> String {
    load_fixture("listing_page.html")
}

/// A listing page whose table has a header row only.
pub fn empty_page() -> String {
    load_fixture("empty_page.html")
}

/// HTTP settings pointing at a test server.
pub fn http_config(base_url: &str) -> HttpConfig {
    HttpConfig {
        base_url: base_url.to_string(),
        user_agent: "aidb-export-tests/1.0".to_string(),
        accept: "text/html".to_string(),
        request_timeout_secs: 5,
        accept_invalid_certs: false,
    }
}

/// Every row of a CSV file, header included.
pub fn read_csv_rows(path: &Path) -> Vec<Vec<String>> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .unwrap_or_else(|e| panic!("Failed to open {}: {}", path.display(), e))
        .records()
        .map(|r| r.expect("valid CSV record").iter().map(str::to_string).collect())
        .collect()
}

/// The single CSV file written into `dir`.
pub fn only_csv_in(dir: &Path) -> PathBuf {
    let files: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", dir.display(), e))
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| p.extension().map(|e| e == "csv").unwrap_or(false))
        .collect();
    assert_eq!(files.len(), 1, "expected exactly one CSV in {}", dir.display());
    files[0].clone()
}
