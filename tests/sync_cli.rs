use std::fs;

use assert_cmd::Command;
use httpmock::prelude::*;
use predicates::prelude::*;
use tempfile::tempdir;

fn write_config(dir: &std::path::Path, base_url: &str) -> std::path::PathBuf {
    let path = dir.join("config.yaml");
    let body = format!(
        "source:\n  base_url: \"{base_url}\"\n  timeout: 5s\nstorage:\n  path: \"{}\"\nlogging:\n  level: warn\n",
        dir.join("gallery.db").display()
    );
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn sync_downloads_new_posts_once() {
    let server = MockServer::start();
    let manifest = server.mock(|when, then| {
        when.method(GET).path("/data/index.json");
        then.status(200).json_body(serde_json::json!({
            "lastModified": "2024-03-01T00:00:00Z",
            "files": [{ "file": "a.json" }, { "file": "b.json" }]
        }));
    });
    let post_a = server.mock(|when, then| {
        when.method(GET).path("/data/a.json");
        then.status(200).json_body(serde_json::json!({
            "id": 1,
            "title": "First",
            "image": "https://img.example/1.jpg",
            "genre": "Anime",
            "date": "2024-01-01",
            "links": { "videy": ["aHR0cHM6Ly92aWRleS5jby92P2lkPTE="] }
        }));
    });
    let post_b = server.mock(|when, then| {
        when.method(GET).path("/data/b.json");
        then.status(200).json_body(serde_json::json!({
            "id": "2",
            "title": "Second",
            "image": "https://img.example/2.jpg",
            "genre": "Game",
            "date": "2024-02-01",
            "links": {}
        }));
    });

    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), &server.base_url());

    Command::cargo_bin("gallery-tui")
        .unwrap()
        .env_remove("GALLERY_LOG")
        .arg("--sync")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Synced 2 new post(s)"))
        .stdout(predicate::str::contains("2 cached"));

    Command::cargo_bin("gallery-tui")
        .unwrap()
        .env_remove("GALLERY_LOG")
        .arg("--sync")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Synced 0 new post(s)"))
        .stdout(predicate::str::contains("2 cached"));

    manifest.assert_hits(2);
    post_a.assert_hits(1);
    post_b.assert_hits(1);
}

#[test]
fn sync_fails_when_manifest_is_unavailable() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/data/index.json");
        then.status(503);
    });

    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), &server.base_url());

    Command::cargo_bin("gallery-tui")
        .unwrap()
        .env_remove("GALLERY_LOG")
        .arg("--sync")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("manifest"));
}
