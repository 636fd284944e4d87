//! Command-line smoke tests against the built binary.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn lucius(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_lucius"))
        .arg("--root")
        .arg(root)
        .args(args)
        .output()
        .expect("failed to run lucius")
}

fn project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("templates")).unwrap();
    fs::create_dir_all(root.join("content")).unwrap();
    fs::write(root.join("templates/post.html"), "{{ content }}").unwrap();
    fs::write(
        root.join("templates/index.html"),
        "{% for p in posts %}{{ p.title }}\n{% endfor %}",
    )
    .unwrap();
    fs::write(root.join("templates/category.html"), "{{ category }}").unwrap();
    fs::write(
        root.join("content/hello.md"),
        "title: Hello\ndate: 2024-01-01\n\nHi.\n",
    )
    .unwrap();
    tmp
}

#[test]
fn gen_config_output_is_a_valid_config() {
    let tmp = TempDir::new().unwrap();
    let out = lucius(tmp.path(), &["gen-config"]);
    assert!(out.status.success());

    fs::write(tmp.path().join("config.toml"), &out.stdout).unwrap();
    assert!(lucius::config::load_config(tmp.path()).is_ok());
}

#[test]
fn build_then_update() {
    let tmp = project();
    let root = tmp.path();

    let out = lucius(root, &["build"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("==> Full rebuild"));
    assert!(stdout.contains("Post hello.md \u{2192} blog/hello.html"));
    assert!(root.join("docs/blog/hello.html").exists());

    fs::write(
        root.join("content/second.md"),
        "title: Second\ndate: 2024-02-01\n\nMore.\n",
    )
    .unwrap();
    let out = lucius(root, &["update"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("==> Incremental build"));
    assert!(stdout.contains("Post second.md"));
    assert!(!stdout.contains("Post hello.md"));
    assert_eq!(
        fs::read_to_string(root.join("docs/index.html")).unwrap(),
        "Second\nHello\n"
    );
}

#[test]
fn check_fails_on_invalid_posts() {
    let tmp = project();
    let root = tmp.path();
    fs::write(root.join("content/broken.md"), "date: 2024-01-01\n\nx\n").unwrap();

    let out = lucius(root, &["check"]);
    assert!(!out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("FAIL broken.md"));
    assert!(stdout.contains("1 valid, 1 invalid"));
    assert!(!root.join("docs").exists());
}

#[test]
fn build_reports_template_errors() {
    let tmp = project();
    let root = tmp.path();
    fs::remove_file(root.join("templates/post.html")).unwrap();

    let out = lucius(root, &["build"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("post.html"));
}
