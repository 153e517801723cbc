use std::fs;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Output};

fn harpoon(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_harpoon"))
        .args(args)
        .current_dir(dir)
        .env("RUST_LOG", "off")
        .output()
        .unwrap()
}

fn project(images: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("harpoon.yml"), images).unwrap();
    dir
}

const IMAGES: &str = concat!(
    "images:\n",
    "  app:\n",
    "    commands:\n",
    "      - image: base\n",
    "      - RUN make\n",
    "  base:\n",
    "    commands: FROM alpine:3\n",
    "    tag: \"1.0\"\n",
    "    description: shared base\n",
);

#[test]
fn test_order() {
    let dir = project(IMAGES);
    let output = harpoon(dir.path(), &["order"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "base\napp\n");
}

#[test]
fn test_show_json() {
    let dir = project(IMAGES);
    let output = harpoon(dir.path(), &["show", "--json"]);
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["order"], serde_json::json!(["base", "app"]));
    assert_eq!(report["images"][0]["name"], "app");
    assert_eq!(report["images"][0]["dependencies"], serde_json::json!(["base"]));
    assert_eq!(report["images"][1]["image_reference"], "base:1.0");
    assert_eq!(report["failures"], serde_json::json!([]));
}

#[test]
fn test_show_fails_on_invalid_image() {
    let dir = project(concat!(
        "images:\n",
        "  good:\n    commands: FROM alpine\n",
        "  bad:\n    commands: []\n",
    ));
    let output = harpoon(dir.path(), &["show"]);
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("good"));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Image 'bad': commands must not be empty"));
}

#[test]
fn test_missing_images_is_an_error() {
    let dir = project("harpoon: {}\n");
    let output = harpoon(dir.path(), &["order"]);
    assert!(!output.status.success());
}

#[test]
fn test_context_to_file() {
    let dir = project(IMAGES);
    fs::write(dir.path().join("hello.txt"), "hi").unwrap();
    let out = tempfile::tempdir().unwrap();
    let target = out.path().join("app.tar");
    let output = harpoon(
        dir.path(),
        &["context", "app", "--output", target.to_str().unwrap(), "--mtime", "42"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let bytes = fs::read(&target).unwrap();
    let mut archive = tar::Archive::new(bytes.as_slice());
    let mut docker_file = None;
    let mut paths = Vec::new();
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        let path = entry.path().unwrap().to_string_lossy().into_owned();
        if path == "Dockerfile" {
            assert_eq!(entry.header().mtime().unwrap(), 42);
            let mut content = String::new();
            entry.read_to_string(&mut content).unwrap();
            docker_file = Some(content);
        }
        paths.push(path);
    }
    assert_eq!(paths, vec!["harpoon.yml", "hello.txt", "Dockerfile"]);
    assert_eq!(docker_file.unwrap(), "FROM base:1.0\nRUN make");
}

#[test]
fn test_context_for_unknown_image() {
    let dir = project(IMAGES);
    let output = harpoon(dir.path(), &["context", "nope", "--output", "x.tar"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No image named 'nope'"));
}
