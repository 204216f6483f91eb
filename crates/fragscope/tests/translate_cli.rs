use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const SHADER: &str = r"#version 300 es
precision highp float;
#define SPEED 2.0
uniform float iTime;

float wave(vec2 p) { return sin(p.x * SPEED + iTime); }

void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    vec2 uv = fragCoord / iResolution.xy;
    fragColor = vec4(uv, wave(uv), 1.0);
}
";

fn fragscope(config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fragscope"))
        .env("FRAGSCOPE_CONFIG_DIR", config_dir)
        .env_remove("FRAGSCOPE_CONFIG")
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("failed to run fragscope")
}

fn write_shader(root: &TempDir, name: &str, source: &str) -> String {
    let path = root.path().join(name);
    fs::write(&path, source).unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn translate_prints_assembled_program() {
    let root = TempDir::new().unwrap();
    let shader = write_shader(&root, "wave.frag", SHADER);

    let output = fragscope(root.path(), &["translate", &shader]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let program = String::from_utf8(output.stdout).unwrap();
    assert!(program.starts_with("#version 450"));
    assert!(program.contains("#define SPEED 2.0"));
    assert!(program.contains("void mainImage(out vec4 fragColor, in vec2 fragCoord)"));
    assert!(!program.contains("#version 300 es"));
    assert!(!program.contains("uniform float iTime;"));
}

#[test]
fn translate_json_reports_unit_parts() {
    let root = TempDir::new().unwrap();
    let shader = write_shader(&root, "wave.frag", SHADER);

    let output = fragscope(root.path(), &["translate", "--json", &shader]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let unit: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(unit["defines"], serde_json::json!(["#define SPEED 2.0"]));
    assert_eq!(unit["color_param"], "fragColor");
    assert_eq!(unit["coord_param"], "fragCoord");
    assert_eq!(unit["uniforms"], serde_json::json!(["iResolution", "iTime"]));
    assert!(unit["body_before"].as_str().unwrap().contains("float wave"));
}

#[test]
fn translate_fails_without_entry_point() {
    let root = TempDir::new().unwrap();
    let shader = write_shader(&root, "broken.frag", "void main() { }\n");

    let output = fragscope(root.path(), &["translate", &shader]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("mainImage"), "{stderr}");
}

#[test]
fn translate_fails_on_truncated_entry_point() {
    let root = TempDir::new().unwrap();
    let shader = write_shader(
        &root,
        "truncated.frag",
        "void mainImage(out vec4 c, in vec2 p) {\n    if (p.x > 0.0) {\n",
    );

    let output = fragscope(root.path(), &["translate", &shader]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("never closed"), "{stderr}");
}

#[test]
fn check_rejects_untranslatable_source_before_touching_the_gpu() {
    let root = TempDir::new().unwrap();
    let shader = write_shader(&root, "broken.frag", "float x = 1.0;\n");

    let output = fragscope(root.path(), &["check", &shader]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("mainImage"), "{stderr}");
}

#[test]
fn invalid_config_is_reported() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("config.toml"), "version = 7\n").unwrap();
    let shader = write_shader(&root, "wave.frag", SHADER);

    let output = fragscope(root.path(), &["translate", &shader]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unsupported config version 7"), "{stderr}");
}

#[test]
fn explicit_config_path_overrides_directory() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("config.toml"), "version = 7\n").unwrap();
    let explicit = root.path().join("explicit.toml");
    fs::write(&explicit, "version = 1\n[window]\nwidth = 320\n").unwrap();
    let shader = write_shader(&root, "wave.frag", SHADER);

    let output = fragscope(
        root.path(),
        &["--config", explicit.to_str().unwrap(), "translate", &shader],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
}
