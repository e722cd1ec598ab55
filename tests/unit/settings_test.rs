//! Unit tests for settings loading

use img2img_serving::config::Settings;
use std::io::Write;

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let settings = Settings::load_from_path("does/not/exist.toml").unwrap();

    assert_eq!(settings.server.port, 5000);
    assert_eq!(settings.model.checkpoint, "stabilityai/sdxl-turbo");
    assert_eq!(settings.model.working_size, 512);
    assert_eq!(settings.generation.num_inference_steps, 2);
    assert!(settings.validate().is_ok());
}

#[test]
fn test_file_overrides_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[server]
port = 8088

[model]
checkpoint = "stabilityai/sd-turbo"
endpoint = "http://gpu-node:9000"
working_size = 768

[generation]
strength = 0.7
num_inference_steps = 4
"#
    )
    .unwrap();

    let settings = Settings::load_from_path(file.path()).unwrap();

    assert_eq!(settings.server.port, 8088);
    assert_eq!(settings.server.host, "0.0.0.0");
    assert_eq!(settings.model.checkpoint, "stabilityai/sd-turbo");
    assert_eq!(settings.model.endpoint, "http://gpu-node:9000");
    assert_eq!(settings.model.working_size, 768);
    assert_eq!(settings.model.device, "cuda");
    assert!((settings.generation.strength - 0.7).abs() < 1e-6);
    assert_eq!(settings.generation.guidance_scale, 0.0);
    assert_eq!(settings.generation.num_inference_steps, 4);
}

#[test]
fn test_environment_overrides_file() {
    std::env::set_var("IMG2IMG__LOGGING__FORMAT", "pretty");

    let settings = Settings::load_from_path("does/not/exist.toml").unwrap();
    assert_eq!(settings.logging.format, "pretty");

    std::env::remove_var("IMG2IMG__LOGGING__FORMAT");
}

#[test]
fn test_invalid_file_values_fail_validation() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[generation]\nstrength = 1.5").unwrap();

    let settings = Settings::load_from_path(file.path()).unwrap();
    assert!(settings.validate().is_err());
}
