//! Scenario: config layers are read from disk in merge order.

use std::io::Write;

use jcr_config::load_layered_yaml;

fn write_yaml(dir: &tempfile::TempDir, name: &str, body: &str) -> String {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).expect("create yaml");
    f.write_all(body.as_bytes()).expect("write yaml");
    path.to_string_lossy().into_owned()
}

#[test]
fn scenario_file_layers_merge_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_yaml(
        &dir,
        "base.yaml",
        "portal:\n  base_url: http://localhost:8787\n  request_timeout_ms: 2500\nroutes:\n  /admin/bar: bar.manage\n",
    );
    let prod = write_yaml(
        &dir,
        "prod.yaml",
        "portal:\n  base_url: https://jcr.example.org\nroutes:\n  /admin/bar: bar.admin\n",
    );

    let cfg = load_layered_yaml(&[base.as_str(), prod.as_str()]).unwrap();

    assert_eq!(cfg.base_url, "https://jcr.example.org");
    assert_eq!(cfg.request_timeout.as_millis(), 2500);
    assert_eq!(cfg.routes["/admin/bar"], "bar.admin");
    assert_eq!(cfg.live_url(), "wss://jcr.example.org/live");
}

#[test]
fn scenario_missing_file_names_the_path() {
    let err = load_layered_yaml(&["/definitely/not/here.yaml"]).unwrap_err();
    assert!(format!("{err:#}").contains("/definitely/not/here.yaml"));
}

#[test]
fn scenario_empty_file_is_an_empty_layer() {
    let dir = tempfile::tempdir().unwrap();
    let empty = write_yaml(&dir, "empty.yaml", "");
    let cfg = load_layered_yaml(&[empty.as_str()]).unwrap();
    assert_eq!(cfg, jcr_config::PortalConfig::default());
}
