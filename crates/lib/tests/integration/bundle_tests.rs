//! Tests for parsing app instances from packaged bundles.

use acorn_appdef::bundle::app_image_from_tar;
use acorn_appdef::controller::{APP_INSTANCE_CONDITION_PARSED, AppInstance, parse_app_image};

fn bundle(entries: &[(&str, &str)]) -> Vec<u8> {
  let mut builder = tar::Builder::new(Vec::new());
  for (name, data) in entries {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, name, data.as_bytes()).unwrap();
  }
  builder.into_inner().unwrap()
}

const ACORNFILE: &str = r#"
  return {
    containers = {
      web = {
        build = ".",
        dirs = { ["/data"] = "volume://data" },
        env = { TOKEN = "secret://api-token/token" },
        sidecars = { log = { image = "busybox" } },
      },
    },
  }
"#;

const IMAGES: &str = r#"{
  "containers": {
    "web": {"image": "sha256:web"},
    "web.log": {"image": "sha256:log"}
  }
}"#;

#[test]
fn bundle_to_parsed_instance() {
  let data = bundle(&[("Acornfile", ACORNFILE), ("images.json", IMAGES)]);
  let (image, _) = app_image_from_tar(data.as_slice()).unwrap();

  let mut app = AppInstance {
    name: "shop".to_string(),
    ..Default::default()
  };
  app.status.app_image = image;
  parse_app_image(&mut app);

  let condition = app.status.condition(APP_INSTANCE_CONDITION_PARSED).unwrap();
  assert!(condition.success, "parse failed: {}", condition.message);

  let spec = &app.status.app_spec;
  let web = &spec.containers["web"];
  assert_eq!(web.image, "sha256:web");
  assert_eq!(web.build.as_ref().unwrap().base_image, "sha256:web");
  assert_eq!(web.sidecars["log"].image, "sha256:log");
  assert_eq!(web.sidecars["log"].build.as_ref().unwrap().base_image, "busybox");
  assert!(spec.volumes.contains_key("data"));
  assert!(spec.secrets.contains_key("api-token"));
}

#[test]
fn unbuilt_bundle_records_error() {
  let data = bundle(&[("Acornfile", ACORNFILE)]);
  let (image, _) = app_image_from_tar(data.as_slice()).unwrap();

  let mut app = AppInstance::default();
  app.status.app_image = image;
  parse_app_image(&mut app);

  let condition = app.status.condition(APP_INSTANCE_CONDITION_PARSED).unwrap();
  assert!(condition.error);
  assert!(condition.message.contains("container [web]"), "got: {}", condition.message);
}
