//! Tests for resolving Acornfiles against image data.

use std::time::Duration;

use acorn_appdef::appdef::{AppDefinition, AppDefinitionError, WorkloadKind, assign_image};
use acorn_appdef::appspec::Build;
use acorn_appdef::images::{ContainerData, ImagesData, aggregate};
use acorn_appdef::value::GenericMap;

use super::common::container_images;

mod end_to_end {
  use super::*;

  #[test]
  fn single_container_is_bound_and_built() {
    let def = AppDefinition::new(br#"return { containers = { web = {} } }"#)
      .unwrap()
      .with_image_data(container_images(&[("web", "registry/app:v1")]));

    let spec = def.resolve().unwrap();

    let web = &spec.containers["web"];
    assert_eq!(web.image, "registry/app:v1");
    assert_eq!(
      web.build,
      Some(Build {
        context: ".".to_string(),
        dockerfile: "Dockerfile".to_string(),
        base_image: "registry/app:v1".to_string(),
        ..Default::default()
      })
    );
  }

  #[test]
  fn without_image_data_spec_is_as_declared() {
    let def = AppDefinition::new(br#"return { containers = { web = { image = "nginx" } } }"#).unwrap();
    let spec = def.resolve().unwrap();
    assert_eq!(spec.containers["web"].image, "nginx");
    assert_eq!(spec.containers["web"].build, None);
  }

  #[test]
  fn args_and_profiles_shape_the_spec() {
    let source = br#"
      local replicas = has_profile("prod") and 3 or 1
      return {
        containers = {
          web = { image = "nginx", env = { NAME = args.name or "web", REPLICAS = tostring(replicas) } },
        },
      }
    "#;
    let def = AppDefinition::new(source)
      .unwrap()
      .with_args(GenericMap::decode(br#"{"name": "shop"}"#).unwrap(), vec!["prod".to_string()]);

    let spec = def.resolve().unwrap();
    assert_eq!(spec.containers["web"].env["NAME"], "shop");
    assert_eq!(spec.containers["web"].env["REPLICAS"], "3");
  }

  #[test]
  fn dotted_container_name_keeps_its_image() {
    let def = AppDefinition::new(br#"return { containers = { ["my.app"] = { image = "nginx" } } }"#)
      .unwrap()
      .with_image_data(ImagesData::default());

    let spec = def.resolve().unwrap();
    assert_eq!(spec.containers["my.app"].image, "nginx");
  }

  #[test]
  fn output_formats_agree() {
    let def = AppDefinition::new(br#"return { containers = { web = {} } }"#)
      .unwrap()
      .with_image_data(container_images(&[("web", "registry/app:v1")]));

    let json: serde_json::Value = serde_json::from_str(&def.to_json().unwrap()).unwrap();
    let yaml: serde_json::Value = serde_yaml::from_str(&def.to_yaml().unwrap()).unwrap();
    assert_eq!(json, yaml);
    assert_eq!(json["containers"]["web"]["image"], "registry/app:v1");
  }
}

mod failures {
  use super::*;

  #[test]
  fn resolution_failure_is_total() {
    let def = AppDefinition::new(br#"return { containers = { web = {}, api = {} } }"#)
      .unwrap()
      .with_image_data(container_images(&[("web", "registry/app:v1")]));

    match def.resolve() {
      Err(AppDefinitionError::MissingBinding { workload }) => {
        assert_eq!(workload.kind, WorkloadKind::Container);
        assert_eq!(workload.name, "api");
      }
      other => panic!("expected missing binding for api, got {:?}", other),
    }
  }

  #[test]
  fn missing_binding_message_names_kind_and_remedy() {
    let def = AppDefinition::new(br#"return { jobs = { migrate = {} } }"#)
      .unwrap()
      .with_image_data(ImagesData::default());

    let message = def.resolve().unwrap_err().to_string();
    assert!(message.contains("job [migrate]"), "got: {}", message);
    assert!(message.contains("images section"), "got: {}", message);
  }

  #[test]
  fn timeout_is_its_own_error() {
    let source = br#"
      if has_profile("slow") then
        while true do end
      end
      return { containers = { web = { image = "nginx" } } }
    "#;
    let def = AppDefinition::new(source)
      .unwrap()
      .with_args(GenericMap::default(), vec!["slow".to_string()])
      .with_timeout(Duration::from_millis(50));

    match def.resolve() {
      Err(AppDefinitionError::Timeout(timeout)) => assert_eq!(timeout, Duration::from_millis(50)),
      other => panic!("expected timeout, got {:?}", other),
    }
  }

  #[test]
  fn invalid_source_is_rejected_on_create() {
    let err = AppDefinition::new(br#"return { containers = { web = { image = 42 } } }"#).unwrap_err();
    assert!(matches!(err, AppDefinitionError::Decode { .. }), "got: {:?}", err);
  }

  #[test]
  fn broken_fragment_names_the_workload() {
    let images = ImagesData {
      containers: [(
        "web".to_string(),
        ContainerData::new("sha256:web").with_fragment("{ env = { X = nil .. 1 } }"),
      )]
      .into(),
      ..Default::default()
    };
    let def = AppDefinition::new(br#"return { containers = { web = {} } }"#)
      .unwrap()
      .with_image_data(images);

    let err = def.resolve().unwrap_err();
    assert!(
      matches!(err, AppDefinitionError::FragmentOverlay { ref workload, .. } if workload.name == "web"),
      "got: {:?}",
      err
    );
  }
}

mod layering {
  use super::*;

  #[test]
  fn later_layer_overrides() {
    let a = container_images(&[("web", "a")]);
    let b = container_images(&[("web", "b")]);

    assert_eq!(aggregate(&[a.clone(), b.clone()]).containers["web"].image, "b");
    assert_eq!(aggregate(&[b.clone(), a.clone()]).containers["web"].image, "a");

    let def = AppDefinition::new(br#"return { containers = { web = {} } }"#)
      .unwrap()
      .with_image_data(a)
      .with_image_data(b);
    assert_eq!(def.resolve().unwrap().containers["web"].image, "b");
  }

  #[test]
  fn clearing_returns_what_was_held() {
    let def = AppDefinition::new(br#"return { containers = { web = { image = "nginx" } } }"#)
      .unwrap()
      .with_image_data(container_images(&[("web", "sha256:web")]));

    let (cleared, held) = def.clear_image_data();
    assert!(!cleared.has_image_data());
    assert_eq!(held.unwrap().containers["web"].image, "sha256:web");
    assert_eq!(cleared.resolve().unwrap().containers["web"].image, "nginx");
    assert!(def.has_image_data());
  }

  #[test]
  fn fragment_overlays_the_record() {
    let images = ImagesData {
      containers: [(
        "web".to_string(),
        ContainerData::new("sha256:web").with_fragment(r#"{ env = { SERVICE = serviceName, IMAGE = base.image } }"#),
      )]
      .into(),
      ..Default::default()
    };
    let def = AppDefinition::new(br#"return { containers = { web = { image = "nginx", env = { KEEP = "1" } } } }"#)
      .unwrap()
      .with_image_data(images);

    let web = &def.resolve().unwrap().containers["web"];
    assert_eq!(web.image, "sha256:web");
    assert_eq!(web.env["KEEP"], "1");
    assert_eq!(web.env["SERVICE"], "web");
    assert_eq!(web.env["IMAGE"], "nginx");
  }
}

mod propagation {
  use super::*;

  #[test]
  fn base_image_follows_the_latest_pass() {
    let (first_image, first_build) = assign_image("", None, "img:1");
    assert_eq!(first_build.base_image, "img:1");

    let (second_image, second_build) = assign_image(&first_image, Some(first_build), "img:2");
    assert_eq!(second_image, "img:2");
    assert_eq!(second_build.base_image, "img:2");
  }

  #[test]
  fn resolved_spec_can_be_resolved_again() {
    let first = AppDefinition::new(br#"return { containers = { web = {} } }"#)
      .unwrap()
      .with_image_data(container_images(&[("web", "img:1")]))
      .resolve()
      .unwrap();
    let web = &first.containers["web"];
    let base = web.build.as_ref().map(|b| b.base_image.clone()).unwrap_or_default();
    assert_eq!(base, "img:1");

    let source = format!(
      r#"return {{ containers = {{ web = {{ image = "{}", build = {{ context = ".", baseImage = "{}" }} }} }} }}"#,
      web.image, base
    );
    let second = AppDefinition::new(source.as_bytes())
      .unwrap()
      .with_image_data(container_images(&[("web", "img:2")]))
      .resolve()
      .unwrap();

    let web = &second.containers["web"];
    assert_eq!(web.image, "img:2");
    assert_eq!(web.build.as_ref().unwrap().base_image, "img:2");
  }
}
