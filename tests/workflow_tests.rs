//! Full pull → list → inspect → history → rm flow through the podman adapter,
//! driven against a scripted stand-in for the podman binary.
#![cfg(unix)]

use anyhow::Result;
use imagebox::domain::{ErrorKind, RegistryCredentials};
use imagebox::infra::config::StaticCredentials;
use imagebox::infra::{EngineEndpoint, PodmanAdapter};
use imagebox::test_support::RecordingTracer;
use imagebox::{CallContext, ImagePullRequest, ImageService};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const FAKE_PODMAN: &str = r##"#!/bin/sh
echo "$*" >> "__LOG__"
case "$1" in
  pull)
    echo "sha256:1111"
    ;;
  images)
    cat <<'JSON'
[{"Id":"sha256:1111","RepoTags":["docker.io/library/alpine:3.18"],"Created":1691436020,
  "Size":7626624,"VirtualSize":7626624,"Labels":null,"Containers":0}]
JSON
    ;;
  image)
    if [ "$5" = "alpine:3.18" ]; then
      cat <<'JSON'
[{"Id":"sha256:1111","RepoTags":["docker.io/library/alpine:3.18"],
  "Created":"2023-08-07T19:20:20.894140623Z","Os":"linux","Architecture":"arm64",
  "Size":7626624,"VirtualSize":7626624,"Author":"","Version":"20.10.23"}]
JSON
    else
      echo "Error: $5: image not known" >&2
      exit 125
    fi
    ;;
  history)
    cat <<'JSON'
[{"id":"sha256:1111","created":"2023-08-07T19:20:20Z","CreatedBy":"/bin/sh -c #(nop)  CMD [\"/bin/sh\"]","size":0,"Comment":"","tags":["docker.io/library/alpine:3.18"]},
 {"id":"<missing>","created":"2023-08-07T19:20:19Z","CreatedBy":"/bin/sh -c #(nop) ADD file:abc in / ","size":7626624,"Comment":""}]
JSON
    ;;
  rmi)
    echo "Error: $2: image not known" >&2
    exit 1
    ;;
esac
"##;

fn install_fake_podman(dir: &Path) -> Result<()> {
    let log = dir.join("args.log");
    let script = FAKE_PODMAN.replace("__LOG__", &log.to_string_lossy());
    let path = dir.join("podman");

    fs::write(&path, script)?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

fn logged_calls(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join("args.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

// Kept as a single test: executing a freshly written script while sibling tests fork
// can fail with ETXTBSY.
#[test]
fn test_lifecycle_against_scripted_podman() -> Result<()> {
    let dir = TempDir::new()?;
    install_fake_podman(dir.path())?;

    let endpoint = EngineEndpoint {
        program: dir.path().join("podman").to_string_lossy().into_owned(),
        ..Default::default()
    };
    let tracer = Arc::new(RecordingTracer::new());
    let service = ImageService::new(
        Arc::new(PodmanAdapter::with_endpoint(endpoint)),
        tracer.clone(),
        Arc::new(StaticCredentials::new(RegistryCredentials::new(
            "ci-bot", "tok3n", "",
        ))),
    );
    let ctx = CallContext::background();

    let request =
        ImagePullRequest::new("docker.io/library/alpine", "3.18").with_platform("linux/arm64");
    service.create(&ctx, &request)?;

    let images = service.list(&ctx)?;
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].created_at, 1_691_436_020);
    assert_eq!(images[0].tags, vec!["docker.io/library/alpine:3.18"]);
    assert!(images[0].labels.is_empty());

    let detail = service.inspect(&ctx, "alpine:3.18")?;
    assert_eq!(detail.id, "alpine:3.18");
    assert_eq!(detail.resolved_id, "sha256:1111");
    assert_eq!(detail.architecture, "arm64");
    assert_eq!(detail.engine_version, "20.10.23");
    assert_eq!(detail.created_at.timestamp(), 1_691_436_020);

    let history = service.history(&ctx, "alpine:3.18")?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, "sha256:1111");
    assert_eq!(history[1].id, "<missing>");
    assert!(history.iter().all(|l| l.size >= 0));

    let err = service.inspect(&ctx, "ghost:1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalFailure);
    assert_eq!(err.message(), "ghost:1: image not known");

    let err = service.delete(&ctx, "nonexistent-id-1234").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedRequest);
    assert!(err.message().contains("nonexistent-id-1234"));

    let calls = logged_calls(dir.path());
    assert_eq!(
        calls,
        vec![
            "pull --quiet --platform linux/arm64 --creds ci-bot:tok3n docker.io/library/alpine:3.18",
            "images --all --format json",
            "image inspect --format json alpine:3.18",
            "history --no-trunc --format json alpine:3.18",
            "image inspect --format json ghost:1",
            "rmi nonexistent-id-1234",
        ]
    );

    assert_eq!(tracer.spans().len(), 6);
    Ok(())
}
