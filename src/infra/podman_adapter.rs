use crate::domain::native::{NativeHistoryLayer, NativeImage, NativeImageDetail};
use crate::domain::{CallContext, EngineError, ImageEngine, PullOptions, RegistryCredentials};
use serde::de::DeserializeOwned;
use std::ffi::OsString;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How to reach the podman engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEndpoint {
    pub program: String,
    /// Remote service URL, e.g. `unix:///run/podman/podman.sock` or `ssh://host/run/...`
    pub url: Option<String>,
    /// Named system connection (`podman system connection list`)
    pub connection: Option<String>,
    /// SSH identity for remote URLs
    pub identity: Option<PathBuf>,
}

impl Default for EngineEndpoint {
    fn default() -> Self {
        Self {
            program: "podman".to_string(),
            url: None,
            connection: None,
            identity: None,
        }
    }
}

impl EngineEndpoint {
    fn global_args(&self) -> Vec<OsString> {
        let mut args = Vec::new();

        if let Some(url) = &self.url {
            args.push("--remote".into());
            args.push("--url".into());
            args.push(url.into());
        } else if let Some(connection) = &self.connection {
            args.push("--connection".into());
            args.push(connection.into());
        }

        if let Some(identity) = &self.identity {
            args.push("--identity".into());
            args.push(identity.into());
        }

        args
    }
}

/// `ImageEngine` that drives the podman CLI, local or remote
#[derive(Debug, Clone, Default)]
pub struct PodmanAdapter {
    endpoint: EngineEndpoint,
}

impl PodmanAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(endpoint: EngineEndpoint) -> Self {
        Self { endpoint }
    }

    pub fn endpoint(&self) -> &EngineEndpoint {
        &self.endpoint
    }

    /// Whether the engine binary answers `--version`
    pub fn is_available(&self) -> bool {
        Command::new(&self.endpoint.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn podman(&self, ctx: &CallContext, args: Vec<OsString>) -> Result<Vec<u8>, EngineError> {
        let endpoint = &self.endpoint;
        let output = run_bounded(ctx, &endpoint.program, endpoint.global_args(), args)?;
        ensure_success(&output)?;
        Ok(output.stdout)
    }

    fn podman_json<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        what: &'static str,
        args: Vec<OsString>,
    ) -> Result<Vec<T>, EngineError> {
        let stdout = self.podman(ctx, args)?;
        decode_list(what, &stdout)
    }
}

impl ImageEngine for PodmanAdapter {
    fn pull(
        &self,
        ctx: &CallContext,
        options: &PullOptions<'_>,
        auth: &RegistryCredentials,
    ) -> Result<(), EngineError> {
        let mut args: Vec<OsString> = vec!["pull".into(), "--quiet".into()];

        if !options.platform.trim().is_empty() {
            args.push("--platform".into());
            args.push(options.platform.into());
        }

        args.extend(creds_args(auth));

        args.push(options.reference().into());

        self.podman(ctx, args).map(|_| ())
    }

    fn list_images(
        &self,
        ctx: &CallContext,
        include_all: bool,
    ) -> Result<Vec<NativeImage>, EngineError> {
        let mut args: Vec<OsString> = vec!["images".into()];
        if include_all {
            args.push("--all".into());
        }
        args.push("--format".into());
        args.push("json".into());

        self.podman_json(ctx, "lista de imagens", args)
    }

    fn inspect_image(
        &self,
        ctx: &CallContext,
        id: &str,
    ) -> Result<NativeImageDetail, EngineError> {
        let args: Vec<OsString> = vec![
            "image".into(),
            "inspect".into(),
            "--format".into(),
            "json".into(),
            id.into(),
        ];

        let mut records: Vec<NativeImageDetail> =
            self.podman_json(ctx, "inspeção de imagem", args)?;

        if records.is_empty() {
            return Err(EngineError::failed(format!("no such image: {id}")));
        }

        Ok(records.swap_remove(0))
    }

    fn remove_image(&self, ctx: &CallContext, id: &str) -> Result<(), EngineError> {
        self.podman(ctx, vec!["rmi".into(), id.into()]).map(|_| ())
    }

    fn image_history(
        &self,
        ctx: &CallContext,
        name: &str,
    ) -> Result<Vec<NativeHistoryLayer>, EngineError> {
        let args: Vec<OsString> = vec![
            "history".into(),
            "--no-trunc".into(),
            "--format".into(),
            "json".into(),
            name.into(),
        ];

        self.podman_json(ctx, "histórico de imagem", args)
    }
}

/// `--creds user:password` for podman. The value is visible in the process table while the
/// pull runs. Without a password podman would prompt on a closed stdin, so the pull goes
/// out anonymously instead.
fn creds_args(auth: &RegistryCredentials) -> Vec<OsString> {
    if auth.is_anonymous() {
        return Vec::new();
    }

    if auth.password().is_empty() {
        warn!(
            "Usuário de registry {} sem senha configurada; pull será anônimo",
            auth.username
        );
        return Vec::new();
    }

    if !auth.email.is_empty() {
        debug!("podman não usa email de registry ({})", auth.email);
    }

    vec![
        "--creds".into(),
        format!("{}:{}", auth.username, auth.password()).into(),
    ]
}

struct BoundedOutput {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// Runs the program until it exits, the context is cancelled, or its deadline passes.
/// The child is killed in the last two cases.
fn run_bounded(
    ctx: &CallContext,
    program: &str,
    global_args: Vec<OsString>,
    args: Vec<OsString>,
) -> Result<BoundedOutput, EngineError> {
    ctx.check()?;

    debug!("executando {} {:?}", program, redact(&args));

    let mut child = Command::new(program)
        .args(global_args)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| EngineError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(source) => {
                kill(&mut child, program);
                return Err(EngineError::Spawn {
                    program: program.to_string(),
                    source,
                });
            }
        }

        if let Err(err) = ctx.check() {
            warn!("interrompendo {}: {}", program, err);
            kill(&mut child, program);
            return Err(err);
        }

        let nap = ctx
            .remaining()
            .map(|left| left.min(POLL_INTERVAL))
            .unwrap_or(POLL_INTERVAL);
        thread::sleep(nap);
    };

    Ok(BoundedOutput {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut reader| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = reader.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

fn kill(child: &mut Child, program: &str) {
    if let Err(e) = child.kill() {
        warn!("não foi possível encerrar {}: {}", program, e);
    }
    let _ = child.wait();
}

fn ensure_success(output: &BoundedOutput) -> Result<(), EngineError> {
    if output.status.success() {
        return Ok(());
    }

    Err(EngineError::Failed {
        status: output.status.code(),
        message: engine_message(&output.stderr),
    })
}

/// Progress and log lines podman writes to stderr even when the command fails
const STDERR_NOISE: &[&str] = &[
    "time=",
    "Trying to pull ",
    "Resolving \"",
    "Getting image source signatures",
    "Copying blob ",
    "Copying config ",
    "Writing manifest ",
    "Storing signatures",
];

/// Full stderr report starting at the `Error: ` line, with that prefix and progress noise removed.
/// Multi-registry failures keep one ` * ...` line per registry.
fn engine_message(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .filter(|l| !STDERR_NOISE.iter().any(|n| l.trim_start().starts_with(n)))
        .collect();

    let start = lines
        .iter()
        .position(|l| error_prefix(l).is_some())
        .unwrap_or(0);

    let Some((first, rest)) = lines[start..].split_first() else {
        return "engine retornou erro sem mensagem".to_string();
    };

    let mut message = error_prefix(first).unwrap_or(first.trim()).to_string();
    for line in rest {
        message.push('\n');
        message.push_str(line);
    }
    message
}

fn error_prefix(line: &str) -> Option<&str> {
    let line = line.trim();
    line.strip_prefix("Error: ")
        .or_else(|| line.strip_prefix("error: "))
}

fn decode_list<T: DeserializeOwned>(
    what: &'static str,
    stdout: &[u8],
) -> Result<Vec<T>, EngineError> {
    let text = String::from_utf8_lossy(stdout);
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }

    serde_json::from_str(trimmed).map_err(|e| EngineError::Decode {
        what,
        message: e.to_string(),
    })
}

fn redact(args: &[OsString]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    let mut hide_next = false;

    for arg in args {
        let arg = arg.to_string_lossy();
        if hide_next {
            let user = arg.split(':').next().unwrap_or_default();
            out.push(format!("{user}:***"));
            hide_next = false;
            continue;
        }
        hide_next = arg == "--creds";
        out.push(arg.into_owned());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use crate::services::classifier::{ClassifierPolicy, Operation, classify};
    use std::time::Instant;

    #[test]
    fn global_args_for_remote_url() {
        let endpoint = EngineEndpoint {
            url: Some("ssh://core@host/run/podman/podman.sock".into()),
            identity: Some(PathBuf::from("/keys/id_ed25519")),
            ..Default::default()
        };

        let args: Vec<String> = endpoint
            .global_args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            args,
            vec![
                "--remote",
                "--url",
                "ssh://core@host/run/podman/podman.sock",
                "--identity",
                "/keys/id_ed25519"
            ]
        );
    }

    #[test]
    fn local_endpoint_has_no_global_args() {
        assert!(EngineEndpoint::default().global_args().is_empty());
    }

    #[test]
    fn engine_message_strips_prefix() {
        let stderr = b"Trying to pull...\nError: nonexistent-id-1234: image not known\n";
        assert_eq!(engine_message(stderr), "nonexistent-id-1234: image not known");
    }

    fn short_name_pull_stderr() -> String {
        [
            "Resolving \"foo\" using unqualified-search registries",
            "Trying to pull registry.fedoraproject.org/foo:latest...",
            "time=\"2024-05-02T10:00:00Z\" level=warning msg=\"failed, retrying in 1s\"",
            "Error: 3 errors occurred while pulling:",
            " * initializing source docker://registry.fedoraproject.org/foo:latest: \
             reading manifest latest in registry.fedoraproject.org/foo: manifest unknown",
            " * initializing source docker://quay.io/foo:latest: reading manifest latest \
             in quay.io/foo: unauthorized: access to the requested resource is not authorized",
            " * initializing source docker://docker.io/library/foo:latest: reading manifest \
             latest in docker.io/library/foo: requested access to the resource is denied",
        ]
        .join("\n")
    }

    #[test]
    fn engine_message_keeps_every_registry_failure() {
        let message = engine_message(short_name_pull_stderr().as_bytes());

        let lines: Vec<&str> = message.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "3 errors occurred while pulling:");
        assert!(lines[1].starts_with(" * "));
        assert!(lines[1].ends_with("manifest unknown"));
        assert!(lines[3].ends_with("requested access to the resource is denied"));
        assert!(!message.contains("level=warning"));
        assert!(!message.contains("Trying to pull"));
    }

    #[test]
    fn short_name_pull_of_unknown_image_is_malformed() {
        let err = EngineError::failed(engine_message(short_name_pull_stderr().as_bytes()));

        let classified = classify(Operation::Create, &err, &ClassifierPolicy::default());

        assert_eq!(classified.kind(), ErrorKind::MalformedRequest);
        assert!(classified.message().contains("docker.io/library/foo"));
    }

    #[test]
    fn engine_message_without_error_line_keeps_all_text() {
        let stderr = b"cannot connect to Podman socket\nis the service running?\n";
        assert_eq!(
            engine_message(stderr),
            "cannot connect to Podman socket\nis the service running?"
        );
    }

    #[test]
    fn engine_message_for_silent_failure() {
        assert_eq!(engine_message(b"  \n"), "engine retornou erro sem mensagem");
    }

    #[test]
    fn empty_output_decodes_to_empty_list() {
        let images: Vec<NativeImage> = decode_list("lista", b"\n").unwrap();
        assert!(images.is_empty());
        let images: Vec<NativeImage> = decode_list("lista", b"[]").unwrap();
        assert!(images.is_empty());
    }

    #[test]
    fn garbage_output_is_a_decode_error() {
        let result: Result<Vec<NativeImage>, _> = decode_list("lista", b"<html>");
        assert!(matches!(result, Err(EngineError::Decode { .. })));
    }

    #[test]
    fn credentials_are_redacted_in_logs() {
        let args: Vec<OsString> = vec![
            "pull".into(),
            "--creds".into(),
            "dev:hunter2".into(),
            "alpine".into(),
        ];
        let shown = redact(&args);
        assert_eq!(shown, vec!["pull", "--creds", "dev:***", "alpine"]);
    }

    #[test]
    fn creds_flag_only_with_username_and_password() {
        let full = RegistryCredentials::new("dev", "hunter2", "dev@example.com");
        assert_eq!(creds_args(&full), vec!["--creds", "dev:hunter2"]);

        let no_password = RegistryCredentials {
            username: "dev".into(),
            ..Default::default()
        };
        assert!(creds_args(&no_password).is_empty());

        let blank_password = RegistryCredentials::new("dev", "", "");
        assert!(creds_args(&blank_password).is_empty());

        assert!(creds_args(&RegistryCredentials::default()).is_empty());
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let result = run_bounded(
            &CallContext::background(),
            "imagebox-definitely-not-installed",
            vec![],
            vec![],
        );
        assert!(matches!(result, Err(EngineError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn deadline_kills_slow_process() {
        let ctx = CallContext::with_timeout(Duration::from_millis(100));
        let started = Instant::now();

        let result = run_bounded(&ctx, "sleep", vec![], vec!["5".into()]);

        assert!(matches!(result, Err(EngineError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[test]
    fn cancelled_context_never_spawns() {
        let ctx = CallContext::background();
        ctx.cancel_handle().cancel();

        let result = run_bounded(&ctx, "sleep", vec![], vec!["5".into()]);
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }

    #[cfg(unix)]
    #[test]
    fn failing_process_reports_stderr() {
        let ctx = CallContext::with_timeout(Duration::from_secs(10));
        let output = run_bounded(
            &ctx,
            "sh",
            vec![],
            vec!["-c".into(), "echo 'Error: boom' >&2; exit 125".into()],
        )
        .unwrap();

        match ensure_success(&output) {
            Err(EngineError::Failed { status, message }) => {
                assert_eq!(status, Some(125));
                assert_eq!(message, "boom");
            }
            other => panic!("resultado inesperado: {:?}", other),
        }
    }
}
