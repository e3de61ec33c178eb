use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pointcloud_gale_runner::prelude::*;

/// Answer one HTTP request with a fixed response. The request head and body are read in full
/// first so the client sees a clean response rather than a reset connection.
fn respond(mut stream: TcpStream, status_line: &str, body: &str) {
    let mut reader = BufReader::new(stream.try_clone().expect("Failed to clone stream"));

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim_end().to_ascii_lowercase();
        if line.is_empty() {
            break;
        }
        if let Some(value) = line.strip_prefix("content-length:") {
            content_length = value.trim().parse().unwrap_or(0);
        }
    }
    if content_length > 0 {
        let mut request_body = vec![0u8; content_length];
        reader.read_exact(&mut request_body).ok();
    }

    let response = format!(
        "HTTP/1.1 {status_line}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).ok();
}

/// A coordination API stub that answers every request the same way.
fn start_api_stub(status_line: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind API stub");
    let addr = listener.local_addr().expect("API stub has no address");

    std::thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            respond(stream, status_line, body);
        }
    });

    format!("http://{addr}")
}

/// A storage stub that accepts everything and counts how many requests arrived.
fn start_storage_stub() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind storage stub");
    let addr = listener.local_addr().expect("Storage stub has no address");
    let hits = Arc::new(AtomicUsize::new(0));

    let stub_hits = hits.clone();
    std::thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            stub_hits.fetch_add(1, Ordering::SeqCst);
            respond(stream, "200 OK", "");
        }
    });

    (format!("http://{addr}"), hits)
}

fn write_run_files(tag: &str, api_base: &str, storage_base: &str) -> PathBuf {
    let dir = std::env::temp_dir();
    let pid = std::process::id();

    let payload = dir.join(format!("gale-{tag}-{pid}.ply"));
    std::fs::write(&payload, b"ply sample payload").expect("Failed to write payload");

    let config = dir.join(format!("gale-{tag}-{pid}.toml"));
    std::fs::write(
        &config,
        format!(
            r#"
payload = "{}"

[[targets]]
name = "stub"
api_base_url = "{api_base}"
storage_base_url = "{storage_base}"
"#,
            payload.display()
        ),
    )
    .expect("Failed to write configuration");

    config
}

fn stub_cli(config: &Path) -> GaleScenarioCli {
    GaleScenarioCli {
        connection_string: Some(config.display().to_string()),
        clients: Some(1),
        behaviour: vec![],
        duration: Some(10),
        rate: None,
        time_unit_ms: 1000,
        pre_allocate: 50,
        max_in_flight: 2000,
        graceful_stop: 1,
        soak: false,
        no_progress: true,
        reporter: ReporterOpt::Noop,
        run_id: None,
    }
}

fn upload_once(
    ctx: &mut ClientContext<PointcloudRunnerContext, PointcloudClientContext>,
) -> HookResult {
    upload_flow(ctx)?;
    ctx.runner_context().force_stop_scenario();
    Ok(())
}

fn run_upload_scenario(name: &str, config: &Path) -> GaleResult<usize> {
    run(
        ScenarioDefinitionBuilder::<PointcloudRunnerContext, PointcloudClientContext>::new(
            name,
            stub_cli(config),
        )
        .use_setup(load_configuration)
        .use_client_setup(connect_client)
        .use_client_behaviour(upload_once),
    )
}

#[test]
fn a_rejected_reservation_never_reaches_storage() {
    let api_base = start_api_stub("500 Internal Server Error", "");
    let (storage_base, storage_hits) = start_storage_stub();
    let config = write_run_files("rejected", &api_base, &storage_base);

    let result = run_upload_scenario("a_rejected_reservation_never_reaches_storage", &config);

    assert!(result.is_ok());
    assert_eq!(0, storage_hits.load(Ordering::SeqCst));
}

#[test]
fn a_malformed_reservation_never_reaches_storage() {
    // A 200 whose body is missing the object key must abort before any PUT.
    let api_base = start_api_stub("200 OK", r#"{"bucket":"b1"}"#);
    let (storage_base, storage_hits) = start_storage_stub();
    let config = write_run_files("malformed", &api_base, &storage_base);

    let result = run_upload_scenario("a_malformed_reservation_never_reaches_storage", &config);

    assert!(result.is_ok());
    assert_eq!(0, storage_hits.load(Ordering::SeqCst));
}

#[test]
fn a_valid_reservation_is_uploaded_to_storage() {
    // Control case proving the stubs observe the PUT when the gate opens.
    let api_base = start_api_stub("200 OK", r#"{"bucket":"b1","object_key":"u/k.ply"}"#);
    let (storage_base, storage_hits) = start_storage_stub();
    let config = write_run_files("valid", &api_base, &storage_base);

    let result = run_upload_scenario("a_valid_reservation_is_uploaded_to_storage", &config);

    assert!(result.is_ok());
    assert_eq!(1, storage_hits.load(Ordering::SeqCst));
}
