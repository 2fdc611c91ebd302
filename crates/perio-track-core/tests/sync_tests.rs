//! Sheet webhook tests against a loopback HTTP stub.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use perio_track_core::db::{Database, OutboxStore};
use perio_track_core::models::NewPatient;
use perio_track_core::sync::{SheetConfig, SummarySink, SyncError};
use perio_track_core::{
    open_clinic, Clinic, ClinicError, Delivery, FfiConfig, FfiNewPatient, PerioTrackError,
    SheetWebhook,
};

/// Read one HTTP request; returns its head and body.
fn read_request(stream: &TcpStream) -> (String, Vec<u8>) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());

    let mut head = String::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
            content_length = value.trim().parse().unwrap();
        }
        let done = line == "\r\n";
        head.push_str(&line);
        if done {
            break;
        }
    }
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).unwrap();
    (head, body)
}

/// Answer each incoming request with the next status line after `delay`;
/// request bodies are sent back through the channel.
fn serve_after(status_lines: Vec<&'static str>, delay: Duration) -> (String, mpsc::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for status_line in status_lines {
            let (mut stream, _) = listener.accept().unwrap();
            let (_head, body) = read_request(&stream);
            thread::sleep(delay);

            let response = format!(
                "HTTP/1.1 {}\r\nLocation: http://127.0.0.1:1/echo\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                status_line
            );
            stream.write_all(response.as_bytes()).unwrap();
            tx.send(String::from_utf8_lossy(&body).into_owned()).ok();
        }
    });

    (format!("http://{}/exec", addr), rx)
}

fn serve(status_lines: Vec<&'static str>) -> (String, mpsc::Receiver<String>) {
    serve_after(status_lines, Duration::ZERO)
}

fn webhook(url: &str) -> SheetWebhook {
    SheetWebhook::new(&SheetConfig {
        webhook_url: Some(url.to_string()),
        timeout_secs: 5,
    })
    .unwrap()
}

fn clinic_with_patient() -> (Clinic<Database>, String) {
    let mut clinic = Clinic::open(Database::open_in_memory().unwrap()).unwrap();
    clinic.sign_up("Sato", "secret-pw").unwrap();
    let id = clinic
        .register_patient(NewPatient {
            patient_id: "P1".into(),
            name: "Taro".into(),
            birth_date: "1990-01-01".into(),
            profile_notes: String::new(),
        })
        .unwrap()
        .unwrap();
    (clinic, id)
}

#[test]
fn test_success_is_acknowledged() {
    let (url, rx) = serve(vec!["200 OK"]);
    let (clinic, id) = clinic_with_patient();

    let delivery = clinic.sync_patient(&id, &webhook(&url)).unwrap();
    assert_eq!(delivery, Delivery::Acknowledged { status: 200 });

    let body: serde_json::Value = serde_json::from_str(&rx.recv().unwrap()).unwrap();
    assert_eq!(body["patientId"], "P1");
    assert_eq!(body["name"], "Taro");
    assert_eq!(body["progress"], "0/8");
    assert_eq!(body["currentStatus"], "歯周精密検査 (1回目)");
    assert!(clinic.store().pending().unwrap().is_empty());
}

#[test]
fn test_redirect_counts_as_sent_and_is_not_followed() {
    let (url, _rx) = serve(vec!["302 Found"]);
    let (clinic, id) = clinic_with_patient();

    let delivery = clinic.sync_patient(&id, &webhook(&url)).unwrap();
    assert_eq!(delivery, Delivery::Sent { status: 302 });
    assert!(!delivery.is_acknowledged());
}

#[test]
fn test_rejection_is_queued_and_retried() {
    let (url, _rx) = serve(vec!["500 Internal Server Error", "200 OK"]);
    let (clinic, id) = clinic_with_patient();
    let sink = webhook(&url);

    let err = clinic.sync_patient(&id, &sink).unwrap_err();
    assert!(matches!(err, ClinicError::Sync(SyncError::Rejected { status: 500 })));

    let pending = clinic.store().pending().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].patient_id, id);
    assert!(pending[0].last_error.as_deref().unwrap_or_default().contains("500"));

    let report = clinic.retry_outbox(&sink).unwrap();
    assert_eq!(report.delivered, 1);
    assert!(clinic.store().pending().unwrap().is_empty());
}

#[test]
fn test_unconfigured_webhook_is_not_queued() {
    let (clinic, id) = clinic_with_patient();
    let sink = SheetWebhook::new(&SheetConfig::default()).unwrap();

    assert!(matches!(sink.deliver("{}"), Err(SyncError::NotConfigured)));
    let err = clinic.sync_patient(&id, &sink).unwrap_err();
    assert!(matches!(err, ClinicError::Sync(SyncError::NotConfigured)));
    assert!(clinic.store().pending().unwrap().is_empty());
}

#[test]
fn test_ffi_sync_through_configured_webhook() {
    let (url, rx) = serve(vec!["200 OK"]);
    let dir = tempfile::tempdir().unwrap();

    let core = open_clinic(FfiConfig {
        database_path: dir.path().join("clinic.db").to_string_lossy().into_owned(),
        api_key: None,
        model: None,
        webhook_url: Some(url),
    })
    .unwrap();
    core.sign_up("Sato".into(), "secret-pw".into()).unwrap();
    let id = core
        .register_patient(FfiNewPatient {
            patient_id: "P9".into(),
            name: "Hanako".into(),
            birth_date: String::new(),
            profile_notes: String::new(),
        })
        .unwrap()
        .unwrap();

    let delivery = core.sync_patient(id).unwrap();
    assert!(delivery.acknowledged);
    assert_eq!(delivery.status, 200);
    assert!(rx.recv().unwrap().contains("\"patientId\":\"P9\""));

    let err = core.sync_patient("missing".into()).unwrap_err();
    assert!(matches!(err, PerioTrackError::NotFound(_)));
}

#[test]
fn test_slow_sync_does_not_block_other_calls() {
    let (url, _rx) = serve_after(vec!["200 OK"], Duration::from_millis(1500));
    let dir = tempfile::tempdir().unwrap();

    let core = open_clinic(FfiConfig {
        database_path: dir.path().join("clinic.db").to_string_lossy().into_owned(),
        api_key: None,
        model: None,
        webhook_url: Some(url),
    })
    .unwrap();
    core.sign_up("Sato".into(), "secret-pw".into()).unwrap();
    let id = core
        .register_patient(FfiNewPatient {
            patient_id: "P1".into(),
            name: "Taro".into(),
            birth_date: String::new(),
            profile_notes: String::new(),
        })
        .unwrap()
        .unwrap();

    let syncing = {
        let core = core.clone();
        let id = id.clone();
        thread::spawn(move || core.sync_patient(id))
    };
    thread::sleep(Duration::from_millis(200));

    let started = Instant::now();
    assert_eq!(core.list_patients().unwrap().len(), 1);
    let step = core.get_patient(id.clone()).unwrap().unwrap().steps[0].id.clone();
    assert!(core.update_step(id, step, None, Some("PD 4mm".into())).unwrap());
    assert!(started.elapsed() < Duration::from_millis(800));

    assert!(syncing.join().unwrap().unwrap().acknowledged);
}
