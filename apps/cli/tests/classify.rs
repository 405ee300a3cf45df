//! Exit status and stdout contract of `injuryclass classify`.

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

const MISSING_MODEL: &str = "/nonexistent/injuryclass/modelo.json";

fn classify(args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_injuryclass"));
    cmd.arg("classify")
        .args(args)
        .args(["--model", MISSING_MODEL])
        .env("RUST_LOG", "off")
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    cmd
}

#[test]
fn no_argument_answers_without_waiting_for_stdin() {
    let mut child = classify(&[]).stdin(Stdio::piped()).spawn().unwrap();
    // Keep the write end open for the whole run.
    let stdin = child.stdin.take();

    let deadline = Instant::now() + Duration::from_secs(20);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() > deadline {
            let _ = child.kill();
            panic!("classify without a record did not exit while stdin stayed open");
        }
        std::thread::sleep(Duration::from_millis(50));
    };
    drop(stdin);

    let mut stdout = String::new();
    child.stdout.take().unwrap().read_to_string(&mut stdout).unwrap();
    assert!(status.success());
    assert_eq!(stdout, "Otra lesión\n");
}

#[test]
fn malformed_payload_prints_default_label() {
    let output = classify(&["not valid json"]).stdin(Stdio::null()).output().unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "Otra lesión\n");
}

#[test]
fn dash_reads_record_from_stdin() {
    let mut child = classify(&["-"]).stdin(Stdio::piped()).spawn().unwrap();
    {
        use std::io::Write;
        let mut stdin = child.stdin.take().unwrap();
        stdin.write_all(br#"{"edad": 22, "nivel": "Amateur"}"#).unwrap();
    }
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 1);
    assert_eq!(stdout, "Otra lesión\n");
}
