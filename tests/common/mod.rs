#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

pub fn spawn_sidecar(args: &[&str]) -> Sidecar {
    let exe = env!("CARGO_BIN_EXE_educonnectd");
    let mut child = Command::new(exe)
        .args(args)
        .env_remove("EDUCONNECT_WORKSPACE")
        .env_remove("EDUCONNECT_REQUIRE_EMAIL_CONFIRMATION")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn educonnectd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin,
        reader: BufReader::new(stdout),
        next_id: 0,
    }
}

impl Sidecar {
    pub fn send_raw(&mut self, line: &str) -> serde_json::Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response");
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    pub fn request(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({ "id": id, "method": method, "params": params });
        let value = self.send_raw(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn request_ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert!(
            value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
            "{} failed: {}",
            method,
            value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error")
        );
        value.get("result").cloned().unwrap_or_else(|| json!({}))
    }

    /// Expects a failure and returns the error object.
    pub fn request_err(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value.get("error").cloned().expect("error object")
    }

    pub fn select_workspace(&mut self, prefix: &str) -> PathBuf {
        let workspace = temp_dir(prefix);
        self.request_ok(
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        workspace
    }

    pub fn sign_up_and_in(&mut self, email: &str, role: &str) -> serde_json::Value {
        self.request_ok(
            "auth.signUp",
            json!({
                "email": email,
                "password": "secret1",
                "displayName": "Prof. Lima",
                "role": role,
            }),
        );
        self.request_ok(
            "auth.signIn",
            json!({ "email": email, "password": "secret1" }),
        )
    }

    pub fn create_class(&mut self, name: &str) -> String {
        let created = self.request_ok("classes.create", json!({ "name": name }));
        created["classId"].as_str().expect("classId").to_string()
    }

    pub fn create_student(&mut self, class_id: &str, name: &str, code: &str) -> String {
        let created = self.request_ok(
            "students.create",
            json!({ "name": name, "enrollmentCode": code, "classId": class_id }),
        );
        created["studentId"].as_str().expect("studentId").to_string()
    }

    pub fn add_grade(&mut self, student_id: &str, value: f64, date: &str) -> String {
        let created = self.request_ok(
            "grades.create",
            json!({
                "studentId": student_id,
                "value": value,
                "evaluatedOn": date,
                "kind": "exam",
            }),
        );
        created["gradeId"].as_str().expect("gradeId").to_string()
    }

    pub fn shutdown(mut self) {
        drop(self.stdin);
        let _ = self.child.wait();
    }
}
