//! Password-store (pass) secret back end.
//!
//! Shells out to the `pass` binary. Values are stored base64-encoded as
//! single-line entries under a configurable prefix (default `aws-vault`),
//! so arbitrary byte strings survive pass's line-oriented format.
//! Enumeration walks the password-store directory rather than scraping
//! `pass ls` output.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use super::{StoreError, escape_key, unescape_key};

const PASS_PREFIX_ENV: &str = "AWS_VAULT_PASS_PREFIX";
const PASS_CMD_ENV: &str = "AWS_VAULT_PASS_CMD";

const DEFAULT_PREFIX: &str = "aws-vault";

pub struct PassStore {
    prefix: String,
    pass_cmd: String,
}

impl PassStore {
    pub fn new(prefix: Option<&str>, pass_cmd: Option<&str>) -> Self {
        let prefix = prefix
            .map(str::to_string)
            .or_else(|| std::env::var(PASS_PREFIX_ENV).ok())
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string());
        let pass_cmd = pass_cmd
            .map(str::to_string)
            .or_else(|| std::env::var(PASS_CMD_ENV).ok())
            .unwrap_or_else(|| "pass".to_string());
        Self { prefix, pass_cmd }
    }

    fn entry_path(&self, key: &str) -> String {
        format!("{}/{}", self.prefix, escape_key(key))
    }

    fn store_dir(&self) -> Option<PathBuf> {
        std::env::var("PASSWORD_STORE_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".password-store")))
    }

    fn run(&self, args: &[&str], stdin: Option<&[u8]>) -> Result<Vec<u8>, StoreError> {
        let mut cmd = Command::new(&self.pass_cmd);
        cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());
        if stdin.is_some() {
            cmd.stdin(Stdio::piped());
        }
        let mut child = cmd
            .spawn()
            .map_err(|e| StoreError::Unavailable(format!("running {}: {}", self.pass_cmd, e)))?;
        if let Some(input) = stdin {
            use std::io::Write;
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input)
                    .map_err(|e| StoreError::Other(e.to_string()))?;
            }
        }
        let output = child
            .wait_with_output()
            .map_err(|e| StoreError::Other(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("is not in the password store") {
                return Err(StoreError::NotFound);
            }
            if stderr.contains("gpg") && stderr.contains("decryption failed") {
                return Err(StoreError::Locked(stderr.trim().to_string()));
            }
            return Err(StoreError::Other(format!(
                "{} {} failed: {}",
                self.pass_cmd,
                args.first().unwrap_or(&""),
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }

    pub fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let stdout = self.run(&["show", &self.entry_path(key)], None)?;
        let text = String::from_utf8_lossy(&stdout);
        let first_line = text.lines().next().unwrap_or("").trim();
        decode_base64(first_line)
            .ok_or_else(|| StoreError::Integrity(format!("entry for '{}' is not base64", key)))
    }

    pub fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut body = encode_base64(value);
        body.push('\n');
        self.run(
            &["insert", "-m", "-f", &self.entry_path(key)],
            Some(body.as_bytes()),
        )
        .map(|_| ())
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        // `pass rm` exits nonzero with a "not in the password store" message
        // when the entry is missing, which run() maps to NotFound.
        self.run(&["rm", "-f", &self.entry_path(key)], None).map(|_| ())
    }

    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        let Some(dir) = self.store_dir() else {
            return Err(StoreError::Unavailable(
                "cannot locate the password store directory".into(),
            ));
        };
        let prefix_dir = dir.join(&self.prefix);
        if !prefix_dir.exists() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        let entries =
            std::fs::read_dir(&prefix_dir).map_err(|e| StoreError::Other(e.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::Other(e.to_string()))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(stem) = name.strip_suffix(".gpg")
                && let Some(key) = unescape_key(stem)
            {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

fn encode_base64(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(data)
}

fn decode_base64(text: &str) -> Option<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(text).ok()
}
