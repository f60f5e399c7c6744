use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};

use log::{debug, info};

use crate::error::{AuditError, Result};

/// A plain-text message handed to a [`MailTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub subject: String,
    pub recipients: Vec<String>,
    pub body: String,
}

/// Something that can deliver a [`MailMessage`].
pub trait MailTransport {
    /// # Errors
    ///
    /// Returns [`AuditError::Delivery`] if the message was not accepted.
    fn send(&self, message: &MailMessage) -> Result<()>;
}

/// Delivers mail through the host's `mail`-compatible program.
///
/// The program is spawned directly as
/// `<program> -s <subject> <recipient>...` with the body on stdin. No shell
/// is involved, so subject and body text are passed through verbatim.
#[derive(Debug, Clone)]
pub struct LocalMailCommand {
    program: String,
}

impl LocalMailCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl MailTransport for LocalMailCommand {
    fn send(&self, message: &MailMessage) -> Result<()> {
        if message.recipients.is_empty() {
            return Err(AuditError::Delivery("no recipients".to_string()));
        }

        let mut command = Command::new(&self.program);
        command
            .arg("-s")
            .arg(&message.subject)
            .args(&message.recipients)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        debug!("Running {command:?}");

        let mut child = command
            .spawn()
            .map_err(|e| AuditError::Delivery(format!("failed to run `{}`: {e}", self.program)))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A program that exits without reading its input is judged by its
            // exit status below.
            match stdin.write_all(message.body.as_bytes()) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
                Err(e) => return Err(AuditError::Delivery(e.to_string())),
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| AuditError::Delivery(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AuditError::Delivery(format!(
                "`{}` exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        info!(
            "Mail \"{}\" sent to {}",
            message.subject,
            message.recipients.join(", ")
        );
        Ok(())
    }
}
