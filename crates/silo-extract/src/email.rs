//! Email extractor.
//!
//! EML and MBOX parse through mail-parser; message bodies merge into the
//! returned content while attachments are written to a staging directory
//! for re-ingestion. Attachment names are repaired from magic bytes so a
//! PDF named `attachment.dat` dispatches to the PDF extractor.
//! Outlook MSG and PST need an OLE backend and report a missing
//! dependency.

use crate::staging::unique_extraction_dir;
use crate::Extractor;
use anyhow::{Context, Result};
use mail_parser::{Address, Message, MessageParser, MimeHeaders};
use silo_core::{magic, meta::sanitize_file_name, EmailMessage, ExtractedContent, FileMeta, SiloError};
use std::path::{Path, PathBuf};

/// Extractor for email containers.
#[derive(Debug, Clone)]
pub struct EmailExtractor {
    extraction_root: PathBuf,
}

impl EmailExtractor {
    /// Create an email extractor staging attachments under
    /// `extraction_root`.
    #[must_use]
    pub fn new(extraction_root: PathBuf) -> Self {
        Self { extraction_root }
    }
}

impl Extractor for EmailExtractor {
    fn extract(&self, meta: &FileMeta) -> ExtractedContent {
        let result = match meta.extension.as_str() {
            "eml" => self.read_eml(meta),
            "mbox" => self.read_mbox(meta),
            "msg" | "pst" => Err(anyhow::Error::new(SiloError::MissingDependency(format!(
                "no OLE backend for .{} mail stores",
                meta.extension
            )))),
            other => Err(anyhow::Error::new(SiloError::UnsupportedType(other.to_string()))),
        };
        match result {
            Ok(content) => content,
            Err(e) => ExtractedContent::Failed {
                error: match e.downcast::<SiloError>() {
                    Ok(err) => err,
                    Err(other) => SiloError::classify(other.to_string()),
                },
            },
        }
    }

    fn extensions(&self) -> &'static [&'static str] {
        silo_core::FormatGroup::Email.extensions()
    }
}

impl EmailExtractor {
    fn read_eml(&self, meta: &FileMeta) -> Result<ExtractedContent> {
        let bytes = std::fs::read(&meta.path)?;
        let message = MessageParser::default()
            .parse(&bytes)
            .context("unparseable eml message")?;
        anyhow::ensure!(
            !message.headers().is_empty(),
            "no message headers found in {}",
            meta.name
        );

        let parsed = convert_message(&message);
        let staging = unique_extraction_dir(&self.extraction_root, &meta.path)?;
        let attachment_count = write_attachments(&message, &staging)?;

        Ok(ExtractedContent::Email {
            messages: vec![parsed],
            attachments_dir: Some(staging),
            attachment_count,
        })
    }

    fn read_mbox(&self, meta: &FileMeta) -> Result<ExtractedContent> {
        let file = std::fs::File::open(&meta.path)?;
        let reader = std::io::BufReader::new(file);
        let staging = unique_extraction_dir(&self.extraction_root, &meta.path)?;

        let mut messages = Vec::new();
        let mut attachment_count = 0;
        for entry in mail_parser::mailbox::mbox::MessageIterator::new(reader) {
            let entry = entry.map_err(|_| anyhow::anyhow!("malformed mbox entry"))?;
            let contents = entry.unwrap_contents();
            if let Some(message) = MessageParser::default().parse(&contents) {
                messages.push(convert_message(&message));
                attachment_count += write_attachments(&message, &staging)?;
            }
        }
        anyhow::ensure!(!messages.is_empty(), "mbox contains no parseable messages");

        Ok(ExtractedContent::Email {
            messages,
            attachments_dir: Some(staging),
            attachment_count,
        })
    }
}

fn convert_message(message: &Message<'_>) -> EmailMessage {
    let mut body_parts = Vec::new();
    for index in 0..message.text_body_count() {
        if let Some(text) = message.body_text(index) {
            let text = text.trim().to_string();
            if !text.is_empty() {
                body_parts.push(text);
            }
        }
    }

    EmailMessage {
        from: format_address(message.from()),
        to: format_address(message.to()),
        cc: format_address(message.cc()),
        bcc: format_address(message.bcc()),
        subject: message.subject().unwrap_or_default().to_string(),
        date: message.date().map(ToString::to_string).unwrap_or_default(),
        message_id: message.message_id().unwrap_or_default().to_string(),
        body: body_parts.join("\n"),
    }
}

fn format_address(address: Option<&Address<'_>>) -> String {
    let Some(address) = address else {
        return String::new();
    };
    address
        .iter()
        .map(|addr| {
            let email = addr.address().unwrap_or_default();
            match addr.name() {
                Some(name) if !name.is_empty() => format!("{name} <{email}>"),
                _ => email.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Write every attachment into the staging directory with a sanitized,
/// magic-byte-corrected name. Returns the number written.
fn write_attachments(message: &Message<'_>, staging: &Path) -> Result<usize> {
    let mut written = 0;
    for part in message.attachments() {
        let contents = part.contents();
        if contents.is_empty() {
            continue;
        }
        let raw_name = part.attachment_name().unwrap_or("attachment");
        let name = magic::corrected_file_name(&sanitize_file_name(raw_name), contents);

        // Never collide inside one staging directory.
        let mut target = staging.join(&name);
        let mut counter = 1;
        while target.exists() {
            let path = Path::new(&name);
            let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
            let ext = path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default();
            target = staging.join(format!("{stem}_{counter}{ext}"));
            counter += 1;
        }
        std::fs::write(&target, contents)
            .with_context(|| format!("cannot stage attachment: {}", target.display()))?;
        written += 1;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_EML: &str = "From: Alice <alice@example.com>\r\n\
To: bob@example.com\r\n\
Subject: Quarterly numbers\r\n\
Date: Mon, 15 Jan 2024 10:00:00 +0000\r\n\
Message-ID: <m1@example.com>\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
\r\n\
--XYZ\r\n\
Content-Type: text/plain\r\n\
\r\n\
Numbers attached. Regards, Alice.\r\n\
--XYZ\r\n\
Content-Type: application/octet-stream\r\n\
Content-Disposition: attachment; filename=\"report.dat\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQgZmFrZSBwZGYgYm9keQ==\r\n\
--XYZ--\r\n";

    fn extractor(dir: &tempfile::TempDir) -> EmailExtractor {
        EmailExtractor::new(dir.path().join("staging"))
    }

    #[test]
    fn eml_headers_body_and_attachments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mail.eml");
        std::fs::write(&path, SIMPLE_EML).unwrap();
        let meta = FileMeta::scan(&path).unwrap();

        match extractor(&dir).extract(&meta) {
            ExtractedContent::Email { messages, attachments_dir, attachment_count } => {
                assert_eq!(messages.len(), 1);
                let msg = &messages[0];
                assert!(msg.from.contains("alice@example.com"));
                assert_eq!(msg.subject, "Quarterly numbers");
                assert!(msg.body.contains("Numbers attached"));
                assert_eq!(attachment_count, 1);

                // The .dat attachment starts with %PDF and gets renamed.
                let staged = attachments_dir.unwrap();
                assert!(staged.join("report.pdf").is_file());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn msg_reports_missing_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.msg");
        std::fs::write(&path, b"\xD0\xCF\x11\xE0fake").unwrap();
        let meta = FileMeta::scan(&path).unwrap();
        match extractor(&dir).extract(&meta) {
            ExtractedContent::Failed { error } => {
                assert_eq!(error.kind(), silo_core::ErrorKind::MissingDependency);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unparseable_eml_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.eml");
        std::fs::write(&path, [0u8, 159, 146, 150]).unwrap();
        let meta = FileMeta::scan(&path).unwrap();
        assert!(extractor(&dir).extract(&meta).is_failed());
    }
}
