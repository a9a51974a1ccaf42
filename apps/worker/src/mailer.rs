//! Export mail delivery
//!
//! [`NotificationSender`] renders a [`PlaylistExport`] into an [`ExportMail`]
//! and hands it to a [`MailTransport`]. Production uses
//! [`SmtpMailTransport`]; tests plug in recording transports.
//!
//! Sends have no timeout and are never retried here. A hanging relay holds
//! up the consumer until the connection gives up.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use openmusic_shared_config::{SmtpConfig, SmtpTls};
use serde::Serialize;

use crate::aggregator::PlaylistExport;
use crate::error::{WorkerError, WorkerResult};

pub const ATTACHMENT_NAME: &str = "playlist.json";

/// One rendered export mail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportMail {
    pub destination: String,
    pub subject: String,
    pub body: String,
    /// `{"playlist": {...}}` document attached as `playlist.json`
    pub attachment_json: String,
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    playlist: &'a PlaylistExport,
}

impl ExportMail {
    pub fn for_playlist(destination: &str, export: &PlaylistExport) -> WorkerResult<Self> {
        let attachment_json = serde_json::to_string(&ExportDocument { playlist: export })?;

        Ok(Self {
            destination: destination.to_string(),
            subject: format!("Playlist export: {}", export.name),
            body: format!(
                "Your export of \"{}\" is attached as {} ({} songs).\n",
                export.name,
                ATTACHMENT_NAME,
                export.songs.len()
            ),
            attachment_json,
        })
    }
}

/// Something that can put an [`ExportMail`] on the wire
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, mail: &ExportMail) -> WorkerResult<()>;
}

/// Sends export mails through an SMTP relay
pub struct SmtpMailTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailTransport {
    pub fn from_config(config: &SmtpConfig) -> WorkerResult<Self> {
        let builder = match config.tls {
            SmtpTls::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| WorkerError::Configuration(format!("SMTP relay: {}", e)))?,
            SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| WorkerError::Configuration(format!("SMTP relay: {}", e)))?,
            SmtpTls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
        };

        let mut builder = builder.port(config.port);
        if let (Some(user), Some(password)) = (&config.user, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        let from: Mailbox = config.from.parse().map_err(|e| {
            WorkerError::Configuration(format!("invalid SMTP_FROM '{}': {}", config.from, e))
        })?;

        tracing::info!(
            host = %config.host,
            port = config.port,
            tls = ?config.tls,
            authenticated = config.has_credentials(),
            "SMTP transport configured"
        );

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    /// Assemble the MIME message: plain-text body plus the JSON attachment
    pub fn build_message(&self, mail: &ExportMail) -> WorkerResult<Message> {
        let to: Mailbox = mail.destination.parse().map_err(|e| {
            WorkerError::InvalidJobData(format!("invalid target email: {}", e))
        })?;

        let json = ContentType::parse("application/json")
            .map_err(|e| WorkerError::MailBuild(e.to_string()))?;
        let attachment =
            Attachment::new(ATTACHMENT_NAME.to_string()).body(mail.attachment_json.clone(), json);

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject.clone())
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(mail.body.clone()))
                    .singlepart(attachment),
            )?;

        Ok(message)
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn deliver(&self, mail: &ExportMail) -> WorkerResult<()> {
        let message = self.build_message(mail)?;
        self.transport.send(message).await?;
        Ok(())
    }
}

/// Delivers playlist exports to their requesters
#[derive(Clone)]
pub struct NotificationSender {
    transport: Arc<dyn MailTransport>,
}

impl NotificationSender {
    pub fn new(transport: Arc<dyn MailTransport>) -> Self {
        Self { transport }
    }

    /// Fails with [`WorkerError::Delivery`] if the transport rejects the send
    pub async fn send(&self, destination: &str, export: &PlaylistExport) -> WorkerResult<()> {
        let mail = ExportMail::for_playlist(destination, export)?;
        tracing::debug!(destination, playlist_id = %export.id, "Sending export mail");
        self.transport.deliver(&mail).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::ExportSong;
    use assert_matches::assert_matches;

    fn export() -> PlaylistExport {
        PlaylistExport {
            id: "playlist-abc".to_string(),
            name: "Road Trip".to_string(),
            songs: vec![ExportSong {
                id: "song-1".to_string(),
                title: "Highway".to_string(),
                performer: "The Band".to_string(),
            }],
        }
    }

    fn local_transport() -> SmtpMailTransport {
        SmtpMailTransport::from_config(&SmtpConfig::local(
            "localhost",
            1025,
            "exports@openmusic.dev",
        ))
        .unwrap()
    }

    #[test]
    fn test_mail_wraps_payload_under_playlist_key() {
        let mail = ExportMail::for_playlist("a@b.com", &export()).unwrap();

        assert_eq!(mail.destination, "a@b.com");
        assert_eq!(mail.subject, "Playlist export: Road Trip");
        assert!(mail.body.contains("1 songs"));

        let doc: serde_json::Value = serde_json::from_str(&mail.attachment_json).unwrap();
        assert_eq!(doc["playlist"]["id"], "playlist-abc");
        assert_eq!(doc["playlist"]["name"], "Road Trip");
        assert_eq!(doc["playlist"]["songs"][0]["title"], "Highway");
    }

    #[test]
    fn test_empty_playlist_mail_has_empty_song_list() {
        let mut empty = export();
        empty.songs.clear();
        let mail = ExportMail::for_playlist("a@b.com", &empty).unwrap();

        let doc: serde_json::Value = serde_json::from_str(&mail.attachment_json).unwrap();
        assert_eq!(doc["playlist"]["songs"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_smtp_message_has_attachment() {
        let transport = local_transport();
        let mail = ExportMail::for_playlist("a@b.com", &export()).unwrap();

        let message = transport.build_message(&mail).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("Subject: Playlist export: Road Trip"));
        assert!(raw.contains("To: a@b.com"));
        assert!(raw.contains("application/json"));
        assert!(raw.contains("playlist.json"));
    }

    #[tokio::test]
    async fn test_invalid_destination_is_job_error() {
        let transport = local_transport();
        let mail = ExportMail::for_playlist("not an address", &export()).unwrap();

        assert_matches!(
            transport.build_message(&mail),
            Err(WorkerError::InvalidJobData(_))
        );
    }

    #[tokio::test]
    async fn test_invalid_sender_is_configuration_error() {
        let config = SmtpConfig::local("localhost", 1025, "nobody");
        assert_matches!(
            SmtpMailTransport::from_config(&config).err(),
            Some(WorkerError::Configuration(_))
        );
    }
}
