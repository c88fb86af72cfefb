use clap::{Parser, ValueEnum};
use email_failover::{Attachment, SendOptions};
use std::path::PathBuf;

/// Send one email through the configured providers, failing over on error.
#[derive(Debug, Parser)]
#[command(name = "send_email", version, about)]
pub struct Cli {
    /// Recipient address
    #[arg(long)]
    pub to: String,

    /// Subject line
    #[arg(long)]
    pub subject: String,

    /// HTML body
    #[arg(long)]
    pub body: String,

    /// Sender address override
    #[arg(long)]
    pub from: Option<String>,

    /// Sender display name override
    #[arg(long)]
    pub from_name: Option<String>,

    /// CC recipient (repeatable)
    #[arg(long)]
    pub cc: Vec<String>,

    /// BCC recipient (repeatable)
    #[arg(long)]
    pub bcc: Vec<String>,

    /// Attachment as PATH or PATH:MIME (repeatable)
    #[arg(long = "attach", value_parser = parse_attachment)]
    pub attachments: Vec<Attachment>,

    /// Provider tried first; overrides EMAIL_DEFAULT_PROVIDER
    #[arg(long)]
    pub default_provider: Option<String>,

    /// Providers to register, in failover order
    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        default_values = ["sendgrid", "postmark", "mailgun", "smtp"]
    )]
    pub providers: Vec<ProviderKind>,
}

impl Cli {
    pub fn send_options(&self) -> SendOptions {
        SendOptions {
            from: self.from.clone(),
            from_name: self.from_name.clone(),
            cc: self.cc.clone(),
            bcc: self.bcc.clone(),
            attachments: self.attachments.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    Sendgrid,
    Postmark,
    Mailgun,
    Smtp,
    /// In-memory provider that accepts everything
    Mock,
}

/// Parse `PATH` or `PATH:MIME`; the file name becomes the display name.
pub fn parse_attachment(raw: &str) -> Result<Attachment, String> {
    let (path, content_type) = match raw.rsplit_once(':') {
        Some((path, mime)) if mime.contains('/') => (path, Some(mime)),
        _ => (raw, None),
    };

    let path = PathBuf::from(path);
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| format!("attachment path has no file name: {}", raw))?
        .to_string();

    let attachment = Attachment::new(path, name);
    Ok(match content_type {
        Some(mime) => attachment.with_content_type(mime),
        None => attachment,
    })
}
