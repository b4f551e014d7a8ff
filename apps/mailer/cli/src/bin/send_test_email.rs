//! Send one email through any mailer backend and print the resulting status
//!
//! Run with: cargo run -p mailer_cli --bin send_test_email -- --config mailer.yaml --enable

use clap::Parser;
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::{Environment, FromEnv};
use eyre::{Result, WrapErr};
use mailer::{Backend, Mailer, MailerConfig, Mode};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Send a test email through the mailer")]
struct Args {
    /// YAML configuration file; MAILER_* environment variables are used when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SMTP_RICH | SMTP_PLAIN | API | API_BULK
    #[arg(short, long, value_parser = Backend::parse, default_value = "SMTP_PLAIN")]
    backend: Backend,

    /// TEST redirects every address to the webmasters
    #[arg(short, long, value_parser = Mode::parse, default_value = "TEST")]
    mode: Mode,

    /// Actually hand the message to the transport
    #[arg(long)]
    enable: bool,

    /// Recipient address (repeatable); none means the configured defaults
    #[arg(long)]
    to: Vec<String>,

    #[arg(long)]
    cc: Vec<String>,

    #[arg(long)]
    bcc: Vec<String>,

    #[arg(long)]
    reply_to: Vec<String>,

    #[arg(short, long, default_value = "Test email")]
    subject: String,

    #[arg(long, default_value = "<h1>Hello!</h1><p>This is a test email.</p>")]
    html: String,

    #[arg(long, default_value = "Hello! This is a test email.")]
    text: String,

    /// File to attach (repeatable)
    #[arg(long)]
    attach: Vec<PathBuf>,

    /// Inline image as ID=PATH (repeatable)
    #[arg(long, value_parser = parse_pair)]
    embed: Vec<(String, String)>,

    #[arg(long)]
    template_id: Option<String>,

    /// Template variable as KEY=VALUE (repeatable)
    #[arg(long = "var", value_parser = parse_pair)]
    variables: Vec<(String, String)>,

    /// Attachment budget in megabytes
    #[arg(long)]
    max_size_mb: Option<u64>,
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn main() -> Result<()> {
    install_color_eyre();
    let args = Args::parse();
    init_tracing(&Environment::from_env());

    let config = match &args.config {
        Some(path) => MailerConfig::load(path)?,
        None => MailerConfig::from_env().wrap_err("Failed to read MAILER_* variables")?,
    };

    let mut mailer = Mailer::new(config);
    mailer
        .set_backend(args.backend)
        .set_mode(args.mode)
        .set_enabled(args.enable);
    if let Some(megabytes) = args.max_size_mb {
        mailer.set_file_max_size(megabytes);
    }

    mailer.init(true);
    if args.to.is_empty() {
        mailer.add_recipient("", "");
    }
    mailer.add_recipients(args.to.iter().map(String::as_str))?;
    mailer.add_copies(args.cc.iter().map(String::as_str))?;
    mailer.add_blinds(args.bcc.iter().map(String::as_str))?;
    mailer.add_replies(args.reply_to.iter().map(String::as_str))?;
    mailer
        .set_subject(&args.subject)
        .set_html(&args.html)
        .set_text(&args.text);

    for path in &args.attach {
        mailer.add_attachment(path, &file_name(path.as_path()))?;
    }
    for (id, path) in &args.embed {
        let path = PathBuf::from(path);
        mailer.add_embed(&path, &file_name(&path), Some(id.as_str()))?;
    }
    if let Some(id) = &args.template_id {
        mailer.set_template_id(id);
    }
    mailer.add_variables(args.variables.clone());

    if args.backend == Backend::ApiBulk {
        mailer.bulk(false);
    }

    info!(backend = %args.backend, mode = %args.mode, enabled = args.enable, "Sending test email");
    let status = mailer.prepare().send().last_sent_status();
    println!("{}", serde_json::to_string_pretty(&status)?);

    if !status.success {
        eyre::bail!("Email not sent: {}", status.message);
    }
    Ok(())
}
