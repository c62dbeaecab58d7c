use crate::auth::AuthConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Grade management sidecar: JSON-lines requests on stdin, responses on stdout
#[derive(Debug, Clone, Parser)]
#[command(name = "educonnectd")]
#[command(version)]
#[command(about = "Grade management sidecar speaking JSON lines over stdio", long_about = None)]
pub struct DaemonConfig {
    /// Workspace directory to open at startup
    #[arg(long, env = "EDUCONNECT_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Log filter directive (e.g. "info", "educonnectd=debug")
    #[arg(long, env = "EDUCONNECT_LOG", default_value = "warn")]
    pub log_level: String,

    #[arg(long, env = "EDUCONNECT_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// New accounts must be confirmed before they can sign in
    #[arg(
        long,
        env = "EDUCONNECT_REQUIRE_EMAIL_CONFIRMATION",
        default_value_t = false,
        action = clap::ArgAction::Set
    )]
    pub require_email_confirmation: bool,

    /// Domain used for provisioned student accounts
    #[arg(long, env = "EDUCONNECT_STUDENT_EMAIL_DOMAIN", default_value = "educonnect.com")]
    pub student_email_domain: String,

    /// Initial password of provisioned student accounts
    #[arg(long, env = "EDUCONNECT_STUDENT_DEFAULT_PASSWORD", default_value = "123456")]
    pub student_default_password: String,
}

impl DaemonConfig {
    pub fn auth(&self) -> AuthConfig {
        AuthConfig {
            require_email_confirmation: self.require_email_confirmation,
            student_email_domain: self.student_email_domain.clone(),
            student_default_password: self.student_default_password.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_auth_defaults() {
        let cfg = DaemonConfig::try_parse_from(["educonnectd"]).expect("parse");
        let auth = cfg.auth();
        let defaults = AuthConfig::default();
        assert_eq!(auth.student_email_domain, defaults.student_email_domain);
        assert_eq!(auth.student_default_password, defaults.student_default_password);
        assert_eq!(cfg.log_format, LogFormat::Text);
    }

    #[test]
    fn confirmation_flag_takes_explicit_value() {
        let cfg = DaemonConfig::try_parse_from([
            "educonnectd",
            "--require-email-confirmation",
            "true",
            "--log-format",
            "json",
        ])
        .expect("parse");
        assert!(cfg.require_email_confirmation);
        assert_eq!(cfg.log_format, LogFormat::Json);
    }
}
