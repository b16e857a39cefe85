//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::builder::TypedValueParser as _;
use clap::{Args as ClapArgs, Parser, Subcommand};

use intra42::session::config::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_MAX_CONNECTIONS, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use intra42::{DEFAULT_API_BASE_URL, DEFAULT_PAGE_SIZE, DEFAULT_PORTAL_BASE_URL};

/// Fetch paginated records from the 42 intranet API and keep versioned
/// copies of project attachments from the web portal.
#[derive(Parser, Debug)]
#[command(name = "intra42")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Connection timeout in seconds (1-3600)
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=3600), global = true)]
    pub connect_timeout: u64,

    /// Total request timeout in seconds, body transfer included (1-3600)
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=3600), global = true)]
    pub request_timeout: u64,

    /// Maximum simultaneous connections (1-256)
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS, value_parser = clap::value_parser!(u64).range(1..=256).map(|v| v as usize), global = true)]
    pub max_connections: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print every record of an API resource as JSON lines
    Records(RecordsArgs),
    /// Download changed attachments, keeping earlier revisions
    Attachments(AttachmentsArgs),
}

#[derive(ClapArgs, Debug)]
pub struct RecordsArgs {
    /// Resource path, e.g. /v2/cursus/21/projects
    pub resource: String,

    /// API root URL
    #[arg(long, env = "INTRA42_API_URL", default_value = DEFAULT_API_BASE_URL)]
    pub api_url: String,

    /// OAuth application UID
    #[arg(long, env = "INTRA42_UID", hide_env_values = true)]
    pub uid: String,

    /// OAuth application secret
    #[arg(long, env = "INTRA42_SECRET", hide_env_values = true)]
    pub secret: String,

    /// Records per page (1-100)
    #[arg(short = 'p', long, default_value_t = DEFAULT_PAGE_SIZE, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub page_size: u32,

    /// Parallel page workers (1-32, default: 2 x CPUs capped at 32)
    #[arg(
        short = 'w',
        long,
        conflicts_with_all = ["sequential", "stream"],
        value_parser = clap::value_parser!(u64).range(1..=32).map(|v| v as usize)
    )]
    pub workers: Option<usize>,

    /// Fetch pages one at a time instead of in parallel
    #[arg(long, conflicts_with = "stream")]
    pub sequential: bool,

    /// Stream records page by page instead of collecting them first
    #[arg(long)]
    pub stream: bool,
}

#[derive(ClapArgs, Debug)]
pub struct AttachmentsArgs {
    /// Attachment URLs (absolute, or paths relative to the portal root)
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Download directory
    #[arg(short, long, default_value = "downloads")]
    pub out: PathBuf,

    /// Web portal root URL
    #[arg(long, env = "INTRA42_PORTAL_URL", default_value = DEFAULT_PORTAL_BASE_URL)]
    pub portal_url: String,

    /// Portal session cookie value
    #[arg(long, env = "INTRA42_SESSION_COOKIE", hide_env_values = true)]
    pub session_cookie: Option<String>,

    /// Cloudflare clearance cookie value
    #[arg(long, env = "INTRA42_CF_CLEARANCE", hide_env_values = true)]
    pub cf_clearance: Option<String>,

    /// Portal user id cookie value
    #[arg(long, env = "INTRA42_USER_ID", hide_env_values = true)]
    pub user_id: Option<String>,

    /// Resolve only; report what would be downloaded
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn records(extra: &[&str]) -> Result<Args, clap::Error> {
        let mut argv = vec!["intra42", "records", "/v2/cursus", "--uid", "u", "--secret", "s"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv)
    }

    #[test]
    fn test_cli_records_defaults() {
        let args = records(&[]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert_eq!(args.request_timeout, 30);
        match args.command {
            Command::Records(records) => {
                assert_eq!(records.resource, "/v2/cursus");
                assert_eq!(records.page_size, 100);
                assert_eq!(records.workers, None);
                assert!(!records.sequential);
                assert!(!records.stream);
            }
            Command::Attachments(_) => panic!("expected records"),
        }
    }

    #[test]
    fn test_cli_verbose_flag_after_subcommand() {
        let args = records(&["-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_page_size_bounds() {
        assert!(records(&["-p", "1"]).is_ok());
        assert!(records(&["-p", "100"]).is_ok());
        let err = records(&["-p", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        let err = records(&["-p", "101"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_workers_bounds() {
        match records(&["-w", "8"]).unwrap().command {
            Command::Records(records) => assert_eq!(records.workers, Some(8)),
            Command::Attachments(_) => panic!("expected records"),
        }
        let err = records(&["-w", "33"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_max_connections_bounds() {
        let args = records(&["--max-connections", "8"]).unwrap();
        assert_eq!(args.max_connections, 8);
        assert_eq!(records(&[]).unwrap().max_connections, 32);
        let err = records(&["--max-connections", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        let err = records(&["--max-connections", "257"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_workers_only_with_parallel_fetch() {
        let err = records(&["-w", "4", "--sequential"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
        let err = records(&["-w", "4", "--stream"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_sequential_conflicts_with_stream() {
        let err = records(&["--sequential", "--stream"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_attachments_requires_url() {
        let err = Args::try_parse_from(["intra42", "attachments"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_attachments_defaults() {
        let args = Args::try_parse_from([
            "intra42",
            "attachments",
            "/uploads/en.subject.pdf",
            "--session-cookie",
            "abc",
        ])
        .unwrap();
        match args.command {
            Command::Attachments(attachments) => {
                assert_eq!(attachments.out, PathBuf::from("downloads"));
                assert_eq!(attachments.session_cookie.as_deref(), Some("abc"));
                assert!(!attachments.dry_run);
            }
            Command::Records(_) => panic!("expected attachments"),
        }
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["intra42", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
