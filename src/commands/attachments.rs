//! `attachments` command: resolve every URL, then download what changed.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use intra42::versioning::attachment_file_name;
use intra42::{AttachmentDownloader, PortalCookies, Session, SessionConfig, VersionResolver};
use tracing::{info, warn};

use crate::cli::AttachmentsArgs;

pub async fn run_attachments_command(args: &AttachmentsArgs, config: SessionConfig) -> Result<()> {
    let mut builder = Session::builder()
        .config(config)
        .base_url(args.portal_url.as_str());
    if let Some(session_cookie) = &args.session_cookie {
        let mut cookies = PortalCookies::new(session_cookie.as_str());
        if let Some(clearance) = &args.cf_clearance {
            cookies = cookies.with_clearance(clearance.as_str());
        }
        if let Some(user_id) = &args.user_id {
            cookies = cookies.with_user_id(user_id.as_str());
        }
        builder = builder.cookies(cookies);
    } else {
        warn!("no portal session cookie given; requests are sent without one");
    }
    let session = builder.build().context("failed to build portal session")?;

    let mut targets: Vec<(String, PathBuf)> = Vec::with_capacity(args.urls.len());
    let mut seen = HashSet::new();
    for raw in &args.urls {
        let url = session.url(raw)?;
        let path = args.out.join(attachment_file_name(&url));
        if !seen.insert(path.clone()) {
            warn!(
                url = %url,
                path = %path.display(),
                "skipping attachment with duplicate file name"
            );
            continue;
        }
        targets.push((url.to_string(), path));
    }

    let resolver = VersionResolver::new(session.clone());
    let descriptors = resolver
        .resolve_many(targets.iter().map(|(url, path)| (url.as_str(), path.as_path())))
        .await
        .context("failed to resolve attachments")?;

    let pending = descriptors.iter().filter(|d| d.should_fetch).count();
    println!(
        "{pending} of {} attachment(s) need updating.",
        descriptors.len()
    );
    for descriptor in &descriptors {
        let state = if descriptor.should_fetch { "fetch" } else { "current" };
        println!(
            "- [{state}] {} -> {}",
            descriptor.remote_url,
            descriptor.resolved_path.display()
        );
    }

    if args.dry_run {
        println!("Dry run - no files downloaded");
        return Ok(());
    }

    let downloader = AttachmentDownloader::new(session);
    let mut downloaded = 0usize;
    let mut bytes = 0u64;
    for descriptor in &descriptors {
        if let Some(written) = downloader
            .download_resolved(descriptor)
            .await
            .with_context(|| format!("failed to download {}", descriptor.remote_url))?
        {
            downloaded += 1;
            bytes += written;
        }
    }

    info!(downloaded, bytes, out = %args.out.display(), "attachments updated");
    Ok(())
}
