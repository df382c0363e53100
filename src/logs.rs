use std::{
    collections::{HashMap, VecDeque},
    fs::{self, File},
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use anyhow::{Context as _, Result};
use log::{info, warn};
use regex::Regex;

use crate::{
    context::Context,
    detect::detect,
    logger,
    server::ServerType,
    shell::ShellCommand,
    vhost::validate_domain,
};

/// Per-domain log files of a site, resolved under the root prefix.
pub fn log_files(ctx: &Context, server: ServerType, domain: &str) -> (PathBuf, Option<PathBuf>) {
    let profile = server.profile();
    let access = ctx.layout.resolve(&profile.access_log(domain));
    let error = profile.error_log(domain).map(|p| ctx.layout.resolve(&p));
    (access, error)
}

async fn tail(ctx: &Context, label: &str, path: &Path, lines: usize) -> Result<()> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => warn!("{} log is empty", label),
        Ok(_) => {
            info!("{} log ({:?}):", label, path);
            ctx.exec()
                .run_checked(
                    &ShellCommand::root(
                        "tail",
                        ["-n".to_string(), lines.to_string(), path.to_string_lossy().to_string()],
                    )
                    .streamed(),
                )
                .await?;
        }
        Err(_) => warn!("{} log not found: {:?}", label, path),
    }
    Ok(())
}

/// Prints the last `lines` lines of the access and error logs of a domain.
pub async fn view(ctx: &Context, domain: &str, lines: usize) -> Result<()> {
    validate_domain(domain)?;
    let server = detect(&ctx.layout, domain)?;
    let (access, error) = log_files(ctx, server, domain);

    tail(ctx, "Access", &access, lines).await?;
    match error {
        Some(error) => tail(ctx, "Error", &error, lines).await?,
        None => info!("{} does not keep a separate error log per domain", server),
    }
    Ok(())
}

/// Deletes the per-domain log files. Missing files are only reported.
pub async fn purge(ctx: &Context, domain: &str) -> Result<()> {
    validate_domain(domain)?;
    let server = detect(&ctx.layout, domain)?;
    let (access, error) = log_files(ctx, server, domain);

    for path in std::iter::once(access).chain(error) {
        if !path.exists() {
            warn!("Log not found: {:?}", path);
            continue;
        }

        info!("Deleting log: {:?}", path);
        ctx.exec()
            .run_checked(&ShellCommand::root("rm", ["-f".to_string(), path.to_string_lossy().to_string()]))
            .await
            .with_context(|| format!("Failed to delete log file {:?}", path))?;
        logger::success(&format!("Deleted: {:?}", path));
    }
    Ok(())
}

/// Request counts from an access log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrafficReport {
    pub requests: usize,
    pub top_ips: Vec<(String, usize)>,
    pub top_urls: Vec<(String, usize)>,
}

fn top_n(counts: HashMap<String, usize>, n: usize) -> Vec<(String, usize)> {
    let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted.truncate(n);
    sorted
}

/// Counts client addresses and request paths of common/combined log lines.
/// Lines in any other format are skipped.
pub fn analyze_lines<'a, I>(lines: I) -> Result<TrafficReport>
where
    I: IntoIterator<Item = &'a str>,
{
    let pattern = Regex::new(r#"^(\S+) .*?"\S+ (\S+) .*?" (\d{3})"#)?;

    let mut ips: HashMap<String, usize> = HashMap::new();
    let mut urls: HashMap<String, usize> = HashMap::new();
    let mut requests = 0;

    for line in lines {
        if let Some(caps) = pattern.captures(line) {
            requests += 1;
            *ips.entry(caps[1].to_string()).or_default() += 1;
            *urls.entry(caps[2].to_string()).or_default() += 1;
        }
    }

    Ok(TrafficReport {
        requests,
        top_ips: top_n(ips, 5),
        top_urls: top_n(urls, 5),
    })
}

/// Analyzes the last `lines` lines of the access log of a domain.
pub fn analyze(ctx: &Context, domain: &str, lines: usize) -> Result<TrafficReport> {
    validate_domain(domain)?;
    let server = detect(&ctx.layout, domain)?;
    let (access, _) = log_files(ctx, server, domain);

    let file = File::open(&access).with_context(|| format!("Failed to open access log {:?}", access))?;
    let mut window: VecDeque<String> = VecDeque::with_capacity(lines.min(10_000));
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("Failed to read {:?}", access))?;
        if window.len() == lines {
            window.pop_front();
        }
        if lines > 0 {
            window.push_back(line);
        }
    }

    analyze_lines(window.iter().map(String::as_str))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = r#"10.0.0.1 - - [10/Oct/2025:13:55:36 +0000] "GET / HTTP/1.1" 200 612 "-" "curl/8.0"
10.0.0.2 - - [10/Oct/2025:13:55:37 +0000] "GET /about HTTP/1.1" 200 100 "-" "Mozilla"
10.0.0.1 - - [10/Oct/2025:13:55:38 +0000] "POST /login HTTP/1.1" 302 0 "-" "Mozilla"
garbage line
10.0.0.1 - - [10/Oct/2025:13:55:39 +0000] "GET / HTTP/1.1" 304 0 "-" "Mozilla"
"#;

    #[test]
    fn counts_ips_and_urls() {
        let report = analyze_lines(LOG.lines()).unwrap();
        assert_eq!(report.requests, 4);
        assert_eq!(report.top_ips[0], ("10.0.0.1".to_string(), 3));
        assert_eq!(report.top_urls[0], ("/".to_string(), 2));
    }

    #[test]
    fn ties_are_ordered_by_key() {
        let report = analyze_lines(LOG.lines()).unwrap();
        let urls: Vec<&str> = report.top_urls.iter().map(|(u, _)| u.as_str()).collect();
        assert_eq!(urls, vec!["/", "/about", "/login"]);
    }

    #[test]
    fn keeps_only_five_entries() {
        let lines: Vec<String> = (0..8)
            .map(|i| format!(r#"10.0.0.{i} - - [x] "GET /p{i} HTTP/1.1" 200 1"#))
            .collect();
        let report = analyze_lines(lines.iter().map(String::as_str)).unwrap();
        assert_eq!(report.requests, 8);
        assert_eq!(report.top_ips.len(), 5);
        assert_eq!(report.top_urls.len(), 5);
    }
}
