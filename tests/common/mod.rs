#![allow(dead_code)]

use std::{fs, path::Path, sync::Arc};

use stackroost::{
    config::Settings,
    context::Context,
    server::ServerType,
    shell::RecordingExecutor,
    vhost::{self, VirtualHostSpec},
};
use tempfile::TempDir;

/// A context rooted in a temporary directory with a recording executor.
pub fn staged() -> (TempDir, Context, Arc<RecordingExecutor>) {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        root: dir.path().to_path_buf(),
        ..Settings::default()
    };
    let exec = Arc::new(RecordingExecutor::new());
    let ctx = Context::new(settings, dir.path().join("settings.toml"), exec.clone());
    (dir, ctx, exec)
}

/// Writes a generated config for `domain` into the available directory.
pub fn install_config(ctx: &Context, server: ServerType, domain: &str) {
    let path = ctx.layout.available_path(server, domain);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let spec = VirtualHostSpec::new(domain, "80").unwrap();
    fs::write(&path, vhost::generate(server, &spec)).unwrap();
}

pub fn count(lines: &[String], needle: &str) -> usize {
    lines.iter().filter(|l| l.as_str() == needle).count()
}

pub fn is_link(path: &Path) -> bool {
    fs::symlink_metadata(path).map(|m| m.file_type().is_symlink()).unwrap_or(false)
}
