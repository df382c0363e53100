use std::{path::PathBuf, sync::Arc};

use anyhow::Result;

use crate::{
    config::Settings,
    server::Layout,
    shell::{Executor, SystemExecutor},
    site::SiteController,
};

/// Everything a command needs, built once per invocation.
pub struct Context {
    pub settings: Settings,
    pub settings_path: PathBuf,
    pub layout: Layout,
    pub executor: Arc<dyn Executor>,
}

impl Context {
    pub fn new(settings: Settings, settings_path: PathBuf, executor: Arc<dyn Executor>) -> Self {
        let layout = settings.layout();
        Self {
            settings,
            settings_path,
            layout,
            executor,
        }
    }

    /// Context for the live host: settings from disk and a real executor.
    pub fn load(settings_path: PathBuf, no_sudo: bool) -> Result<Self> {
        let settings = Settings::load(&settings_path)?;
        let executor = Arc::new(SystemExecutor::new(settings.use_sudo && !no_sudo));
        Ok(Self::new(settings, settings_path, executor))
    }

    pub fn exec(&self) -> &dyn Executor {
        self.executor.as_ref()
    }

    pub fn controller(&self) -> SiteController<'_> {
        SiteController::new(&self.layout, self.executor.as_ref())
    }

    pub fn save_settings(&self) -> Result<()> {
        self.settings.save(&self.settings_path)
    }
}
