mod export;
mod helpers;
mod insights;
mod log;
mod show;

use anyhow::Result;

use crate::config::Config;
use crate::openai;
use daybook_core::service::DaybookService;

pub(crate) use export::{ExportTable, cmd_export};
pub(crate) use insights::{cmd_ask, cmd_streaks, cmd_week};
pub(crate) use log::cmd_log;
pub(crate) use show::{cmd_fields, cmd_history, cmd_show, cmd_signals};

/// Open the store. Generator backends are only built (and the API key only required) for
/// commands that call a model.
pub(crate) fn open_service(config: &Config, with_generator: bool) -> Result<DaybookService> {
    let backends = if with_generator {
        openai::backends(&config.settings.llm, &config.api_key()?)?
    } else {
        Vec::new()
    };
    Ok(DaybookService::new(&config.db_path, backends)?)
}
