mod helpers;
mod inspect;
mod maintenance;
mod replay;
mod scrape;

pub(crate) use inspect::{cmd_show, cmd_stats};
pub(crate) use maintenance::{cmd_backfill, cmd_seed};
pub(crate) use replay::cmd_replay;
pub(crate) use scrape::{ScrapeOptions, cmd_scrape};
