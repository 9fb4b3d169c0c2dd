pub mod config;
pub mod pretalx;
pub mod pretalx_sync;
pub mod schedule_grid;
pub mod schedule_import;
pub mod spreadsheet;

#[cfg(test)]
pub(crate) mod test_support;
