pub(crate) mod bootstrap;
mod commands;
mod gameplay;
pub(crate) mod loop_runner;
mod office_map;
mod persistence;
mod store;
