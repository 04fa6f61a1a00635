pub(crate) mod bootstrap;
pub(crate) mod events;
pub(crate) mod loop_runner;
pub(crate) mod model;
pub(crate) mod scenario;
pub(crate) mod views;
