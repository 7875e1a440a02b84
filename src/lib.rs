// Library for tests to access modules

pub mod budget;
pub mod cloud_repo;
pub mod config;
pub mod controller;
pub mod fleet;
pub mod metrics_repo;
pub mod models;
pub mod observation_repo;
pub mod routes;
pub mod scaling;
pub mod version;
