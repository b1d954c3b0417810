pub mod logger;
pub mod settings;

pub mod client;

pub mod application_impl;
pub mod domain_model;
pub mod domain_port;
pub mod infra_http;
