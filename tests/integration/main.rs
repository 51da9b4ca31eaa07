//! Integration tests

mod support;

mod config_test;
mod service_test;
