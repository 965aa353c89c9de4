pub mod browser;
pub mod captcha;
pub mod config;
pub mod controller;
pub mod error;
pub mod execution;
pub mod model;
pub mod opening;
pub mod portal;
pub mod probe;
pub mod report;
pub mod run;
pub mod search;
pub mod time;
