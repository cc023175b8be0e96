pub mod api;
pub mod assist;
pub mod config;
pub mod detail;
pub mod error;
pub mod live;
pub mod logging;
pub mod model;
pub mod session;
pub mod storage;
pub mod tui;
pub mod view;
