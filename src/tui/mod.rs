mod app;
mod ui;

pub use app::{App, DetailState, Form, Modal, TextField, ViewMode};
