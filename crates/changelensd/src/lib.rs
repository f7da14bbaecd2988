pub mod change_view;
pub mod cli;
pub mod commands;
pub mod logging;
pub mod session;
pub mod view_slot;
