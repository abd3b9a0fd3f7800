pub mod config;
pub mod db;
pub mod help_popup;
pub mod keybinds;
pub mod logging;
pub mod notice;
pub mod settings;
pub mod telescope;
pub mod text_input;
pub mod tool;
pub mod ui;
pub mod which_key;
