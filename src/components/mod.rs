pub mod colors;
pub mod dialogs;
pub mod fill;
pub mod history;
pub mod path;
pub mod tools;
