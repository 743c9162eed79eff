pub mod links;
pub mod text;
pub(crate) mod time;
