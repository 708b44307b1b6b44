pub mod chat;
pub mod documents;
pub mod export;

pub mod types;

pub use chat::chat_routes;
pub use documents::document_routes;
pub use export::export_routes;
