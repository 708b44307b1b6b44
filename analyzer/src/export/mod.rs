pub mod docx;
pub mod pdf;

pub use docx::render_docx;
pub use pdf::render_pdf;
