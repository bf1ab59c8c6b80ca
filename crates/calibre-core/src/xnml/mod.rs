pub mod codec;
pub mod document;

pub use codec::{read_document, write_document};
pub use document::XnmlDocument;
